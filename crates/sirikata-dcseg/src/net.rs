//! The `cseg-net` strand's transport: plain length-prefixed TCP
//! framing (§4.1 "Wire protocol" names the payload layout; framing the
//! payload onto a stream socket is this module's job), little-endian
//! throughout to match the payload encoding.

use crate::error::{Error, Result};
use sirikata_messaging::cseg_wire::CsegRequest;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

pub async fn write_frame(stream: &mut TcpStream, payload: &[u8]) -> Result<()> {
    let len = payload.len() as u32;
    stream.write_all(&len.to_le_bytes()).await.map_err(|e| Error::Io(peer_addr(stream), e))?;
    stream.write_all(payload).await.map_err(|e| Error::Io(peer_addr(stream), e))?;
    Ok(())
}

pub async fn read_frame(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    stream.read_exact(&mut len_bytes).await.map_err(|e| Error::Io(peer_addr(stream), e))?;
    let len = u32::from_le_bytes(len_bytes).min(MAX_FRAME_LEN);
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await.map_err(|e| Error::Io(peer_addr(stream), e))?;
    Ok(buf)
}

fn peer_addr(stream: &TcpStream) -> SocketAddr {
    stream.peer_addr().unwrap_or_else(|_| "0.0.0.0:0".parse().unwrap())
}

/// Open a connection to `addr`, send `request`, and read back exactly
/// one reply frame — the request/response shape §4.1 describes for
/// CSEG-to-CSEG RPCs. The connection is not reused.
pub async fn request_reply(addr: SocketAddr, request: &CsegRequest) -> Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await.map_err(|e| Error::Io(addr, e))?;
    write_frame(&mut stream, &request.encode()).await?;
    read_frame(&mut stream).await
}

/// Fire-and-forget send, used for `SEGMENTATION_CHANGE` broadcasts
/// (§4.1: "forwards it to peer CSEG nodes ... fire-and-forget") and
/// for pushing changes out to attached space servers.
pub async fn send_fire_and_forget(addr: SocketAddr, request: &CsegRequest) -> Result<()> {
    let mut stream = TcpStream::connect(addr).await.map_err(|e| Error::Io(addr, e))?;
    write_frame(&mut stream, &request.encode()).await
}
