//! Inbound side of the `cseg-net` strand: accepts TCP connections from
//! peer CSEG nodes and space servers, decodes one `CsegRequest` frame
//! per connection, and answers it against a [`CsegNodeHandle`].

use crate::actor::CsegNodeHandle;
use crate::net::{read_frame, write_frame};
use sirikata_messaging::cseg_wire::{
    encode_bbox_list_reply, encode_bbox_reply, encode_num_servers_reply, encode_server_id_reply, CsegRequest,
    MessageType,
};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

/// Bind `addr` and serve inbound CSEG connections until the process
/// shuts down. Each connection is handled independently and closed
/// after its single request/reply (or fire-and-forget push).
pub async fn serve(addr: SocketAddr, handle: CsegNodeHandle) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    loop {
        let (stream, peer) = listener.accept().await?;
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(error) = handle_connection(stream, handle).await {
                warn!(%peer, %error, "CSEG connection closed with an error");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, handle: CsegNodeHandle) -> std::io::Result<()> {
    let peer = stream.peer_addr()?;
    let frame = match read_frame(&mut stream).await {
        Ok(frame) => frame,
        Err(error) => {
            debug!(%peer, %error, "failed to read CSEG request frame");
            return Ok(());
        }
    };
    let request = match CsegRequest::decode(&frame) {
        Ok(request) => request,
        Err(error) => {
            // Protocol-class error per §7: close the connection, log,
            // never crash.
            debug!(%peer, %error, "malformed CSEG request");
            return Ok(());
        }
    };

    match request.message_type() {
        MessageType::SegmentationListen => {
            if let CsegRequest::SegmentationListen { host, port } = request {
                match format!("{host}:{port}").parse::<SocketAddr>() {
                    Ok(listener_addr) => handle.register_listener(listener_addr).await,
                    Err(error) => warn!(%host, port, %error, "invalid SEGMENTATION_LISTEN address"),
                }
            }
            return Ok(());
        }
        MessageType::SegmentationChange => {
            if let CsegRequest::SegmentationChange(msg) = request {
                handle.apply_segmentation_change(msg).await;
            }
            return Ok(());
        }
        _ => {}
    }

    let reply_bytes = match request {
        CsegRequest::Lookup { point } => encode_server_id_reply(handle.lookup(point).await),
        CsegRequest::NumServers => encode_num_servers_reply(handle.num_servers().await),
        CsegRequest::Region => match handle.region().await {
            Some(bbox) => encode_bbox_reply(&bbox),
            None => return Ok(()),
        },
        CsegRequest::ServerRegion { server } | CsegRequest::LlServerRegion { server } => {
            encode_bbox_list_reply(&handle.server_region(server).await)
        }
        CsegRequest::LlLookup { point, bbox } => encode_server_id_reply(handle.ll_lookup(point, bbox).await),
        CsegRequest::SegmentationListen { .. } | CsegRequest::SegmentationChange(_) => unreachable!(),
    };
    write_frame(&mut stream, &reply_bytes).await.ok();
    Ok(())
}
