//! Binary wire protocol for the CSEG TCP service (§6). Little-endian
//! throughout; every CSEG peer and space server must agree on that,
//! per §4.1's wire-protocol note.
//!
//! Frames are length-prefixed at the transport (plain TCP, not the
//! qp2p-backed SST streams — see `sirikata_dcseg`'s net module); this
//! module only encodes/decodes the payload that follows the length
//! prefix.

use sirikata_types::{BoundingBox, ServerId, Vector3};
use std::convert::TryInto;
use thiserror::Error;

/// Cap on the number of `(ServerId, Vec<BoundingBox>)` entries carried
/// by a single `SEGMENTATION_CHANGE` frame (§4.1). An affected-server
/// count above this is split across multiple broadcast messages by
/// the caller rather than growing the frame unboundedly.
pub const MAX_SERVER_REGIONS_CHANGED: usize = 64;

/// Cap on the number of bounding boxes returned by a
/// `SERVER_REGION_REQUEST` / `LL_SERVER_REGION_REQUEST` reply (§6).
pub const MAX_BBOX_LIST_SIZE: usize = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("frame too short: need at least {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },
    #[error("unknown CSEG message type byte {0}")]
    UnknownMessageType(u8),
    #[error("bbox list length {0} exceeds MAX_BBOX_LIST_SIZE ({MAX_BBOX_LIST_SIZE})")]
    BboxListTooLong(u32),
    #[error("segmentation change numEntries {0} exceeds MAX_SERVER_REGIONS_CHANGED ({MAX_SERVER_REGIONS_CHANGED})")]
    TooManyEntries(u8),
    #[error("host string is not valid UTF-8")]
    InvalidHost,
}

type Result<T> = std::result::Result<T, WireError>;

#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MessageType {
    LookupRequest = 0,
    NumServersRequest = 1,
    RegionRequest = 2,
    ServerRegionRequest = 3,
    SegmentationListen = 4,
    SegmentationChange = 5,
    LlLookupRequest = 6,
    LlServerRegionRequest = 7,
}

impl MessageType {
    fn from_byte(b: u8) -> Result<Self> {
        Ok(match b {
            0 => Self::LookupRequest,
            1 => Self::NumServersRequest,
            2 => Self::RegionRequest,
            3 => Self::ServerRegionRequest,
            4 => Self::SegmentationListen,
            5 => Self::SegmentationChange,
            6 => Self::LlLookupRequest,
            7 => Self::LlServerRegionRequest,
            other => return Err(WireError::UnknownMessageType(other)),
        })
    }
}

fn need(buf: &[u8], n: usize) -> Result<()> {
    if buf.len() < n {
        Err(WireError::TooShort { need: n, have: buf.len() })
    } else {
        Ok(())
    }
}

fn encode_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn decode_f32(buf: &[u8], off: &mut usize) -> f32 {
    let v = f32::from_le_bytes(buf[*off..*off + 4].try_into().unwrap());
    *off += 4;
    v
}

/// `SerializedVector`: 3 packed little-endian `float32`s.
pub fn encode_vector(out: &mut Vec<u8>, v: Vector3) {
    encode_f32(out, v.x);
    encode_f32(out, v.y);
    encode_f32(out, v.z);
}

pub fn decode_vector(buf: &[u8]) -> Result<Vector3> {
    need(buf, 12)?;
    let mut off = 0;
    let x = decode_f32(buf, &mut off);
    let y = decode_f32(buf, &mut off);
    let z = decode_f32(buf, &mut off);
    Ok(Vector3::new(x, y, z))
}

/// `SerializedBBox`: 6 packed little-endian `float32`s, min then max.
pub fn encode_bbox(out: &mut Vec<u8>, bbox: &BoundingBox) {
    encode_vector(out, bbox.min);
    encode_vector(out, bbox.max);
}

pub fn decode_bbox(buf: &[u8]) -> Result<BoundingBox> {
    need(buf, 24)?;
    let min = decode_vector(&buf[0..12])?;
    let max = decode_vector(&buf[12..24])?;
    Ok(BoundingBox::new(min, max))
}

fn encode_server_id(out: &mut Vec<u8>, id: ServerId) {
    out.extend_from_slice(&id.raw().to_le_bytes());
}

fn decode_server_id(buf: &[u8], off: &mut usize) -> Result<ServerId> {
    need(&buf[*off..], 4)?;
    let v = u32::from_le_bytes(buf[*off..*off + 4].try_into().unwrap());
    *off += 4;
    Ok(ServerId::from_raw(v))
}

/// One entry of a `SEGMENTATION_CHANGE` frame: a server whose region
/// set changed, and its new list of leaf boxes.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentationChangeEntry {
    pub server: ServerId,
    pub regions: Vec<BoundingBox>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct SegmentationChangeMessage {
    pub entries: Vec<SegmentationChangeEntry>,
}

impl SegmentationChangeMessage {
    /// Caps at [`MAX_SERVER_REGIONS_CHANGED`] per §4.1; callers with
    /// more affected servers must split into several messages.
    pub fn capped(mut entries: Vec<SegmentationChangeEntry>) -> Self {
        entries.truncate(MAX_SERVER_REGIONS_CHANGED);
        Self { entries }
    }
}

/// A parsed CSEG request, tagged by the first byte of the frame.
#[derive(Clone, Debug, PartialEq)]
pub enum CsegRequest {
    Lookup { point: Vector3 },
    NumServers,
    Region,
    ServerRegion { server: ServerId },
    SegmentationListen { host: String, port: u16 },
    SegmentationChange(SegmentationChangeMessage),
    LlLookup { point: Vector3, bbox: BoundingBox },
    LlServerRegion { server: ServerId },
}

impl CsegRequest {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Lookup { .. } => MessageType::LookupRequest,
            Self::NumServers => MessageType::NumServersRequest,
            Self::Region => MessageType::RegionRequest,
            Self::ServerRegion { .. } => MessageType::ServerRegionRequest,
            Self::SegmentationListen { .. } => MessageType::SegmentationListen,
            Self::SegmentationChange(_) => MessageType::SegmentationChange,
            Self::LlLookup { .. } => MessageType::LlLookupRequest,
            Self::LlServerRegion { .. } => MessageType::LlServerRegionRequest,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.message_type() as u8];
        match self {
            Self::Lookup { point } => encode_vector(&mut out, *point),
            Self::NumServers | Self::Region => {}
            Self::ServerRegion { server } | Self::LlServerRegion { server } => {
                encode_server_id(&mut out, *server)
            }
            Self::SegmentationListen { host, port } => {
                let mut bytes = host.clone().into_bytes();
                bytes.resize(255, 0);
                out.extend_from_slice(&bytes);
                out.extend_from_slice(&port.to_le_bytes());
            }
            Self::SegmentationChange(msg) => {
                let n = msg.entries.len().min(MAX_SERVER_REGIONS_CHANGED) as u8;
                out.push(n);
                for entry in msg.entries.iter().take(n as usize) {
                    encode_server_id(&mut out, entry.server);
                    out.extend_from_slice(&(entry.regions.len() as u32).to_le_bytes());
                    for bbox in &entry.regions {
                        encode_bbox(&mut out, bbox);
                    }
                }
            }
            Self::LlLookup { point, bbox } => {
                encode_vector(&mut out, *point);
                encode_bbox(&mut out, bbox);
            }
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        need(buf, 1)?;
        let ty = MessageType::from_byte(buf[0])?;
        let body = &buf[1..];
        Ok(match ty {
            MessageType::LookupRequest => Self::Lookup { point: decode_vector(body)? },
            MessageType::NumServersRequest => Self::NumServers,
            MessageType::RegionRequest => Self::Region,
            MessageType::ServerRegionRequest => {
                let mut off = 0;
                Self::ServerRegion { server: decode_server_id(body, &mut off)? }
            }
            MessageType::LlServerRegionRequest => {
                let mut off = 0;
                Self::LlServerRegion { server: decode_server_id(body, &mut off)? }
            }
            MessageType::SegmentationListen => {
                need(body, 257)?;
                let host_bytes = &body[0..255];
                let end = host_bytes.iter().position(|&b| b == 0).unwrap_or(255);
                let host = std::str::from_utf8(&host_bytes[..end])
                    .map_err(|_| WireError::InvalidHost)?
                    .to_owned();
                let port = u16::from_le_bytes(body[255..257].try_into().unwrap());
                Self::SegmentationListen { host, port }
            }
            MessageType::SegmentationChange => {
                need(body, 1)?;
                let num_entries = body[0];
                if num_entries as usize > MAX_SERVER_REGIONS_CHANGED {
                    return Err(WireError::TooManyEntries(num_entries));
                }
                let mut off = 1usize;
                let mut entries = Vec::with_capacity(num_entries as usize);
                for _ in 0..num_entries {
                    let server = decode_server_id(body, &mut off)?;
                    need(&body[off..], 4)?;
                    let list_len = u32::from_le_bytes(body[off..off + 4].try_into().unwrap());
                    off += 4;
                    if list_len as usize > MAX_BBOX_LIST_SIZE {
                        return Err(WireError::BboxListTooLong(list_len));
                    }
                    let mut regions = Vec::with_capacity(list_len as usize);
                    for _ in 0..list_len {
                        need(&body[off..], 24)?;
                        regions.push(decode_bbox(&body[off..off + 24])?);
                        off += 24;
                    }
                    entries.push(SegmentationChangeEntry { server, regions });
                }
                Self::SegmentationChange(SegmentationChangeMessage { entries })
            }
            MessageType::LlLookupRequest => {
                need(body, 36)?;
                let point = decode_vector(&body[0..12])?;
                let bbox = decode_bbox(&body[12..36])?;
                Self::LlLookup { point, bbox }
            }
        })
    }
}

/// Replies, encoded without a type tag — the caller knows the shape
/// from the request it sent.
pub fn encode_server_id_reply(id: ServerId) -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    encode_server_id(&mut out, id);
    out
}

pub fn decode_server_id_reply(buf: &[u8]) -> Result<ServerId> {
    let mut off = 0;
    decode_server_id(buf, &mut off)
}

pub fn encode_num_servers_reply(n: u32) -> Vec<u8> {
    n.to_le_bytes().to_vec()
}

pub fn decode_num_servers_reply(buf: &[u8]) -> Result<u32> {
    need(buf, 4)?;
    Ok(u32::from_le_bytes(buf[0..4].try_into().unwrap()))
}

pub fn encode_bbox_reply(bbox: &BoundingBox) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    encode_bbox(&mut out, bbox);
    out
}

pub fn decode_bbox_reply(buf: &[u8]) -> Result<BoundingBox> {
    decode_bbox(buf)
}

/// `uint32 n, SerializedBBox[n]`, capped at [`MAX_BBOX_LIST_SIZE`].
pub fn encode_bbox_list_reply(boxes: &[BoundingBox]) -> Vec<u8> {
    let n = boxes.len().min(MAX_BBOX_LIST_SIZE);
    let mut out = Vec::with_capacity(4 + n * 24);
    out.extend_from_slice(&(n as u32).to_le_bytes());
    for bbox in boxes.iter().take(n) {
        encode_bbox(&mut out, bbox);
    }
    out
}

pub fn decode_bbox_list_reply(buf: &[u8]) -> Result<Vec<BoundingBox>> {
    need(buf, 4)?;
    let n = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    if n as usize > MAX_BBOX_LIST_SIZE {
        return Err(WireError::BboxListTooLong(n));
    }
    let mut off = 4usize;
    let mut out = Vec::with_capacity(n as usize);
    for _ in 0..n {
        need(&buf[off..], 24)?;
        out.push(decode_bbox(&buf[off..off + 24])?);
        off += 24;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(lo: f32, hi: f32) -> BoundingBox {
        BoundingBox::new(Vector3::new(lo, lo, lo), Vector3::new(hi, hi, hi))
    }

    #[test]
    fn lookup_request_roundtrip() {
        let req = CsegRequest::Lookup { point: Vector3::new(1.0, 2.0, 3.0) };
        let encoded = req.encode();
        assert_eq!(CsegRequest::decode(&encoded).unwrap(), req);
    }

    #[test]
    fn server_region_reply_roundtrip() {
        let boxes = vec![bbox(0.0, 1.0), bbox(1.0, 2.0)];
        let encoded = encode_bbox_list_reply(&boxes);
        assert_eq!(decode_bbox_list_reply(&encoded).unwrap(), boxes);
    }

    #[test]
    fn segmentation_change_roundtrip() {
        let msg = SegmentationChangeMessage {
            entries: vec![
                SegmentationChangeEntry { server: ServerId::assigned(3).unwrap(), regions: vec![bbox(0.0, 1.0)] },
                SegmentationChangeEntry { server: ServerId::assigned(4).unwrap(), regions: vec![] },
            ],
        };
        let req = CsegRequest::SegmentationChange(msg.clone());
        let encoded = req.encode();
        assert_eq!(CsegRequest::decode(&encoded).unwrap(), CsegRequest::SegmentationChange(msg));
    }

    #[test]
    fn segmentation_change_caps_entries() {
        let entries: Vec<_> = (0..(MAX_SERVER_REGIONS_CHANGED + 10))
            .map(|i| SegmentationChangeEntry { server: ServerId::assigned(i as u32 + 1).unwrap(), regions: vec![] })
            .collect();
        let msg = SegmentationChangeMessage::capped(entries);
        assert_eq!(msg.entries.len(), MAX_SERVER_REGIONS_CHANGED);
    }

    #[test]
    fn ll_lookup_roundtrip() {
        let req = CsegRequest::LlLookup { point: Vector3::new(0.5, -0.5, 1.5), bbox: bbox(-10.0, 10.0) };
        let encoded = req.encode();
        assert_eq!(CsegRequest::decode(&encoded).unwrap(), req);
    }

    #[test]
    fn segmentation_listen_roundtrip() {
        let req = CsegRequest::SegmentationListen { host: "cseg-3.example.org".into(), port: 9001 };
        let encoded = req.encode();
        assert_eq!(CsegRequest::decode(&encoded).unwrap(), req);
    }

    #[test]
    fn unknown_message_type_errors() {
        assert_eq!(CsegRequest::decode(&[255]), Err(WireError::UnknownMessageType(255)));
    }

    #[test]
    fn truncated_frame_errors() {
        assert_eq!(
            CsegRequest::decode(&[MessageType::LookupRequest as u8, 0, 0]),
            Err(WireError::TooShort { need: 12, have: 2 })
        );
    }
}
