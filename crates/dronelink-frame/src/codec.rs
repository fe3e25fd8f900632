use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::{FrameError, Result};

/// Segment header: code (2) + size (2) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Default receive buffer for one datagram. Telemetry segments are well
/// under this; larger datagrams are truncated by the socket and then rejected
/// by [`decode_segment`].
pub const DEFAULT_MAX_DATAGRAM: usize = 512;

/// Largest payload representable by the 16-bit size field, in bytes.
const MAX_PAYLOAD_BYTES: usize = u16::MAX as usize - 1;

/// One protocol message.
///
/// The payload size on the wire is always `payload.len() * 2`, so it is
/// derived rather than stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    code: u16,
    payload: Vec<i16>,
}

impl Segment {
    /// Create a segment from a code and payload elements.
    pub fn new(code: u16, payload: Vec<i16>) -> Self {
        Self { code, payload }
    }

    /// A command that carries no data.
    ///
    /// The flight controller expects one zero element in that case, so the
    /// wire form is `size = 2`, payload `[0]`.
    pub fn command(code: u16) -> Self {
        Self::new(code, vec![0])
    }

    /// The operation code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// The payload size in bytes as written to the wire.
    pub fn size(&self) -> usize {
        self.payload.len() * 2
    }

    /// The payload elements.
    pub fn payload(&self) -> &[i16] {
        &self.payload
    }

    /// Consume the segment and return its payload.
    pub fn into_payload(self) -> Vec<i16> {
        self.payload
    }

    /// The total wire size of this segment (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.size()
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        encode_segment(self.code, &self.payload, &mut buf)?;
        Ok(buf.freeze())
    }
}

/// Encode a segment into the wire format.
///
/// Wire format (all big-endian):
/// ```text
/// ┌───────────┬───────────┬──────────────────────────────┐
/// │ Code (2B) │ Size (2B) │ Payload (Size bytes)          │
/// │           │ in bytes  │ Size/2 × i16                  │
/// └───────────┴───────────┴──────────────────────────────┘
/// ```
///
/// No datagram ceiling is enforced here; callers respect the transport's.
pub fn encode_segment(code: u16, payload: &[i16], dst: &mut BytesMut) -> Result<()> {
    let size = payload.len() * 2;
    if size > MAX_PAYLOAD_BYTES {
        return Err(FrameError::PayloadTooLarge {
            size,
            max: MAX_PAYLOAD_BYTES,
        });
    }
    dst.reserve(HEADER_SIZE + size);
    dst.put_u16(code);
    dst.put_u16(size as u16);
    for &value in payload {
        dst.put_i16(value);
    }
    Ok(())
}

/// Decode one segment from a received datagram.
///
/// Only the declared `size` bytes after the header are read. Anything past
/// them (for example, the unused tail of a fixed receive buffer) is ignored.
pub fn decode_segment(datagram: &[u8]) -> Result<Segment> {
    if datagram.len() < HEADER_SIZE {
        return Err(FrameError::MalformedPacket(format!(
            "datagram of {} bytes is shorter than the {HEADER_SIZE}-byte header",
            datagram.len()
        )));
    }

    let mut src = datagram;
    let code = src.get_u16();
    let size = src.get_u16() as usize;

    if size % 2 != 0 {
        return Err(FrameError::MalformedPacket(format!(
            "odd payload size {size} for code {code}"
        )));
    }

    if src.len() < size {
        return Err(FrameError::MalformedPacket(format!(
            "declared payload size {size} exceeds the {} bytes available",
            src.len()
        )));
    }

    let mut body = &src[..size];
    let mut payload = Vec::with_capacity(size / 2);
    while body.has_remaining() {
        payload.push(body.get_i16());
    }

    Ok(Segment { code, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{RAW_IMU, RC, SET_RC, START_CONNECTION};

    #[test]
    fn test_encode_decode_roundtrip() {
        let payload = [1500, -1500, 0, i16::MAX, i16::MIN];
        let mut buf = BytesMut::new();

        encode_segment(SET_RC, &payload, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + payload.len() * 2);

        let segment = decode_segment(&buf).unwrap();
        assert_eq!(segment, Segment::new(SET_RC, payload.to_vec()));
        assert_eq!(segment.size(), 10);
    }

    #[test]
    fn test_encode_rc_wire_bytes() {
        let mut buf = BytesMut::new();
        encode_segment(RC, &[1500, 1500, 1500, 1500], &mut buf).unwrap();
        assert_eq!(
            buf.as_ref(),
            &[0x00, 0x69, 0x00, 0x08, 0x05, 0xDC, 0x05, 0xDC, 0x05, 0xDC, 0x05, 0xDC]
        );
    }

    #[test]
    fn test_negative_values_are_twos_complement() {
        let bytes = Segment::new(RAW_IMU, vec![-1, -256]).to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), &[0x00, 0x66, 0x00, 0x04, 0xFF, 0xFF, 0xFF, 0x00]);
    }

    #[test]
    fn test_decode_short_header() {
        let result = decode_segment(&[0x01, 0x2C, 0x00]);
        assert!(matches!(result, Err(FrameError::MalformedPacket(_))));
    }

    #[test]
    fn test_decode_truncated_payload() {
        let mut buf = BytesMut::new();
        encode_segment(RC, &[1, 2, 3, 4], &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 5);

        let result = decode_segment(&buf);
        assert!(matches!(result, Err(FrameError::MalformedPacket(_))));
    }

    #[test]
    fn test_decode_odd_size_rejected() {
        let datagram = [0x00, 0x69, 0x00, 0x03, 0x00, 0x01, 0x02];
        let result = decode_segment(&datagram);
        assert!(matches!(result, Err(FrameError::MalformedPacket(_))));
    }

    #[test]
    fn test_decode_ignores_buffer_padding() {
        // A fixed 40-byte receive buffer holding a header-only segment.
        let mut datagram = [0u8; 40];
        datagram[..4].copy_from_slice(&[0x01, 0x2D, 0x00, 0x00]);

        let segment = decode_segment(&datagram).unwrap();
        assert_eq!(segment.code(), 301);
        assert!(segment.payload().is_empty());
    }

    #[test]
    fn test_decode_reads_declared_size_only() {
        let mut datagram = Segment::new(RC, vec![7, 8]).to_bytes().unwrap().to_vec();
        datagram.extend_from_slice(&[0xAA; 12]);

        let segment = decode_segment(&datagram).unwrap();
        assert_eq!(segment.payload(), &[7, 8]);
    }

    #[test]
    fn test_command_carries_single_zero() {
        let segment = Segment::command(START_CONNECTION);
        assert_eq!(segment.payload(), &[0]);
        assert_eq!(
            segment.to_bytes().unwrap().as_ref(),
            &[0x01, 0x2C, 0x00, 0x02, 0x00, 0x00]
        );
    }

    #[test]
    fn test_empty_payload() {
        let bytes = Segment::new(SET_RC, Vec::new()).to_bytes().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);

        let segment = decode_segment(&bytes).unwrap();
        assert_eq!(segment.code(), SET_RC);
        assert_eq!(segment.size(), 0);
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![0i16; MAX_PAYLOAD_BYTES / 2 + 1];
        let mut buf = BytesMut::new();
        let result = encode_segment(RC, &payload, &mut buf);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_segment_wire_size() {
        let segment = Segment::new(RC, vec![1, 2, 3, 4]);
        assert_eq!(segment.wire_size(), HEADER_SIZE + 8);
    }
}
