/// Errors that can occur during segment encoding, decoding, or projection.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The datagram header or declared size is inconsistent with its length.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// The payload does not fit in the 16-bit size field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The payload is shorter than the projection requires.
    #[error("{kind} payload too short ({actual} elements, need {expected})")]
    PayloadTooShort {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The segment code cannot be interpreted by the requested projection.
    #[error("unsupported segment code {0}")]
    UnsupportedSegment(u16),
}

pub type Result<T> = std::result::Result<T, FrameError>;
