//! # suve-wire: Binary wire protocol for the suve agent
//!
//! Requests and responses exchanged between clients and the long-running
//! agent over a local socket. Frames are a 4-byte big-endian length prefix
//! followed by a postcard-encoded body; the verb set is fixed and every
//! request carries its (account, region, service-or-all) scope.

mod frame;
mod protocol;

pub use frame::{FRAME_HEADER_SIZE, MAX_FRAME_SIZE, read_frame, write_frame};
pub use protocol::{ErrorCode, ErrorResponse, PROTOCOL_VERSION, Request, Response, Scope, Verb};
pub use suve_types::Hint;

/// Wire-level failures: transport errors, malformed frames, oversized
/// payloads.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("io error on agent socket: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode message: {0}")]
    Encode(postcard::Error),

    #[error("failed to decode message: {0}")]
    Decode(postcard::Error),

    #[error("frame of {0} bytes exceeds the {MAX_FRAME_SIZE}-byte limit")]
    FrameTooLarge(usize),
}
