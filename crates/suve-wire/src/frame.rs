//! Length-prefixed framing over a blocking byte stream.

use std::io::{Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::WireError;

/// Bytes of length prefix before every frame body.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Upper bound on a frame body. A whole staged state rides in one frame,
/// so the bound is generous; anything larger is a protocol violation.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Encodes `msg` and writes it as one frame.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> Result<(), WireError> {
    let body = postcard::to_allocvec(msg).map_err(WireError::Encode)?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge(body.len()));
    }
    let len = u32::try_from(body.len()).map_err(|_| WireError::FrameTooLarge(body.len()))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame and decodes its body.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, WireError> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut header)?;
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge(len));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    postcard::from_bytes(&body).map_err(WireError::Decode)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn frame_round_trips() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &("hello".to_string(), 42u32)).unwrap();
        assert_eq!(
            u32::from_be_bytes(buf[..4].try_into().unwrap()) as usize,
            buf.len() - FRAME_HEADER_SIZE
        );
        let decoded: (String, u32) = read_frame(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, ("hello".to_string(), 42));
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&u32::MAX.to_be_bytes());
        buf.extend_from_slice(b"junk");
        let result: Result<String, _> = read_frame(&mut buf.as_slice());
        assert!(matches!(result, Err(WireError::FrameTooLarge(_))));
    }

    #[test]
    fn truncated_body_is_an_io_error() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&8u32.to_be_bytes());
        buf.extend_from_slice(&[1, 2, 3]);
        let result: Result<String, _> = read_frame(&mut buf.as_slice());
        assert!(matches!(result, Err(WireError::Io(_))));
    }

    proptest! {
        #[test]
        fn arbitrary_strings_round_trip(payload in ".*") {
            let mut buf = Vec::new();
            write_frame(&mut buf, &payload).unwrap();
            let decoded: String = read_frame(&mut buf.as_slice()).unwrap();
            prop_assert_eq!(decoded, payload);
        }
    }
}
