//! Wire framing and reassembly
//!
//! Each logical message travels as a 4-byte big-endian length prefix
//! followed by the body; the prefix counts the whole frame, itself
//! included. The transport owes us ordered bytes but nothing else: one
//! delivery may carry several frames, a fraction of one, or even a
//! fraction of the prefix. [`FrameAssembler`] absorbs chunks in arrival
//! order and emits every frame a chunk completes.

use crate::errors::FramingError;

/// Length prefix size on the wire.
pub const PREFIX_SIZE: usize = 4;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One complete message body, immutable once assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    pub fn body(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Prefix a message body for the wire.
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, FramingError> {
    let total = body
        .len()
        .checked_add(PREFIX_SIZE)
        .filter(|total| u32::try_from(*total).is_ok())
        .ok_or(FramingError::BodyTooLarge {
            size: body.len(),
            max: u32::MAX as usize - PREFIX_SIZE,
        })?;

    let mut framed = Vec::with_capacity(total);
    framed.extend_from_slice(&(total as u32).to_be_bytes());
    framed.extend_from_slice(body);
    Ok(framed)
}

// ----------------------------------------------------------------------------
// Frame Assembler
// ----------------------------------------------------------------------------

/// Incremental reassembler for one connection's inbound byte stream.
///
/// At most one message is in flight at a time per connection; leftover
/// bytes after a completed frame belong to the next message and stay
/// buffered. A declared length outside the sane range is unrecoverable for
/// the stream, so callers should drop the connection on error.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    max_frame_size: usize,
}

impl FrameAssembler {
    pub fn new(max_frame_size: usize) -> Self {
        FrameAssembler {
            buffer: Vec::new(),
            max_frame_size,
        }
    }

    /// Absorb one transport delivery, returning every frame it completed
    /// in arrival order.
    pub fn append(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, FramingError> {
        self.buffer.extend_from_slice(chunk);

        let mut completed = Vec::new();
        loop {
            if self.buffer.len() < PREFIX_SIZE {
                break;
            }

            let mut prefix = [0u8; PREFIX_SIZE];
            prefix.copy_from_slice(&self.buffer[..PREFIX_SIZE]);
            let declared = u32::from_be_bytes(prefix) as usize;

            if declared <= PREFIX_SIZE {
                return Err(FramingError::LengthTooSmall { declared });
            }
            if declared > self.max_frame_size {
                return Err(FramingError::LengthTooLarge {
                    declared,
                    max: self.max_frame_size,
                });
            }
            if self.buffer.len() < declared {
                break;
            }

            let body = self.buffer[PREFIX_SIZE..declared].to_vec();
            self.buffer.drain(..declared);
            completed.push(Frame(body));
        }

        Ok(completed)
    }

    /// True while a message is partially assembled.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Bytes currently buffered for the in-flight message.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1024;

    fn assembler() -> FrameAssembler {
        FrameAssembler::new(MAX)
    }

    #[test]
    fn test_single_delivery_single_frame() {
        let mut asm = assembler();
        let wire = encode_frame(b"hello deck").unwrap();

        let frames = asm.append(&wire).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].body(), b"hello deck");
        assert!(!asm.has_partial());
    }

    #[test]
    fn test_every_split_position_reassembles() {
        let wire = encode_frame(b"split me anywhere").unwrap();

        for split_at in 1..wire.len() {
            let mut asm = assembler();
            let first = asm.append(&wire[..split_at]).unwrap();
            assert!(first.is_empty(), "early frame at split {split_at}");
            let second = asm.append(&wire[split_at..]).unwrap();
            assert_eq!(second.len(), 1, "no frame at split {split_at}");
            assert_eq!(second[0].body(), b"split me anywhere");
            assert!(!asm.has_partial());
        }
    }

    #[test]
    fn test_byte_at_a_time_delivery() {
        let wire = encode_frame(b"drip feed").unwrap();
        let mut asm = assembler();
        let mut frames = Vec::new();
        for byte in &wire {
            frames.extend(asm.append(std::slice::from_ref(byte)).unwrap());
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].body(), b"drip feed");
    }

    #[test]
    fn test_amalgamated_delivery_splits_into_frames() {
        let mut wire = encode_frame(b"first").unwrap();
        wire.extend(encode_frame(b"second").unwrap());
        wire.extend(encode_frame(b"third").unwrap());

        let mut asm = assembler();
        let frames = asm.append(&wire).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].body(), b"first");
        assert_eq!(frames[1].body(), b"second");
        assert_eq!(frames[2].body(), b"third");
    }

    #[test]
    fn test_amalgamated_delivery_with_trailing_partial() {
        let mut wire = encode_frame(b"whole").unwrap();
        let second = encode_frame(b"partial").unwrap();
        wire.extend(&second[..second.len() - 3]);

        let mut asm = assembler();
        let frames = asm.append(&wire).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(asm.has_partial());

        let rest = asm.append(&second[second.len() - 3..]).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].body(), b"partial");
        assert!(!asm.has_partial());
    }

    #[test]
    fn test_assembler_resets_between_messages() {
        let mut asm = assembler();
        for round in 0..5u8 {
            let body = vec![round; 16];
            let frames = asm.append(&encode_frame(&body).unwrap()).unwrap();
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].body(), body.as_slice());
            assert_eq!(asm.pending_len(), 0);
        }
    }

    #[test]
    fn test_declared_length_too_small_is_an_error() {
        // A prefix claiming the frame is only the prefix itself.
        let mut asm = assembler();
        let err = asm.append(&4u32.to_be_bytes()).unwrap_err();
        assert!(matches!(err, FramingError::LengthTooSmall { declared: 4 }));
    }

    #[test]
    fn test_declared_length_beyond_max_is_an_error() {
        let mut asm = assembler();
        let err = asm.append(&(MAX as u32 + 1).to_be_bytes()).unwrap_err();
        assert!(matches!(
            err,
            FramingError::LengthTooLarge { max: MAX, .. }
        ));
    }

    #[test]
    fn test_encode_frame_prefix_counts_itself() {
        let wire = encode_frame(b"abc").unwrap();
        assert_eq!(wire.len(), 7);
        assert_eq!(&wire[..4], &7u32.to_be_bytes());
        assert_eq!(&wire[4..], b"abc");
    }
}
