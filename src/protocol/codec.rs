//! Stream codec turning a TCP byte stream into [`Frame`]s.

// ============================================================================
// Imports
// ============================================================================

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{Error, Result};

use super::frame::{Frame, HEADER_SIZE, Header, MAX_FRAME_SIZE};

// ============================================================================
// FrameCodec
// ============================================================================

/// Length-delimited codec for the brickd frame format.
///
/// The length byte lives inside the header, so a frame is only yielded once
/// the whole announced length is buffered. A header with an impossible
/// length is a fatal protocol error: there is no way to resynchronise.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < HEADER_SIZE {
            src.reserve(MAX_FRAME_SIZE - src.len());
            return Ok(None);
        }

        let header = Header::decode(&src[..HEADER_SIZE])?;
        let length = usize::from(header.length);

        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        let mut raw = src.split_to(length);
        raw.advance(HEADER_SIZE);

        Ok(Some(Frame {
            header,
            payload: raw.freeze(),
        }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        if usize::from(frame.header.length) != HEADER_SIZE + frame.payload.len() {
            return Err(Error::protocol(format!(
                "Header length {} does not match payload of {} bytes",
                frame.header.length,
                frame.payload.len()
            )));
        }

        dst.reserve(usize::from(frame.header.length));
        frame.header.encode(dst);
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;
    use proptest::prelude::*;

    use crate::error::ErrorCode;
    use crate::identifiers::Uid;
    use crate::protocol::frame::MAX_PAYLOAD_SIZE;

    fn frame(payload: &[u8]) -> Frame {
        let uid = Uid::parse("XYZ").expect("uid");
        Frame::new(uid, 12, Bytes::copy_from_slice(payload)).expect("frame")
    }

    #[test]
    fn test_decode_waits_for_full_frame() {
        let mut codec = FrameCodec;
        let mut wire = BytesMut::new();
        codec.encode(frame(b"test"), &mut wire).expect("encode");

        let mut partial = wire.split_to(10);
        assert!(codec.decode(&mut partial).expect("decode").is_none());

        partial.unsplit(wire);
        let decoded = codec.decode(&mut partial).expect("decode").expect("frame");
        assert_eq!(&decoded.payload[..], b"test");
        assert!(partial.is_empty());
    }

    #[test]
    fn test_decode_two_frames_back_to_back() {
        let mut codec = FrameCodec;
        let mut wire = BytesMut::new();
        codec.encode(frame(b"a"), &mut wire).expect("encode");
        codec.encode(frame(b"bc"), &mut wire).expect("encode");

        let first = codec.decode(&mut wire).expect("decode").expect("first");
        let second = codec.decode(&mut wire).expect("decode").expect("second");
        assert_eq!(&first.payload[..], b"a");
        assert_eq!(&second.payload[..], b"bc");
        assert!(codec.decode(&mut wire).expect("decode").is_none());
    }

    #[test]
    fn test_decode_rejects_garbage_length() {
        let mut codec = FrameCodec;
        let mut wire = BytesMut::from(&[1_u8, 0, 0, 0, 200, 1, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut wire),
            Err(Error::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn test_framed_reads_split_socket_data() {
        use futures_util::StreamExt;
        use tokio_util::codec::FramedRead;

        let mut wire = BytesMut::new();
        FrameCodec.encode(frame(b"hello"), &mut wire).expect("encode");
        FrameCodec.encode(frame(b""), &mut wire).expect("encode");

        // Header split mid-way, second frame glued to the first.
        let mock = tokio_test::io::Builder::new()
            .read(&wire[..5])
            .read(&wire[5..11])
            .read(&wire[11..])
            .build();
        let mut frames = FramedRead::new(mock, FrameCodec);

        let first = frames.next().await.expect("first").expect("decode");
        assert_eq!(&first.payload[..], b"hello");
        let second = frames.next().await.expect("second").expect("decode");
        assert!(second.payload.is_empty());
        assert!(frames.next().await.is_none());
    }

    #[test]
    fn test_encode_rejects_inconsistent_header() {
        let mut codec = FrameCodec;
        let mut bad = frame(b"abc");
        bad.header.length = 9;
        assert!(codec.encode(bad, &mut BytesMut::new()).is_err());
    }

    proptest! {
        #[test]
        fn prop_payload_and_header_survive_the_wire(
            payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_SIZE),
            sequence in 0_u8..=15,
            function_id in any::<u8>(),
            response_expected in any::<bool>(),
            code in 0_u8..4,
        ) {
            let uid = Uid::parse("XYZ").expect("uid");
            let mut original = Frame::new(uid, function_id, payload).expect("frame");
            original.header.sequence = sequence;
            original.header.response_expected = response_expected;
            original.header.error_code = ErrorCode::from_bits(code);

            let mut codec = FrameCodec;
            let mut wire = BytesMut::new();
            codec.encode(original.clone(), &mut wire).expect("encode");
            let decoded = codec.decode(&mut wire).expect("decode").expect("frame");

            prop_assert_eq!(decoded, original);
        }
    }
}
