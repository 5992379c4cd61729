//! `[u8 type][u32 big-endian length][JSON payload]` framing.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{ControlError, ControlMessage, MessageType};

pub const HEADER_LEN: usize = 5;
pub const MAX_PAYLOAD_LEN: usize = 1024 * 1024;

#[derive(Debug, Default, Clone, Copy)]
pub struct ControlCodec;

impl Decoder for ControlCodec {
    type Item = ControlMessage;
    type Error = ControlError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ControlMessage>, ControlError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        if len > MAX_PAYLOAD_LEN {
            return Err(ControlError::Codec(format!(
                "payload of {len} bytes exceeds the {MAX_PAYLOAD_LEN} byte limit"
            )));
        }
        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        let kind = MessageType::from_byte(src[0]);
        src.advance(HEADER_LEN);
        let payload = src.split_to(len).freeze();
        ControlMessage::decode(kind?, &payload).map(Some)
    }
}

impl Encoder<ControlMessage> for ControlCodec {
    type Error = ControlError;

    fn encode(&mut self, item: ControlMessage, dst: &mut BytesMut) -> Result<(), ControlError> {
        let payload = item.encode_payload()?;
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ControlError::Codec(format!(
                "payload of {} bytes exceeds the {MAX_PAYLOAD_LEN} byte limit",
                payload.len()
            )));
        }

        dst.reserve(HEADER_LEN + payload.len());
        dst.put_u8(item.message_type() as u8);
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ForwardRequest, GitEventAck};

    #[test]
    fn frame_layout() {
        let mut buf = BytesMut::new();
        ControlCodec
            .encode(ControlMessage::GitEventAck(GitEventAck { handled: true }), &mut buf)
            .unwrap();

        let payload = br#"{"handled":true}"#;
        assert_eq!(buf[0], 0x33);
        assert_eq!(&buf[1..5], &(payload.len() as u32).to_be_bytes());
        assert_eq!(&buf[5..], payload);
    }

    #[test]
    fn decodes_across_partial_reads() {
        let message = ControlMessage::ForwardRequest(ForwardRequest {
            session_id: "s1".into(),
            command: "ls -la".into(),
        });
        let mut encoded = BytesMut::new();
        ControlCodec.encode(message.clone(), &mut encoded).unwrap();

        let mut src = BytesMut::new();
        src.extend_from_slice(&encoded[..3]);
        assert_eq!(ControlCodec.decode(&mut src).unwrap(), None);
        src.extend_from_slice(&encoded[3..10]);
        assert_eq!(ControlCodec.decode(&mut src).unwrap(), None);
        src.extend_from_slice(&encoded[10..]);
        assert_eq!(ControlCodec.decode(&mut src).unwrap(), Some(message));
        assert!(src.is_empty());
    }

    #[test]
    fn oversized_and_unknown_frames_fail() {
        let mut src = BytesMut::from(&[0x20, 0xff, 0xff, 0xff, 0xff][..]);
        assert!(matches!(ControlCodec.decode(&mut src), Err(ControlError::Codec(_))));

        let mut src = BytesMut::from(&[0x77, 0, 0, 0, 2, b'{', b'}'][..]);
        assert!(matches!(ControlCodec.decode(&mut src), Err(ControlError::Codec(_))));
    }
}
