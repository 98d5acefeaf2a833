// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::payload::IpcPayload;

/// Multi-character sentinel chosen over a single delimiter byte to avoid
/// collisions with JSON content.
pub const FRAME_DELIMITER: &str = "<--- END OF DATA --->";

/// Frames a JSON-encoded [`IpcPayload`] as `JSON-TEXT || FRAME_DELIMITER ||
/// "\n"` on the wire. The decoder maintains an append-only buffer and
/// produces a lazy, restartable sequence of frames: it never blocks, never
/// discards leading bytes, and tolerates arbitrary chunking of the
/// underlying byte stream.
#[derive(Debug, Default)]
pub struct FrameCodec {
    _private: (),
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    let needle = FRAME_DELIMITER.as_bytes();
    buf.windows(needle.len()).position(|w| w == needle)
}

impl Decoder for FrameCodec {
    type Item = IpcPayload;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<IpcPayload>, ProtocolError> {
        let Some(delim_start) = find_delimiter(src) else {
            // No complete frame yet; buffer as-is and wait for more bytes.
            return Ok(None);
        };

        let delim_end = delim_start + FRAME_DELIMITER.len();
        // The delimiter is always followed by a newline on the wire, but we
        // tolerate its absence (e.g. stream truncated right after the
        // delimiter) rather than waiting forever for a byte that may never
        // come.
        let mut consume_to = delim_end;
        if src.get(consume_to) == Some(&b'\n') {
            consume_to += 1;
        }

        let json_bytes = src.split_to(delim_start);
        src.advance(consume_to - delim_start);

        let payload: IpcPayload = serde_json::from_slice(&json_bytes)?;
        Ok(Some(payload))
    }
}

impl Encoder<IpcPayload> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: IpcPayload, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let json = serde_json::to_vec(&item)?;
        dst.reserve(json.len() + FRAME_DELIMITER.len() + 1);
        dst.extend_from_slice(&json);
        dst.extend_from_slice(FRAME_DELIMITER.as_bytes());
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::Flag;

    fn sample(payload_id: &str) -> IpcPayload {
        IpcPayload {
            flag: Flag::Dispatch.wire_value(),
            payload_id: Some(payload_id.to_string()),
            process_id: 0,
            service_name: Some("Echo".into()),
            service_scope_name: None,
            method_name: Some("echo".into()),
            method_arguments: Some(vec![serde_json::json!("hi")]),
            result: None,
        }
    }

    #[test]
    fn round_trips_a_single_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(sample("1"), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, sample("1"));
        assert!(buf.is_empty());
    }

    #[test]
    fn yields_no_frame_until_the_delimiter_arrives() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(sample("1"), &mut buf).unwrap();
        let full_len = buf.len();
        let mut partial = buf.split_to(full_len - 5);
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn decodes_k_concatenated_frames_in_order_regardless_of_chunking() {
        let mut codec = FrameCodec::new();
        let mut full = BytesMut::new();
        for i in 0..5 {
            codec
                .encode(sample(&i.to_string()), &mut full)
                .unwrap();
        }

        // Feed the decoder one byte at a time to simulate arbitrary chunking.
        let mut fed = BytesMut::new();
        let mut decoded = Vec::new();
        for byte in full.iter() {
            fed.extend_from_slice(&[*byte]);
            while let Some(p) = codec.decode(&mut fed).unwrap() {
                decoded.push(p);
            }
        }

        assert_eq!(decoded.len(), 5);
        for (i, p) in decoded.iter().enumerate() {
            assert_eq!(p.payload_id.as_deref(), Some(i.to_string().as_str()));
        }
    }

    #[test]
    fn buffers_a_trailing_partial_frame_after_two_complete_ones() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(sample("a"), &mut buf).unwrap();
        codec.encode(sample("b"), &mut buf).unwrap();
        codec.encode(sample("c"), &mut buf).unwrap();
        let full_len = buf.len();
        let third_frame_len = {
            let mut tmp = BytesMut::new();
            codec.encode(sample("c"), &mut tmp).unwrap();
            tmp.len()
        };
        let mut chunk = buf.split_to(full_len - third_frame_len + third_frame_len / 2);

        let mut decoded = Vec::new();
        while let Some(p) = codec.decode(&mut chunk).unwrap() {
            decoded.push(p);
        }
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].payload_id.as_deref(), Some("a"));
        assert_eq!(decoded[1].payload_id.as_deref(), Some("b"));

        // feed the rest of frame "c"
        chunk.unsplit(buf);
        while let Some(p) = codec.decode(&mut chunk).unwrap() {
            decoded.push(p);
        }
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[2].payload_id.as_deref(), Some("c"));
    }

    #[test]
    fn malformed_frame_is_an_error_but_decoder_advances_past_delimiter() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"not json");
        buf.extend_from_slice(FRAME_DELIMITER.as_bytes());
        buf.extend_from_slice(b"\n");
        codec.encode(sample("after"), &mut buf).unwrap();

        assert!(codec.decode(&mut buf).is_err());
        let next = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(next.payload_id.as_deref(), Some("after"));
    }
}
