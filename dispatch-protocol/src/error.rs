// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors from the framing layer. These never cross the dispatch boundary
/// to a caller: a malformed frame is logged and dropped by the reader, and
/// the next frame in the stream is still parsed (see `FrameCodec::decode`).
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("failed to decode frame: {0}")]
    FrameDecode(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::FrameDecode(err.to_string())
    }
}
