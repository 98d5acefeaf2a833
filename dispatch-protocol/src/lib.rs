// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire contract between a dispatcher parent and its worker processes:
//! the payload schema, the flag enum, and the frame codec that turns a
//! byte stream into a lazy sequence of payloads (and back).

mod codec;
mod error;
mod flag;
mod payload;

pub use codec::{FrameCodec, FRAME_DELIMITER};
pub use error::ProtocolError;
pub use flag::Flag;
pub use payload::{
    AvailablePayload, DispatchRequest, DispatchResponse, ErrorBody, ErrorPayload, IpcPayload,
    LogBody, LogLevel, LogPayload, Payload, PayloadShapeError,
};
