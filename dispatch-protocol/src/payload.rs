// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::flag::Flag;

/// The raw wire record, exactly as it appears on the JSON line. This is the
/// single record exchanged in both directions; `result` is deliberately a
/// loosely-typed `serde_json::Value` here because its shape depends on
/// `flag` (see [`Payload`] for the type-safe view built on top of it).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IpcPayload {
    pub flag: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_id: Option<String>,
    pub process_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_scope_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_arguments: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl IpcPayload {
    pub fn flag(&self) -> Option<Flag> {
        Flag::from_wire(self.flag)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogBody {
    pub log_level: LogLevel,
    pub log_parameters: Vec<serde_json::Value>,
}

/// A request to invoke `method_name` on `service_name` (optionally scoped)
/// with `method_arguments`, correlated by `payload_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub payload_id: String,
    pub process_id: u32,
    pub service_name: String,
    pub service_scope_name: Option<String>,
    pub method_name: String,
    pub method_arguments: Vec<serde_json::Value>,
}

/// The success response to a `DispatchRequest` with the same `payload_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    pub payload_id: String,
    pub process_id: u32,
    pub result: serde_json::Value,
}

/// A failure response. `payload_id` is `None` for errors that do not refer
/// to a specific in-flight request (e.g. a worker-wide initializer failure
/// reported before any request has a chance to correlate against it).
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorPayload {
    pub payload_id: Option<String>,
    pub process_id: u32,
    pub message: String,
    pub stack: Option<String>,
}

/// Redirected console output from a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct LogPayload {
    pub process_id: u32,
    pub log_level: LogLevel,
    pub log_parameters: Vec<serde_json::Value>,
}

/// Worker-initiated availability signal (round-robin + busy-bit scheduler
/// variant only; see dispatch-core's scheduler module).
#[derive(Debug, Clone, PartialEq)]
pub struct AvailablePayload {
    pub process_id: u32,
}

/// Type-safe view over [`IpcPayload`] that ties `flag` and the shape of
/// `result` together, so callers can never observe a `Log` body where an
/// `Error` body was expected.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Dispatch(DispatchRequest),
    DispatchResponse(DispatchResponse),
    Error(ErrorPayload),
    Log(LogPayload),
    Available(AvailablePayload),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PayloadShapeError {
    #[error("payload carries an unrecognised or non-positive flag: {0}")]
    UnknownFlag(i32),
    #[error("dispatch request payload is missing a required field: {0}")]
    MissingField(&'static str),
    #[error("payload result does not match the shape expected for its flag: {0}")]
    MalformedResult(String),
}

impl Payload {
    /// A `Dispatch` payload is a request if it carries a `serviceName`; a
    /// response if it does not (the worker echoes `payloadId` and sets
    /// `result` instead).
    pub fn from_wire(raw: IpcPayload) -> Result<Payload, PayloadShapeError> {
        let flag = raw
            .flag()
            .ok_or(PayloadShapeError::UnknownFlag(raw.flag))?;
        match flag {
            Flag::Dispatch => {
                if let Some(service_name) = raw.service_name {
                    let payload_id = raw
                        .payload_id
                        .ok_or(PayloadShapeError::MissingField("payloadId"))?;
                    let method_name = raw
                        .method_name
                        .ok_or(PayloadShapeError::MissingField("methodName"))?;
                    Ok(Payload::Dispatch(DispatchRequest {
                        payload_id,
                        process_id: raw.process_id,
                        service_name,
                        service_scope_name: raw.service_scope_name,
                        method_name,
                        method_arguments: raw.method_arguments.unwrap_or_default(),
                    }))
                } else {
                    let payload_id = raw
                        .payload_id
                        .ok_or(PayloadShapeError::MissingField("payloadId"))?;
                    Ok(Payload::DispatchResponse(DispatchResponse {
                        payload_id,
                        process_id: raw.process_id,
                        result: raw.result.unwrap_or(serde_json::Value::Null),
                    }))
                }
            }
            Flag::Error => {
                let body: ErrorBody = match raw.result {
                    Some(v) => serde_json::from_value(v)
                        .map_err(|e| PayloadShapeError::MalformedResult(e.to_string()))?,
                    None => return Err(PayloadShapeError::MissingField("result")),
                };
                Ok(Payload::Error(ErrorPayload {
                    payload_id: raw.payload_id,
                    process_id: raw.process_id,
                    message: body.message,
                    stack: body.stack,
                }))
            }
            Flag::Log => {
                let body: LogBody = match raw.result {
                    Some(v) => serde_json::from_value(v)
                        .map_err(|e| PayloadShapeError::MalformedResult(e.to_string()))?,
                    None => return Err(PayloadShapeError::MissingField("result")),
                };
                Ok(Payload::Log(LogPayload {
                    process_id: raw.process_id,
                    log_level: body.log_level,
                    log_parameters: body.log_parameters,
                }))
            }
            Flag::Available => Ok(Payload::Available(AvailablePayload {
                process_id: raw.process_id,
            })),
        }
    }

    pub fn into_wire(self) -> IpcPayload {
        match self {
            Payload::Dispatch(r) => IpcPayload {
                flag: Flag::Dispatch.wire_value(),
                payload_id: Some(r.payload_id),
                process_id: r.process_id,
                service_name: Some(r.service_name),
                service_scope_name: r.service_scope_name,
                method_name: Some(r.method_name),
                method_arguments: Some(r.method_arguments),
                result: None,
            },
            Payload::DispatchResponse(r) => IpcPayload {
                flag: Flag::Dispatch.wire_value(),
                payload_id: Some(r.payload_id),
                process_id: r.process_id,
                service_name: None,
                service_scope_name: None,
                method_name: None,
                method_arguments: None,
                result: Some(r.result),
            },
            Payload::Error(e) => IpcPayload {
                flag: Flag::Error.wire_value(),
                payload_id: e.payload_id,
                process_id: e.process_id,
                service_name: None,
                service_scope_name: None,
                method_name: None,
                method_arguments: None,
                result: Some(
                    serde_json::to_value(ErrorBody {
                        message: e.message,
                        stack: e.stack,
                    })
                    .expect("ErrorBody always serialises"),
                ),
            },
            Payload::Log(l) => IpcPayload {
                flag: Flag::Log.wire_value(),
                payload_id: None,
                process_id: l.process_id,
                service_name: None,
                service_scope_name: None,
                method_name: None,
                method_arguments: None,
                result: Some(
                    serde_json::to_value(LogBody {
                        log_level: l.log_level,
                        log_parameters: l.log_parameters,
                    })
                    .expect("LogBody always serialises"),
                ),
            },
            Payload::Available(a) => IpcPayload {
                flag: Flag::Available.wire_value(),
                payload_id: None,
                process_id: a.process_id,
                service_name: None,
                service_scope_name: None,
                method_name: None,
                method_arguments: None,
                result: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_request_round_trips_through_wire() {
        let req = Payload::Dispatch(DispatchRequest {
            payload_id: "abc123".into(),
            process_id: 2,
            service_name: "EchoService".into(),
            service_scope_name: Some("scope-a".into()),
            method_name: "echo".into(),
            method_arguments: vec![serde_json::json!("hello")],
        });
        let wire = req.clone().into_wire();
        let json = serde_json::to_string(&wire).unwrap();
        let parsed: IpcPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(Payload::from_wire(parsed).unwrap(), req);
    }

    #[test]
    fn error_response_round_trips_with_stack() {
        let err = Payload::Error(ErrorPayload {
            payload_id: Some("req-1".into()),
            process_id: 0,
            message: "boom".into(),
            stack: Some("at foo (bar.rs:1)".into()),
        });
        let wire = err.clone().into_wire();
        assert_eq!(Payload::from_wire(wire).unwrap(), err);
    }

    #[test]
    fn unknown_flag_is_rejected_not_panicked() {
        let raw = IpcPayload {
            flag: 99,
            payload_id: None,
            process_id: 0,
            service_name: None,
            service_scope_name: None,
            method_name: None,
            method_arguments: None,
            result: None,
        };
        assert_eq!(
            Payload::from_wire(raw),
            Err(PayloadShapeError::UnknownFlag(99))
        );
    }
}
