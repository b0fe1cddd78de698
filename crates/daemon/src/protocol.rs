// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol between build clients and `gdxd`.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

use gdx_core::{BuildKind, JobSummary};
use gdx_engine::{EngineError, HealthReport};
use serde::{Deserialize, Serialize};

#[path = "protocol_wire.rs"]
mod wire;
pub use wire::{
    decode, encode, read_message, read_request, write_message, write_response, ProtocolError,
    DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};

/// Request from a client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Liveness check
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Queue a preview or export build
    Submit {
        kind: BuildKind,
        session_id: String,
        /// Game document; read from the session store when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_json: Option<serde_json::Value>,
    },

    /// Current view of one job
    Status { job_id: String },

    /// Every job the engine still tracks
    Jobs,

    /// Cancel a job that has not started running
    Cancel { job_id: String },

    /// Latest health report; `refresh` runs every check first
    Health {
        #[serde(default)]
        refresh: bool,
    },

    /// Request daemon shutdown
    Shutdown,
}

/// Machine-readable failure reason
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    QueueFull,
    KindDisabled,
    InvalidGame,
    InvalidSession,
    NotFound,
    StoreUnavailable,
    ShuttingDown,
    Internal,
}

impl From<&EngineError> for ErrorCode {
    fn from(error: &EngineError) -> Self {
        match error {
            EngineError::QueueFull { .. } => ErrorCode::QueueFull,
            EngineError::KindDisabled(_) => ErrorCode::KindDisabled,
            EngineError::InvalidGame(_) => ErrorCode::InvalidGame,
            EngineError::InvalidSession(_) => ErrorCode::InvalidSession,
            EngineError::JobNotFound(_) => ErrorCode::NotFound,
            EngineError::Store(gdx_adapters::StoreError::NotFound(_)) => ErrorCode::NotFound,
            EngineError::Store(_) => ErrorCode::StoreUnavailable,
            EngineError::ShuttingDown => ErrorCode::ShuttingDown,
            EngineError::Io(_) => ErrorCode::Internal,
        }
    }
}

/// Response from the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    Pong,

    Hello { version: String },

    /// A single job, as returned by Submit and Status
    Job { job: JobSummary },

    Jobs { jobs: Vec<JobSummary> },

    Cancelled { job_id: String, cancelled: bool },

    Health { report: Box<HealthReport> },

    ShuttingDown,

    Error { code: ErrorCode, message: String },
}

impl Response {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error {
            code,
            message: message.into(),
        }
    }
}

impl From<EngineError> for Response {
    fn from(error: EngineError) -> Self {
        Response::error(ErrorCode::from(&error), error.to_string())
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
