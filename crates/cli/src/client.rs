// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands.
//!
//! The CLI never starts the daemon; `ralphd` is operator-run and
//! single-instance. Commands that need live state connect to the Unix
//! socket and fall back to on-disk inspection when nothing is listening.

use ralph_daemon::protocol::{
    decode, read_message, write_message, ProtocolError, Request, Response, StatusSnapshot,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UnixStream;

/// Timeout for a single IPC round-trip (`RALPH_TIMEOUT_IPC_MS` override).
pub fn timeout_ipc() -> Duration {
    std::env::var("RALPH_TIMEOUT_IPC_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running")]
    DaemonNotRunning,

    #[error("daemon did not respond within {0:?}")]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("daemon error [{code}]: {message}")]
    Daemon { code: String, message: String },

    #[error("unexpected response from daemon")]
    UnexpectedResponse,
}

/// Connection to a live daemon.
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Address a daemon socket. Connection happens per-request.
    pub fn new(socket_path: &Path) -> Self {
        Self { socket_path: socket_path.to_path_buf() }
    }

    /// One request/response round-trip with a timeout.
    async fn request(&self, request: &Request) -> Result<Response, ClientError> {
        let timeout = timeout_ipc();
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|_| ClientError::DaemonNotRunning)?;
        let exchange = async {
            write_message(&mut stream, request).await?;
            let bytes = read_message(&mut stream).await?;
            decode::<Response>(&bytes)
        };
        match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(ClientError::Protocol(e)),
            Err(_) => Err(ClientError::Timeout(timeout)),
        }
    }

    /// Fetch the daemon's status snapshot.
    pub async fn status(&self) -> Result<StatusSnapshot, ClientError> {
        match self.request(&Request::Status).await? {
            Response::Status(snapshot) => Ok(snapshot),
            Response::Error { code, message } => Err(ClientError::Daemon { code, message }),
            Response::Ok => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Ask the daemon to clear pause state and return to running.
    pub async fn resume(&self) -> Result<(), ClientError> {
        match self.request(&Request::Resume).await? {
            Response::Ok => Ok(()),
            Response::Error { code, message } => Err(ClientError::Daemon { code, message }),
            Response::Status(_) => Err(ClientError::UnexpectedResponse),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
