// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-socket listener serving the IPC protocol.

use crate::lifecycle::DaemonShared;
use crate::protocol::{decode, read_message, write_message, ProtocolError, Request, Response};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};

/// Accept loop; one task per connection.
pub async fn serve(listener: UnixListener, shared: Arc<DaemonShared>) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, shared).await {
                        if !matches!(e, ProtocolError::ConnectionClosed) {
                            tracing::warn!(error = %e, "connection handler failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    }
}

async fn handle_connection(
    mut stream: UnixStream,
    shared: Arc<DaemonShared>,
) -> Result<(), ProtocolError> {
    loop {
        let bytes = read_message(&mut stream).await?;
        let response = match decode::<Request>(&bytes) {
            Ok(Request::Status) => Response::Status(shared.status()),
            Ok(Request::Resume) => match shared.resume() {
                Ok(()) => Response::Ok,
                Err(e) => Response::Error {
                    code: "io".to_string(),
                    message: e.to_string(),
                },
            },
            Ok(Request::Shutdown) => {
                let _ = shared.shutdown_tx.send(true);
                Response::Ok
            }
            Err(e) => Response::Error {
                code: "validation".to_string(),
                message: format!("bad request: {e}"),
            },
        };
        write_message(&mut stream, &response).await?;
    }
}
