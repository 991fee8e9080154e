// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ralph_daemon::protocol::{self, Request, Response, StatusSnapshot};
use tokio::net::UnixListener;

async fn serve_one(listener: UnixListener, response: Response) {
    let (mut stream, _) = listener.accept().await.unwrap();
    let bytes = protocol::read_message(&mut stream).await.unwrap();
    let _request: Request = protocol::decode(&bytes).unwrap();
    protocol::write_message(&mut stream, &response).await.unwrap();
}

fn snapshot() -> StatusSnapshot {
    StatusSnapshot {
        daemon_id: "d-1".to_string(),
        pid: 4242,
        mode: "running".to_string(),
        uptime_ms: 1000,
        repos: vec![],
        throttle: vec![],
    }
}

#[tokio::test]
async fn status_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("daemon.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let server = tokio::spawn(serve_one(listener, Response::Status(snapshot())));

    let client = DaemonClient::new(&socket);
    let status = client.status().await.unwrap();
    assert_eq!(status.daemon_id, "d-1");
    assert_eq!(status.mode, "running");
    server.await.unwrap();
}

#[tokio::test]
async fn resume_ok() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("daemon.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let server = tokio::spawn(serve_one(listener, Response::Ok));

    let client = DaemonClient::new(&socket);
    client.resume().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn daemon_error_surfaces_code_and_message() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("daemon.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let server = tokio::spawn(serve_one(
        listener,
        Response::Error { code: "io".to_string(), message: "disk full".to_string() },
    ));

    let client = DaemonClient::new(&socket);
    let err = client.resume().await.unwrap_err();
    match err {
        ClientError::Daemon { code, message } => {
            assert_eq!(code, "io");
            assert_eq!(message, "disk full");
        }
        other => panic!("expected Daemon error, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn missing_socket_is_not_running() {
    let dir = tempfile::tempdir().unwrap();
    let client = DaemonClient::new(&dir.path().join("nope.sock"));
    let err = client.status().await.unwrap_err();
    assert!(matches!(err, ClientError::DaemonNotRunning));
}

#[tokio::test]
async fn status_response_to_resume_is_unexpected() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("daemon.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let server = tokio::spawn(serve_one(listener, Response::Status(snapshot())));

    let client = DaemonClient::new(&socket);
    let err = client.resume().await.unwrap_err();
    assert!(matches!(err, ClientError::UnexpectedResponse));
    server.await.unwrap();
}
