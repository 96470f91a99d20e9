//! The run loop against a minimal control plane, with simulated hardware.

use serde_json::{Value, json};
use shelfsense_cli::{GatewayConfig, app};
use shelfsense_hardware::LinkBackend;
use shelfsense_network::{ControlPlaneError, SessionEnd};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

fn config_for(address: String) -> GatewayConfig {
    let mut config = GatewayConfig::from_toml_str(
        r#"
        [identity]
        host = "shelf-01"
        password = "secret"

        [serial]
        backend = "simulated"

        [control_plane]
        connect_timeout_ms = 1000
        request_timeout_ms = 2000
        "#,
    )
    .unwrap();
    config.control_plane.address = address;
    config.validate().unwrap();
    assert_eq!(config.serial.backend, LinkBackend::Simulated);
    config
}

/// Accept one connection, read the auth request and answer it.
async fn answer_auth(listener: TcpListener, verdict: bool) -> Value {
    let (stream, _) = listener.accept().await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let auth: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    let reply = json!({"type": "response", "id": 0, "result": verdict});
    write
        .write_all(format!("{reply}\n").as_bytes())
        .await
        .unwrap();
    auth
}

#[tokio::test]
async fn test_rejected_identity_is_fatal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = config_for(listener.local_addr().unwrap().to_string());
    let control_plane = tokio::spawn(answer_auth(listener, false));

    let error = app::run(config).await.unwrap_err();
    let auth = control_plane.await.unwrap();

    assert_eq!(auth["op"]["args"]["host"], "shelf-01");
    assert!(
        error
            .downcast_ref::<ControlPlaneError>()
            .is_some_and(ControlPlaneError::is_identity_rejected),
        "got {error:#}"
    );
}

#[tokio::test]
async fn test_session_ends_when_control_plane_hangs_up() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = config_for(listener.local_addr().unwrap().to_string());
    // The connection drops once the auth answer is written.
    let control_plane = tokio::spawn(answer_auth(listener, true));

    let end = app::run(config).await.unwrap();
    control_plane.await.unwrap();
    assert_eq!(end, SessionEnd::ClosedByPeer);
}

#[tokio::test]
async fn test_unreachable_control_plane_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = config_for(listener.local_addr().unwrap().to_string());
    drop(listener);

    let error = app::run(config).await.unwrap_err();
    assert!(format!("{error:#}").contains("connecting to the control plane"));
}
