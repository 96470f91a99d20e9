//! Identity handshake against a scripted control plane.

mod common;

use common::{FakeControlPlane, identity, listen};
use serde_json::json;
use shelfsense_network::{ControlPlane, ControlPlaneConfig, ControlPlaneError};
use std::time::Duration;

async fn connect_and_authenticate(config: ControlPlaneConfig) -> Result<ControlPlane, ControlPlaneError> {
    let mut control_plane = ControlPlane::connect(&config).await?;
    control_plane.authenticate(&identity()).await?;
    Ok(control_plane)
}

#[tokio::test]
async fn test_identity_accepted() {
    let (listener, config) = listen().await;
    let client = tokio::spawn(connect_and_authenticate(config));

    let mut fake = FakeControlPlane::accept(&listener).await;
    let auth = fake.recv().await;
    assert_eq!(
        auth,
        json!({
            "type": "request",
            "id": 0,
            "op": {"name": "auth", "args": {"host": "shelf-01", "pass": "secret"}}
        })
    );
    fake.respond(0, json!(true)).await;

    assert!(client.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_identity_rejected_is_authorization_error() {
    let (listener, config) = listen().await;
    let client = tokio::spawn(connect_and_authenticate(config));

    let mut fake = FakeControlPlane::accept(&listener).await;
    fake.recv().await;
    fake.respond(0, json!(false)).await;

    let error = client.await.unwrap().unwrap_err();
    assert!(error.is_identity_rejected(), "got {error}");
}

#[tokio::test]
async fn test_messages_before_verdict_are_skipped() {
    let (listener, config) = listen().await;
    let client = tokio::spawn(connect_and_authenticate(config));

    let mut fake = FakeControlPlane::accept(&listener).await;
    fake.recv().await;
    fake.send_raw("hello").await;
    fake.respond(41, json!(false)).await;
    fake.respond(0, json!(true)).await;

    assert!(client.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_hangup_during_handshake() {
    let (listener, config) = listen().await;
    let client = tokio::spawn(connect_and_authenticate(config));

    let mut fake = FakeControlPlane::accept(&listener).await;
    fake.recv().await;
    drop(fake);

    let error = client.await.unwrap().unwrap_err();
    assert!(matches!(error, ControlPlaneError::ConnectionLost(_)), "got {error}");
    assert!(!error.is_identity_rejected());
}

#[tokio::test]
async fn test_silent_control_plane_times_out() {
    let (listener, mut config) = listen().await;
    config.request_timeout = Duration::from_millis(100);
    let client = tokio::spawn(connect_and_authenticate(config));

    let mut fake = FakeControlPlane::accept(&listener).await;
    fake.recv().await;

    let error = client.await.unwrap().unwrap_err();
    assert!(
        matches!(error, ControlPlaneError::Gateway(shelfsense_core::Error::Timeout { .. })),
        "got {error}"
    );
    drop(fake);
}

#[tokio::test]
async fn test_connect_refused() {
    let (listener, config) = listen().await;
    drop(listener);

    let error = ControlPlane::connect(&config).await.unwrap_err();
    assert!(matches!(error, ControlPlaneError::Io(_)), "got {error}");
}
