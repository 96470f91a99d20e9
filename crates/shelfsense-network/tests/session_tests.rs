//! Request dispatch, progress events and remote authorization over a live
//! session.

mod common;

use common::{Running, event_pairs, tag};
use serde_json::json;
use shelfsense_core::Error;
use shelfsense_gateway::Authorizer;
use shelfsense_network::SessionEnd;

#[tokio::test]
async fn test_take_out_reports_progress_and_result() {
    let mut running = Running::start().await;
    running.init_unit_7().await;

    running
        .fake
        .request(2, "take_out", json!([{"container_id": 7, "amount": 2}]))
        .await;
    let (result, events) = running.fake.collect(2, 4).await;

    assert_eq!(result, json!({"success": true, "completed": [7], "error": null}));
    assert!(events.iter().all(|event| event["name"] == "take_out_progress"));
    assert_eq!(
        event_pairs(&events),
        vec![(None, 0), (Some(7), 1), (Some(7), 2), (None, 2)]
    );
}

#[tokio::test]
async fn test_put_in_asks_control_plane_until_allowed() {
    let mut running = Running::start().await;
    running.init_unit_7().await;
    running.rfid.present_repeatedly(tag(), 2).await.unwrap();

    running
        .fake
        .request(10, "put_in", json!([{"container_id": 7, "amount": 1}]))
        .await;

    let first = running.fake.recv().await;
    assert_eq!(
        first,
        json!({
            "type": "request",
            "id": 1,
            "op": {"name": "check_authorization", "args": {"tag": "699F0464"}}
        })
    );
    running.fake.respond(1, json!(false)).await;

    let second = running.fake.recv().await;
    assert_eq!(second["id"], 2);
    assert_eq!(second["op"]["name"], "check_authorization");
    running.fake.respond(2, json!(true)).await;

    let (result, events) = running.fake.collect(10, 3).await;
    assert_eq!(result, json!({"success": true, "completed": [7], "error": null}));
    assert_eq!(event_pairs(&events), vec![(None, 0), (Some(7), 1), (None, 1)]);
    assert_eq!(running.link.written_with_opcode(0x16).len(), 1);
}

#[tokio::test]
async fn test_unregistered_container_fails_without_completed_items() {
    let mut running = Running::start().await;

    running
        .fake
        .request(3, "take_out", json!([{"container_id": 9, "amount": 1}]))
        .await;
    let (result, _) = running.fake.collect(3, 0).await;

    assert_eq!(result["success"], false);
    assert_eq!(result["completed"], json!([]));
    assert!(result["error"].as_str().unwrap().contains("validation"));
    assert_eq!(running.opener.open_count(common::PATH), 0);
}

#[tokio::test]
async fn test_calibrate_returns_bool() {
    let mut running = Running::start().await;
    running.init_unit_7().await;

    running
        .fake
        .request(4, "calibrate_container", json!({"container_id": 7}))
        .await;
    let (result, _) = running.fake.collect(4, 0).await;
    assert_eq!(result, json!(true));

    running
        .fake
        .request(5, "calibrate_container", json!({"container_id": 8}))
        .await;
    let (result, _) = running.fake.collect(5, 0).await;
    assert_eq!(result, json!(false));
}

#[tokio::test]
async fn test_unsupported_and_malformed_input() {
    let mut running = Running::start().await;

    running.fake.send_raw("not json at all").await;
    running
        .fake
        .send(json!({"type": "request", "id": 5, "op": {"name": "reboot"}}))
        .await;
    let (result, _) = running.fake.collect(5, 0).await;
    assert_eq!(result["success"], false);
    assert!(result["error"].as_str().unwrap().starts_with("unsupported request"));

    running
        .fake
        .send(json!({"type": "request", "id": 6, "op": {"name": "abort"}}))
        .await;
    let (result, _) = running.fake.collect(6, 0).await;
    assert_eq!(result, json!(true));
}

#[tokio::test]
async fn test_hangup_fails_pending_authorization() {
    let Running {
        mut fake,
        authorizer,
        session,
        ..
    } = Running::start().await;

    let check = tokio::spawn(async move { authorizer.is_authorized(&tag()).await });
    let request = fake.recv().await;
    assert_eq!(request["op"]["name"], "check_authorization");
    drop(fake);

    assert_eq!(session.await.unwrap().unwrap(), SessionEnd::ClosedByPeer);
    let answer = check.await.unwrap();
    assert!(matches!(answer, Err(Error::Connection { .. })), "got {answer:?}");
}

#[tokio::test]
async fn test_shutdown_ends_session() {
    let running = Running::start().await;
    running.gateway.shutdown();
    assert_eq!(running.session.await.unwrap().unwrap(), SessionEnd::Shutdown);
}
