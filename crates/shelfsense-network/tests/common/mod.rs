//! Common test utilities: a scripted control plane on a local socket and a
//! gateway wired to mock hardware.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use shelfsense_core::TagId;
use shelfsense_gateway::{Gateway, Timing};
use shelfsense_hardware::mock::{MockLinkHandle, MockOpener, MockRfid, MockRfidHandle};
use shelfsense_hardware::simulated::SimulatedFirmware;
use shelfsense_hardware::{AnyLinkOpener, AnyRfidReader};
use shelfsense_network::{
    ControlPlane, ControlPlaneConfig, ControlPlaneError, Identity, RemoteAuthorizer, SessionEnd,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec};

pub const PATH: &str = "/dev/ttyMOCK0";

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub fn identity() -> Identity {
    Identity::new("shelf-01", "secret")
}

pub fn tag() -> TagId {
    TagId::from_hex("699F0464").unwrap()
}

/// Timing shrunk so real-clock tests finish quickly.
pub fn fast_timing() -> Timing {
    Timing {
        settle: Duration::from_millis(10),
        flush_read_timeout: Duration::from_millis(1),
        flush_reads: 2,
        read_timeout: Duration::from_millis(50),
        drain_limit: 8,
        ack_budget: Duration::from_millis(500),
        calibration_budget: Duration::from_secs(2),
        poll_interval: Duration::from_millis(10),
        poll_budget: Duration::from_secs(5),
        close_settle: Duration::from_millis(10),
        deny_retry: Duration::from_millis(20),
        authorization_budget: Duration::from_secs(5),
    }
}

/// Bind a local listener and a client config pointing at it.
pub async fn listen() -> (TcpListener, ControlPlaneConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = ControlPlaneConfig {
        address: listener.local_addr().unwrap().to_string(),
        connect_timeout: Duration::from_secs(1),
        request_timeout: Duration::from_secs(2),
    };
    (listener, config)
}

/// The control plane side of one connection.
pub struct FakeControlPlane {
    framed: Framed<TcpStream, LinesCodec>,
}

impl FakeControlPlane {
    pub async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = listener.accept().await.unwrap();
        Self {
            framed: Framed::new(stream, LinesCodec::new()),
        }
    }

    /// Next line from the gateway, parsed.
    pub async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(RECV_TIMEOUT, self.framed.next())
            .await
            .expect("timed out waiting for the gateway")
            .expect("gateway closed the connection")
            .unwrap();
        serde_json::from_str(&line).unwrap()
    }

    pub async fn send(&mut self, value: Value) {
        self.framed.send(value.to_string()).await.unwrap();
    }

    pub async fn send_raw(&mut self, line: &str) {
        self.framed.send(line.to_string()).await.unwrap();
    }

    pub async fn request(&mut self, id: u64, name: &str, args: Value) {
        self.send(json!({"type": "request", "id": id, "op": {"name": name, "args": args}}))
            .await;
    }

    pub async fn respond(&mut self, id: u64, result: Value) {
        self.send(json!({"type": "response", "id": id, "result": result}))
            .await;
    }

    /// Read until the response to `id` and `events` event lines have arrived.
    /// Returns the response result and the events in arrival order.
    pub async fn collect(&mut self, id: u64, events: usize) -> (Value, Vec<Value>) {
        let mut result = None;
        let mut seen = Vec::new();
        while result.is_none() || seen.len() < events {
            let message = self.recv().await;
            match message["type"].as_str() {
                Some("response") if message["id"] == json!(id) => {
                    result = Some(message["result"].clone());
                }
                Some("event") => seen.push(message),
                _ => panic!("unexpected message {message}"),
            }
        }
        (result.unwrap(), seen)
    }
}

/// `(container_id, amount)` of event envelopes.
pub fn event_pairs(events: &[Value]) -> Vec<(Option<u64>, u64)> {
    events
        .iter()
        .map(|event| (event["container_id"].as_u64(), event["amount"].as_u64().unwrap()))
        .collect()
}

/// An authenticated session serving a gateway on mock hardware.
pub struct Running {
    pub fake: FakeControlPlane,
    pub gateway: Arc<Gateway<RemoteAuthorizer>>,
    pub authorizer: RemoteAuthorizer,
    pub opener: MockOpener,
    pub link: MockLinkHandle,
    pub rfid: MockRfidHandle,
    pub session: JoinHandle<Result<SessionEnd, ControlPlaneError>>,
}

impl Running {
    pub async fn start() -> Self {
        let (listener, config) = listen().await;
        let client = tokio::spawn(async move {
            let mut control_plane = ControlPlane::connect(&config).await?;
            control_plane.authenticate(&identity()).await?;
            Ok::<_, ControlPlaneError>(control_plane)
        });

        let mut fake = FakeControlPlane::accept(&listener).await;
        let auth = fake.recv().await;
        assert_eq!(auth["op"]["name"], "auth");
        fake.respond(0, json!(true)).await;
        let control_plane = client.await.unwrap().unwrap();

        let (session, authorizer) = control_plane.into_session();
        let opener = MockOpener::new();
        let link = opener.prepare_firmware(PATH, SimulatedFirmware::new());
        let (reader, rfid) = MockRfid::new();
        let (gateway, events) = Gateway::builder(
            AnyLinkOpener::Mock(opener.clone()),
            AnyRfidReader::Mock(reader),
            authorizer.clone(),
        )
        .timing(fast_timing())
        .build();
        let gateway = Arc::new(gateway);
        let session = tokio::spawn(session.run(Arc::clone(&gateway), events));

        Self {
            fake,
            gateway,
            authorizer,
            opener,
            link,
            rfid,
            session,
        }
    }

    /// Register unit 7 on the mock link through the control plane.
    pub async fn init_unit_7(&mut self) {
        self.fake
            .request(
                1,
                "init_units",
                json!([{"id": 7, "name": "Bin 7", "weight": 20, "serialPath": PATH}]),
            )
            .await;
        let (result, _) = self.fake.collect(1, 0).await;
        assert_eq!(
            result,
            json!({"success": true, "units": [{"id": 7, "success": true, "error": null}]})
        );
    }
}
