use crate::config::GatewayConfig;
use anyhow::Context;
use shelfsense_gateway::Gateway;
use shelfsense_hardware::AnyLinkOpener;
use shelfsense_network::{ControlPlane, SessionEnd};
use std::sync::Arc;
use tracing::{info, warn};

/// Connect to the control plane, authenticate and serve until the session ends.
///
/// # Errors
///
/// Fails if the control plane cannot be reached, rejects the gateway
/// identity, or the connection breaks.
pub async fn run(config: GatewayConfig) -> anyhow::Result<SessionEnd> {
    let mut control_plane = ControlPlane::connect(&config.control_plane())
        .await
        .context("connecting to the control plane")?;
    control_plane
        .authenticate(&config.identity())
        .await
        .context("authenticating with the control plane")?;
    let (session, authorizer) = control_plane.into_session();

    let reader = config.rfid_reader()?;
    let (gateway, events) = Gateway::builder(
        AnyLinkOpener::for_backend(config.serial.backend),
        reader,
        authorizer,
    )
    .settings(config.link_settings())
    .timing(config.timing())
    .build();
    let gateway = Arc::new(gateway);
    info!(
        serial = ?config.serial.backend,
        rfid = ?config.rfid.backend,
        "gateway ready"
    );

    let on_interrupt = Arc::clone(&gateway);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received");
                on_interrupt.shutdown();
            }
            Err(e) => warn!(error = %e, "cannot listen for interrupts"),
        }
    });

    let end = session.run(gateway, events).await?;
    Ok(end)
}
