use clap::Parser;
use shelfsense_cli::{Cli, GatewayConfig, app, exit, logging};
use shelfsense_network::ControlPlaneError;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_json);
    info!(version = shelfsense_core::VERSION, "starting shelfsense gateway");

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, path = %cli.config.display(), "invalid configuration");
            eprintln!("{e}");
            return ExitCode::from(exit::CONFIG);
        }
    };

    match app::run(config).await {
        Ok(end) => {
            info!(?end, "gateway stopped");
            ExitCode::from(exit::OK)
        }
        Err(e) => {
            let rejected = e
                .downcast_ref::<ControlPlaneError>()
                .is_some_and(ControlPlaneError::is_identity_rejected);
            if rejected {
                error!(error = %format!("{e:#}"), "gateway identity rejected, exiting");
            } else {
                error!(error = %format!("{e:#}"), "gateway stopped on a fatal error");
            }
            eprintln!("{e:#}");
            ExitCode::from(exit::FATAL)
        }
    }
}

fn load_config(cli: &Cli) -> shelfsense_core::Result<GatewayConfig> {
    let mut config = GatewayConfig::load(&cli.config)?;
    config.apply_cli(cli);
    config.validate()?;
    Ok(config)
}
