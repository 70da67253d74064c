// ResourceModifier operator binary
use anyhow::Result;
use clap::Parser;
use kube::Client;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use resource_modifier::config::OperatorConfig;
use resource_modifier::{reconciler, webhook};

#[derive(Parser, Debug)]
#[command(name = "rmod-operator", about = "Applies ResourceModifier directives to cluster objects")]
struct Args {
    /// Path to the operator configuration file
    #[arg(long, env = "RMOD_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = OperatorConfig::load(args.config.as_deref())?;

    // Initialize tracing
    let default_filter = config
        .log_level
        .clone()
        .unwrap_or_else(|| "info,rmod_operator=debug".to_string());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ResourceModifier operator");

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    if let Some(webhook_config) = config.webhook.clone() {
        tokio::spawn(async move {
            if let Err(e) = webhook::serve(&webhook_config.bind_addr).await {
                error!("Admission webhook error: {}", e);
            }
        });
    }

    // Run the controller
    if let Err(e) = reconciler::run_controller(client, &config).await {
        error!("Controller error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
