use std::sync::Arc;

use clap::Parser;
use jb_driver::CdpDriver;
use jukebox::chat::ChannelId;
use jukebox::orchestrator::Orchestrator;
use jukebox::session::SessionController;
use tracing::{error, info};

mod cli;
mod config;
mod gateway;
mod logging;
mod probe;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        error!(target = "jb", error = %err, "jukebox failed");
        std::process::exit(1);
    }
}

async fn run(cli: cli::Cli) -> anyhow::Result<()> {
    let config = config::BotConfig::load(cli.config.as_deref())?.merged(&cli);

    let endpoint = match &config.cdp_endpoint {
        Some(endpoint) => endpoint.clone(),
        None => {
            let version = probe::discover_browser(config.cdp_port).await?;
            if let Some(browser) = &version.browser {
                info!(target = "jb", %browser, port = config.cdp_port, "discovered browser");
            }
            version.web_socket_debugger_url
        }
    };

    // No session, no jukebox: both of these failures are fatal.
    let driver = CdpDriver::connect(&endpoint)
        .await
        .map_err(jukebox::Error::SessionAcquisition)?;
    let session = Arc::new(SessionController::start(driver, config.tuning()).await?);

    let (queue, consumer) = jukebox::queue::queue();
    let (gateway, handler) = gateway::Gateway::new(
        Arc::clone(&session),
        queue,
        ChannelId(config.announce_channel.clone()),
    );

    tokio::spawn(Orchestrator::new(session, consumer, handler).run());

    gateway::serve(config.listen, gateway).await
}
