use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "jukebox")]
#[command(about = "Chat-driven video jukebox - queues video links into one shared browser")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (JSON)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address for the chat gateway to listen on
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// DevTools port of the browser to attach to
    #[arg(long, value_name = "PORT")]
    pub cdp_port: Option<u16>,

    /// Full DevTools websocket endpoint (skips port discovery)
    #[arg(long, value_name = "WS_URL")]
    pub cdp_endpoint: Option<String>,

    /// Channel job outcomes are announced to
    #[arg(long, value_name = "CHANNEL")]
    pub announce_channel: Option<String>,
}
