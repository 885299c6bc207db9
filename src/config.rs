use clap::Parser;
use tracing::Level;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Pairs game clients by lobby code and relays their turns", long_about = None)]
pub struct Config {
    /// Host name or address to listen on. Use 0.0.0.0 for external clients.
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// TCP port to listen on.
    #[arg(long, default_value_t = 9001)]
    pub port: u16,

    /// Pending connections the OS may queue before accept.
    #[arg(long, default_value_t = 16)]
    pub backlog: i32,

    /// Most verbose log level to emit (error, warn, info, debug, trace).
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,
}
