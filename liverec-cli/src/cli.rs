use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Records a live channel to disk whenever it goes live",
    long_about = "Watches a single channel and records its source rendition to a dated file\n\
                  in the output directory every time the channel goes live.\n\
                  \n\
                  A metadata sidecar (<file>.info) is written once per broadcast, and\n\
                  session start, end and errors can be pushed to a Telegram chat."
)]
pub struct CliArgs {
    /// Channel to record
    #[arg(required = true, help = "Login name of the channel to record")]
    pub channel: String,

    /// Output directory for recordings
    #[arg(
        short = 'd',
        long = "dir",
        default_value = ".",
        help = "Directory where recordings and metadata sidecars are written"
    )]
    pub output_dir: PathBuf,

    /// Quality tag of the rendition to record
    #[arg(
        short,
        long,
        default_value = liverec_engine::SOURCE_QUALITY,
        help = "Quality tag of the variant to record (default: source)"
    )]
    pub quality: String,

    /// Telegram bot token
    #[arg(
        long = "telegram-token",
        env = "LIVEREC_TELEGRAM_TOKEN",
        hide_env_values = true,
        help = "Telegram bot token; notifications are only logged when absent"
    )]
    pub telegram_token: Option<String>,

    /// Telegram chat id
    #[arg(
        long = "chat",
        default_value = "1863832",
        allow_negative_numbers = true,
        help = "Telegram chat that receives notifications"
    )]
    pub chat_id: i64,

    /// OAuth token sent with directory requests
    #[arg(
        long = "oauth-token",
        env = "LIVEREC_OAUTH_TOKEN",
        hide_env_values = true,
        help = "Optional OAuth token for the directory API"
    )]
    pub oauth_token: Option<String>,

    /// Client id sent with directory requests
    #[arg(long = "client-id", help = "Override the directory API client id")]
    pub client_id: Option<String>,

    /// Overall HTTP request timeout
    #[arg(
        long,
        default_value = "15",
        help = "Overall HTTP request timeout in seconds"
    )]
    pub timeout: u64,

    /// Connection timeout
    #[arg(
        long,
        default_value = "15",
        help = "Maximum time to establish a connection in seconds"
    )]
    pub connect_timeout: u64,

    /// Disable proxy
    #[arg(long, help = "Ignore system proxy settings")]
    pub no_proxy: bool,

    /// Log file
    #[arg(
        long,
        help = "Also write logs to this file (created in the output directory if relative)"
    )]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,
}
