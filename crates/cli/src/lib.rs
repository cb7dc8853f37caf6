use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "weatherhub")]
#[command(about = "WeatherHub - temperature and humidity telemetry service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the ingestion server and averaging worker
    Start {
        /// Path to the configuration file (built-in defaults when omitted)
        #[arg(short, long, env = "WEATHERHUB_CONFIG")]
        config: Option<PathBuf>,

        /// Override the HTTP port
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Override the database URL (e.g. sqlite://weather_data.db)
        #[arg(long, env = "DATABASE_URL")]
        database: Option<String>,

        /// Enable the MQTT ingestor regardless of the configuration
        #[arg(long)]
        mqtt: bool,

        /// Override the log format
        #[arg(long, value_enum)]
        log_format: Option<LogFormatArg>,
    },

    /// Validate configuration without starting the server
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "config/weatherhub.yaml")]
        config: PathBuf,
    },

    /// Write a configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "weatherhub.yaml")]
        output: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable output
    Pretty,
    /// One JSON object per line
    Json,
    /// Single-line output
    Compact,
}

impl LogFormatArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormatArg::Pretty => "pretty",
            LogFormatArg::Json => "json",
            LogFormatArg::Compact => "compact",
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
