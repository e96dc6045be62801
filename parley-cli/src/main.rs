use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parley_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use parley_core::Config;
use std::path::PathBuf;
use tracing::{debug, info};

mod commands;

use commands::EncodeInput;

#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML); PARLEY_* environment variables otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode content and print the serialized envelope as hex
    Encode {
        /// Compress the payload (deflate, gzip)
        #[arg(long)]
        compression: Option<String>,

        #[command(subcommand)]
        content: EncodeCommand,
    },

    /// Decode a hex envelope and print it as JSON
    Decode {
        /// Envelope bytes, hex encoded
        envelope: String,
    },

    /// Run a two-party exchange over the in-memory substrate
    Demo,

    /// Print the effective configuration
    ShowConfig,
}

#[derive(Subcommand, Debug)]
enum EncodeCommand {
    /// Plain text
    Text { text: String },

    /// Reaction to an earlier message
    Reaction {
        /// Hex id of the message reacted to
        #[arg(long)]
        reference: String,

        /// Emoji or shortcode
        #[arg(long)]
        content: String,

        #[arg(long, default_value = "added")]
        action: String,

        #[arg(long, default_value = "unicode")]
        schema: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_ref())?;

    if let Some(level) = &args.log_level {
        let level: LogLevel = level.parse()?;
        config.logging.level = level.to_string();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    init_logging_with_config(LogConfig::from_settings(&config.logging)?)?;
    debug!(?config, "Configuration loaded");

    match args.command {
        Command::Encode {
            compression,
            content,
        } => {
            let input = match content {
                EncodeCommand::Text { text } => EncodeInput::Text(text),
                EncodeCommand::Reaction {
                    reference,
                    content,
                    action,
                    schema,
                } => EncodeInput::Reaction {
                    reference,
                    content,
                    action,
                    schema,
                },
            };
            println!("{}", commands::encode(input, compression.as_deref())?);
        }
        Command::Decode { envelope } => {
            let decoded = commands::decode(&envelope, &config)?;
            println!("{}", serde_json::to_string_pretty(&decoded)?);
        }
        Command::Demo => {
            let report = commands::demo(&config).await?;
            info!(channel = %report.channel_id, streamed = report.streamed.len(), "Demo finished");

            println!("channel {}", report.channel_id);
            println!("topic   {}", report.topic);
            for line in &report.history {
                println!("  {}", line);
            }
        }
        Command::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
