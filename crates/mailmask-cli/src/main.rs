//! mailmask CLI - Command-line interface
//!
//! Usage:
//!   mailmask mask "My email is a@b.com"
//!   mailmask classify --file email.txt
//!   cat email.txt | mailmask classify --config mailmask.toml

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use mailmask_core::AppConfig;
use mailmask_pipeline::EmailProcessor;

#[derive(Parser)]
#[command(name = "mailmask")]
#[command(about = "Mask PII/PCI data in support emails and classify them")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON on a single line
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mask sensitive entities and print them
    Mask(InputArgs),
    /// Mask sensitive entities and predict the email category
    Classify(InputArgs),
}

/// Email body source; stdin when neither is given
#[derive(Args)]
struct InputArgs {
    /// Email body text
    #[arg(conflicts_with = "file")]
    text: Option<String>,

    /// Read the email body from a file
    #[arg(long)]
    file: Option<PathBuf>,
}

impl InputArgs {
    fn read(self) -> anyhow::Result<String> {
        match (self.text, self.file) {
            (Some(text), _) => Ok(text),
            (None, Some(path)) => std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display())),
            (None, None) => {
                let mut body = String::new();
                std::io::stdin()
                    .read_to_string(&mut body)
                    .context("Failed to read stdin")?;
                Ok(body)
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

fn to_json(value: &impl serde::Serialize, compact: bool) -> anyhow::Result<String> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(json)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let processor = EmailProcessor::from_config(&config)?;

    let output = match cli.command {
        Commands::Mask(input) => {
            let result = processor.mask_only(&input.read()?)?;
            to_json(&result, cli.compact)?
        }
        Commands::Classify(input) => {
            let result = processor.process(&input.read()?).await?;
            to_json(&result, cli.compact)?
        }
    };

    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_mask_text() {
        let cli = Cli::try_parse_from(["mailmask", "mask", "My email is a@b.com"]).unwrap();
        let Commands::Mask(input) = cli.command else {
            panic!("expected mask command");
        };
        assert_eq!(input.read().unwrap(), "My email is a@b.com");
    }

    #[test]
    fn test_parse_classify_with_global_flags() {
        let cli = Cli::try_parse_from([
            "mailmask",
            "classify",
            "--file",
            "email.txt",
            "--config",
            "mailmask.toml",
            "--compact",
        ])
        .unwrap();

        assert!(cli.compact);
        assert_eq!(cli.config, Some(PathBuf::from("mailmask.toml")));
        assert!(matches!(
            cli.command,
            Commands::Classify(InputArgs { text: None, file: Some(_) })
        ));
    }

    #[test]
    fn test_text_and_file_conflict() {
        assert!(Cli::try_parse_from(["mailmask", "mask", "hi", "--file", "a.txt"]).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let input = InputArgs {
            text: None,
            file: Some(PathBuf::from("/nonexistent/mailmask/email.txt")),
        };
        assert!(input.read().is_err());
    }

    #[test]
    fn test_compact_json() {
        let value = serde_json::json!({ "masked_email": "[email]" });
        assert_eq!(to_json(&value, true).unwrap(), r#"{"masked_email":"[email]"}"#);
        assert!(to_json(&value, false).unwrap().contains('\n'));
    }
}
