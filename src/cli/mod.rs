//! Command-line interface for palaver.

use clap::Parser;

use crate::config::{PalaverConfig, DEFAULT_QUESTION};
use crate::error::PalaverError;

/// Ask a Bedrock-hosted model a question, letting it call weather and geocoding tools.
#[derive(Parser, Debug)]
#[command(name = "palaver", version, about)]
pub struct Cli {
    /// Model alias (claude3-sonnet, claude3-haiku) or a full Bedrock model id
    #[arg(short, long)]
    pub model: Option<String>,

    /// Stream the model's output as it is generated
    #[arg(short, long)]
    pub stream: bool,

    /// AWS region hosting the model
    #[arg(short, long)]
    pub region: Option<String>,

    /// Debug logging plus a JSON dump of every committed message
    #[arg(short, long)]
    pub verbose: bool,

    /// Question to ask
    #[arg(short, long, default_value = DEFAULT_QUESTION)]
    pub question: String,

    /// System prompt
    #[arg(long)]
    pub system: Option<String>,

    /// Maximum model calls before giving up
    #[arg(long)]
    pub max_turns: Option<usize>,
}

impl Cli {
    /// Overlay command-line flags on a config loaded from the environment.
    pub fn apply(&self, mut config: PalaverConfig) -> Result<PalaverConfig, PalaverError> {
        if let Some(model) = &self.model {
            config.model = model.parse()?;
        }
        if self.stream {
            config.stream = true;
        }
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(system) = &self.system {
            config.system_prompt = system.clone();
        }
        if let Some(max_turns) = self.max_turns {
            if max_turns == 0 {
                return Err(PalaverError::Configuration("--max-turns must be at least 1".into()));
            }
            config.max_turns = max_turns;
        }
        Ok(config)
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins unless `verbose` is set.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("palaver=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("palaver=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
