//! palaver CLI binary entry point.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use palaver::cli::{init_tracing, Cli};
use palaver::config::PalaverConfig;
use palaver::conversation::{Conversation, ConversationEvent, ConversationOptions};
use palaver::error::PalaverError;
use palaver::tools::default_registry;
use palaver::transport::bedrock::BedrockTransport;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), PalaverError> {
    let config = cli.apply(PalaverConfig::from_env()?)?;
    let registry = default_registry(&config)?;
    let transport = Arc::new(BedrockTransport::new(config.region.clone()).await);

    let streaming = config.stream;
    let verbose = cli.verbose;
    let sink = Arc::new(move |event: ConversationEvent| match event {
        ConversationEvent::TextDelta { text } if streaming => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        ConversationEvent::ToolUseRequested { name, input, .. } => {
            eprintln!("\n⚡ {name} {input}");
        }
        ConversationEvent::ToolCompleted { name, is_error, .. } => {
            if is_error {
                eprintln!("  ❌ {name}");
            } else {
                eprintln!("  ✅ {name}");
            }
        }
        ConversationEvent::MessageCommitted { message } if verbose => {
            if let Ok(json) = serde_json::to_string_pretty(&message) {
                eprintln!("{json}");
            }
        }
        _ => {}
    });

    let mut conversation = Conversation::new(transport, registry, ConversationOptions::from_config(&config))
        .with_event_sink(sink);

    let cancel = conversation.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let answer = conversation.ask(cli.question.as_str()).await?;
    if streaming {
        println!();
    } else {
        println!("{answer}");
    }

    let usage = conversation.usage();
    eprintln!(
        "tokens: {} in / {} out / {} total ({} messages)",
        usage.input_tokens,
        usage.output_tokens,
        usage.total_tokens,
        conversation.history().len()
    );
    Ok(())
}
