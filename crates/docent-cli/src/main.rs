use anyhow::Result;
use clap::Parser;
use docent_core::{Settings, TransportMode};

mod app;

#[derive(Parser)]
#[command(name = "docent")]
#[command(about = "Docent - conversational search over a public records archive")]
#[command(version)]
struct Cli {
    /// Ask a single question and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Who is asking (journalist, lawyer, educator, ...)
    #[arg(long, default_value = "")]
    role: String,

    /// Restrict results to one content type
    #[arg(long)]
    content_type: Option<String>,

    /// Restrict results to one resource type
    #[arg(long)]
    resource_type: Option<String>,

    /// Backend base URL
    #[arg(long)]
    url: Option<String>,

    /// Receive answers over the event stream
    #[arg(long, conflicts_with = "batch")]
    stream: bool,

    /// Receive answers in one GraphQL response
    #[arg(long)]
    batch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load();

    if let Some(ref url) = cli.url {
        settings.backend.base_url = url.clone();
    }
    if cli.stream {
        settings.backend.transport = TransportMode::Stream;
    } else if cli.batch {
        settings.backend.transport = TransportMode::Batch;
    }

    let options = app::SessionOptions {
        role: cli.role,
        content_type: cli.content_type,
        resource_type: cli.resource_type,
    };

    if let Some(prompt) = cli.prompt {
        app::run_single_prompt(&settings, &options, &prompt).await?;
    } else {
        app::run_repl(&settings, &options).await?;
    }

    Ok(())
}
