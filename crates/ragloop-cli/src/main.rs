// ragloop CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Provider credentials come from the environment (.env supported);
// command-line flags override model settings.

mod commands;
mod output;
mod settings;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::AgentKind;
use settings::ProviderSettings;

#[derive(Parser)]
#[command(name = "ragloop")]
#[command(about = "ragloop - routing, retrieval-augmented chat with reviewable answers")]
#[command(version)]
pub struct Cli {
    /// Model identifier (overrides RAGLOOP_MODEL)
    #[arg(long, short)]
    pub model: Option<String>,

    /// Retry budget of the evidence-gathering loop (overrides RAGLOOP_MAX_ITERATIONS)
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Question text
        question: String,

        /// Agent answering the question
        #[arg(long, short, value_enum, default_value = "router")]
        agent: AgentKind,

        /// Plain-text documents to search
        #[arg(long, num_args = 1..)]
        docs: Vec<std::path::PathBuf>,
    },

    /// Start an interactive chat
    Chat {
        /// Agent answering the questions
        #[arg(long, short, value_enum, default_value = "router")]
        agent: AgentKind,

        /// Plain-text documents to search
        #[arg(long, num_args = 1..)]
        docs: Vec<std::path::PathBuf>,

        /// Review every draft before it is added to the conversation
        #[arg(long)]
        review: bool,

        /// Augment plain drafts with web search results
        #[arg(long)]
        search: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ragloop=info,ragloop_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded .env from {:?}", path);
    }

    let cli = Cli::parse();
    let settings = ProviderSettings::from_env()?;
    let config = settings.agent_config(cli.model.clone(), cli.max_iterations);
    let output_format = output::OutputFormat::from_str(&cli.output);

    match cli.command {
        Commands::Ask {
            question,
            agent,
            docs,
        } => {
            commands::ask::run(
                &settings,
                config,
                agent,
                &docs,
                &question,
                output_format,
                cli.quiet,
            )
            .await
        }
        Commands::Chat {
            agent,
            docs,
            review,
            search,
        } => {
            let options = commands::chat::ChatOptions {
                agent,
                docs,
                review,
                search,
            };
            commands::chat::run(&settings, config, options, output_format, cli.quiet).await
        }
    }
}
