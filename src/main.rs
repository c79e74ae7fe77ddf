use clap::{Parser, Subcommand};
use press_qa::Result;
use press_qa::commands::{ask, build_index, chat_session};
use press_qa::config::{run_interactive_config, show_config};
use press_qa::pipeline::DEFAULT_TEMPERATURE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "press-qa")]
#[command(about = "Question answering over a folder of press releases")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml; relative corpus and index paths resolve against it
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure paths, models and retrieval
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the vector index if it does not exist yet
    Index {
        /// OpenAI API key
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
    /// Ask a single question
    Ask {
        /// The question to answer
        query: String,
        /// Sampling temperature between 0.0 and 1.0
        #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
        temperature: f32,
        /// OpenAI API key
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
    /// Ask questions interactively
    Chat {
        /// OpenAI API key, prompted for when absent
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&cli.config_dir)?;
            } else {
                run_interactive_config(&cli.config_dir)?;
            }
        }
        Commands::Index { api_key } => {
            build_index(&cli.config_dir, api_key).await?;
        }
        Commands::Ask {
            query,
            temperature,
            api_key,
        } => {
            ask(&cli.config_dir, query, temperature, api_key).await?;
        }
        Commands::Chat { api_key } => {
            chat_session(&cli.config_dir, api_key).await?;
        }
    }

    Ok(())
}
