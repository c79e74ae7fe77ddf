// Configuration management module
// TOML-backed settings for the corpus, index, OpenAI clients and retrieval

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{CONFIG_FILE_NAME, Config, ConfigError, CorpusConfig, IndexConfig, OpenAiConfig};
