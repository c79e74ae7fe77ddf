
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::{Path, PathBuf};

use super::{Config, OpenAiConfig};
use crate::retrieval::{RetrievalConfig, RetrievalStrategy};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Press Q&A Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Corpus and Index").bold().yellow());
    configure_paths(&mut config)?;

    eprintln!();
    eprintln!("{}", style("OpenAI Configuration").bold().yellow());
    eprintln!("API keys are never stored; they are requested per session.");
    configure_openai(&mut config.openai)?;

    eprintln!();
    eprintln!("{}", style("Retrieval").bold().yellow());
    configure_retrieval(&mut config.retrieval)?;

    if config.index_path().exists() {
        eprintln!();
        eprintln!(
            "{}",
            style("⚠ An index already exists and will not be rebuilt automatically.").yellow()
        );
        eprintln!(
            "Delete {} to re-index with the new settings.",
            style(config.index_path().display()).cyan()
        );
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Corpus:").bold().yellow());
    eprintln!("  Path: {}", style(config.corpus_path().display()).cyan());
    eprintln!("  Recursive: {}", style(config.corpus.recursive).cyan());

    eprintln!("{}", style("Index:").bold().yellow());
    eprintln!("  Path: {}", style(config.index_path().display()).cyan());
    eprintln!(
        "  Built: {}",
        style(if config.index_path().exists() { "yes" } else { "no" }).cyan()
    );

    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!(
        "  Chunk Overlap: {}",
        style(config.chunking.chunk_overlap).cyan()
    );

    eprintln!("{}", style("OpenAI:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.openai.base_url).cyan());
    eprintln!(
        "  Embedding Model: {} ({} dimensions)",
        style(&config.openai.embedding_model).cyan(),
        config.openai.embedding_dimension
    );
    eprintln!("  Chat Model: {}", style(&config.openai.chat_model).cyan());
    eprintln!("  Batch Size: {}", style(config.openai.batch_size).cyan());

    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Strategy: {}", style(config.retrieval.strategy).cyan());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    if config.retrieval.strategy == RetrievalStrategy::MultiQuery {
        eprintln!(
            "  Query Variants: {}",
            style(config.retrieval.query_variants).cyan()
        );
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_paths(config: &mut Config) -> Result<()> {
    let corpus: String = Input::new()
        .with_prompt("Corpus directory")
        .default(config.corpus.path.display().to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Corpus directory cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let recursive = Confirm::new()
        .with_prompt("Include .txt files in subdirectories?")
        .default(config.corpus.recursive)
        .interact()?;

    let index: String = Input::new()
        .with_prompt("Index directory")
        .default(config.index.path.display().to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Index directory cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let chunk_size: usize = Input::new()
        .with_prompt("Maximum chunk size (characters)")
        .default(config.chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Chunk size must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    config.corpus.path = PathBuf::from(corpus.trim());
    config.corpus.recursive = recursive;
    config.index.path = PathBuf::from(index.trim());
    config.chunking.chunk_size = chunk_size;
    config.chunking.chunk_overlap = config.chunking.chunk_overlap.min(chunk_size - 1);

    Ok(())
}

fn configure_openai(openai: &mut OpenAiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(openai.base_url.clone())
        .validate_with(|input: &String| -> Result<(), String> {
            let temp_config = OpenAiConfig {
                base_url: input.clone(),
                ..openai.clone()
            };
            temp_config.validate().map_err(|e| e.to_string())
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(openai.embedding_model.clone())
        .interact_text()?;

    let embedding_dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(openai.embedding_dimension)
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(openai.chat_model.clone())
        .interact_text()?;

    openai.set_base_url(base_url)?;
    openai.set_embedding_model(embedding_model)?;
    openai.set_embedding_dimension(embedding_dimension)?;
    openai.set_chat_model(chat_model)?;

    Ok(())
}

fn configure_retrieval(retrieval: &mut RetrievalConfig) -> Result<()> {
    let strategies = &[RetrievalStrategy::Plain, RetrievalStrategy::MultiQuery];
    let default_index = strategies
        .iter()
        .position(|s| *s == retrieval.strategy)
        .unwrap_or(0);

    let strategy_index = Select::new()
        .with_prompt("Retrieval strategy")
        .default(default_index)
        .items(strategies)
        .interact()?;

    let top_k: usize = Input::new()
        .with_prompt("Chunks retrieved per query")
        .default(retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Must be between 1 and 100")
            }
        })
        .interact_text()?;

    retrieval.strategy = strategies[strategy_index];
    retrieval.top_k = top_k;

    Ok(())
}
