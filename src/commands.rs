use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::index::open_or_build;
use crate::openai::OpenAiClient;
use crate::pipeline::{DEFAULT_TEMPERATURE, OpenAiProvider, Pipeline, QueryOutcome, QueryRequest};

fn spinner() -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Build the index if it does not exist yet and report its size
#[inline]
pub async fn build_index(config_dir: &Path, api_key: Option<String>) -> Result<()> {
    let config = Config::load(config_dir)?;
    let Some(api_key) = api_key.filter(|key| !key.trim().is_empty()) else {
        bail!("{}", QueryOutcome::MissingApiKey.message());
    };

    let embedder = Arc::new(
        OpenAiClient::new(&config.openai, &api_key).context("Failed to create OpenAI client")?,
    );

    let bar = spinner();
    let result = open_or_build(&config, embedder, &bar).await;
    bar.finish_and_clear();
    let index = result?;

    let chunks = index.len().await?;
    info!("Index at {} holds {} chunks", index.path().display(), chunks);
    println!(
        "Index ready: {} ({} chunks, {} dimensions)",
        style(index.path().display()).cyan(),
        chunks,
        index.dimension()
    );
    Ok(())
}

/// Answer a single question and print the result
#[inline]
pub async fn ask(
    config_dir: &Path,
    query: String,
    temperature: f32,
    api_key: Option<String>,
) -> Result<()> {
    let config = Config::load(config_dir)?;
    let request = QueryRequest::new(query, api_key).with_temperature(temperature);
    let outcome = answer_with_spinner(&config, &request).await?;
    print_outcome(&outcome);
    Ok(())
}

/// Interactive question loop; an empty question ends the session
#[inline]
pub async fn chat_session(config_dir: &Path, api_key: Option<String>) -> Result<()> {
    let config = Config::load(config_dir)?;

    println!("{}", style("Press release Q&A").bold().cyan());

    let api_key = match api_key {
        Some(key) if !key.trim().is_empty() => key,
        _ => Password::new()
            .with_prompt("OpenAI API key")
            .allow_empty_password(true)
            .interact()?,
    };
    let temperature: f32 = Input::new()
        .with_prompt("Temperature (0.0 - 1.0)")
        .default(DEFAULT_TEMPERATURE)
        .interact_text()?;

    loop {
        let query: String = Input::new()
            .with_prompt("Question (empty to quit)")
            .allow_empty(true)
            .interact_text()?;
        if query.trim().is_empty() {
            break;
        }

        let request =
            QueryRequest::new(query, Some(api_key.clone())).with_temperature(temperature);
        let outcome = answer_with_spinner(&config, &request).await?;
        print_outcome(&outcome);

        if outcome == QueryOutcome::MissingApiKey {
            break;
        }
    }

    Ok(())
}

async fn answer_with_spinner(config: &Config, request: &QueryRequest) -> Result<QueryOutcome> {
    let bar = spinner();
    bar.set_message("Thinking");
    let pipeline =
        Pipeline::new(config.clone(), Box::new(OpenAiProvider)).with_progress(bar.clone());
    let result = pipeline.handle(request).await;
    bar.finish_and_clear();
    result
}

fn print_outcome(outcome: &QueryOutcome) {
    if outcome.is_answered() {
        println!("{}", outcome.message());
    } else {
        println!("{}", style(outcome.message()).yellow());
    }
}
