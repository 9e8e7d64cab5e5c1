use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use autocomment_core::{derive_output, discover, language_for, Settings};
use autocomment_llm::Assistant;

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Written(PathBuf),
    /// Input was empty; nothing was sent or written.
    Skipped,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Run the assistant's task over one file and write the result.
///
/// Without an explicit `output` the result goes next to the input (see [`derive_output`]).
pub async fn process_file(
    assistant: &Assistant,
    input: &Path,
    output: Option<&Path>,
    suffix: &str,
) -> Result<Outcome> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| derive_output(input, assistant.task(), suffix));

    log::info!("reading file: {}", input.display());
    let source = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    if source.trim().is_empty() {
        log::warn!("{} is empty, skipping", input.display());
        return Ok(Outcome::Skipped);
    }

    let language = language_for(input);
    log::info!("detected language: {language}");
    log::info!(
        "running {} with {} (this may take a moment)",
        assistant.task(),
        assistant.provider()
    );

    let result = if assistant.task().produces_report() {
        assistant
            .complete(&source, language)
            .await
            .with_context(|| format!("{} failed for {}", assistant.task(), input.display()))?
    } else {
        assistant.annotate(&source, language).await
    };

    log::info!("writing result to: {}", output.display());
    fs::write(&output, result)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(Outcome::Written(output))
}

/// Process every matching file under `root`, one at a time.
///
/// A failing file is logged and counted; the walk carries on.
pub async fn process_directory(assistant: &Assistant, root: &Path, settings: &Settings) -> Summary {
    let files = discover(root, &settings.supported_extensions, &settings.output_suffix);
    log::info!(
        "processing directory: {} ({} matching file(s))",
        root.display(),
        files.len()
    );

    let mut summary = Summary::default();
    for file in &files {
        match process_file(assistant, file, None, &settings.output_suffix).await {
            Ok(Outcome::Written(_)) => summary.succeeded += 1,
            Ok(Outcome::Skipped) => summary.skipped += 1,
            Err(e) => {
                log::error!("{e:#}");
                summary.failed += 1;
            }
        }
    }
    summary
}
