mod run;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use autocomment_core::{default_settings_path, write_settings, Settings, SettingsStore, Task};
use autocomment_llm::{local_models, select_model, Assistant, LlmError};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "autocomment",
    version,
    about = "Add LLM-generated comments to source files",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Settings file [default: ~/.autocomment/settings.json]
    #[arg(long, env = "AUTOCOMMENT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Source file or directory to process
    path: Option<PathBuf>,

    /// Where to write the result (single file only)
    output: Option<PathBuf>,

    /// comment, find-bugs, review, explain or optimize
    #[arg(long, default_value = "comment")]
    task: Task,

    /// Use this model instead of selecting one
    #[arg(short = 'm', long)]
    model: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default settings file
    Init {
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },

    /// List models installed on the local endpoint
    Models,

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the current settings (cloud key masked)
    Show,

    /// Set one value by its JSON key, e.g. `config set model llama3`
    Set { key: String, value: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(err) = e.downcast_ref::<LlmError>() {
                print_fatal_hint(err);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.unwrap_or_else(default_settings_path);
    match cli.command {
        Some(Commands::Init { force }) => init(&config_path, force),
        Some(Commands::Models) => models(&config_path).await,
        Some(Commands::Config { command }) => config(&config_path, command),
        None => process(&config_path, cli.run).await,
    }
}

async fn process(config_path: &Path, args: RunArgs) -> Result<ExitCode> {
    let Some(path) = args.path else {
        bail!("no input given; run `autocomment --help` for usage");
    };
    if !path.exists() {
        bail!("invalid path: {}", path.display());
    }

    let settings = SettingsStore::open(config_path)?.into_settings();
    let assistant = Assistant::connect(settings.clone(), args.task, args.model.as_deref()).await?;
    log::info!("using model: {}", assistant.provider());

    if path.is_dir() {
        if let Some(output) = &args.output {
            log::warn!(
                "ignoring output {} in directory mode; results go next to each input",
                output.display()
            );
        }
        let summary = run::process_directory(&assistant, &path, &settings).await;
        println!(
            "{} written, {} skipped, {} failed",
            summary.succeeded, summary.skipped, summary.failed
        );
        if summary.failed > 0 && summary.succeeded == 0 {
            return Ok(ExitCode::FAILURE);
        }
    } else {
        match run::process_file(&assistant, &path, args.output.as_deref(), &settings.output_suffix)
            .await?
        {
            run::Outcome::Written(output) => println!("Wrote {}", output.display()),
            run::Outcome::Skipped => println!("{} is empty, nothing to do", path.display()),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn init(config_path: &Path, force: bool) -> Result<ExitCode> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    write_settings(config_path, &Settings::default())?;
    println!("Wrote {}", config_path.display());
    println!("Make sure your local LLM is running: ollama serve");
    Ok(ExitCode::SUCCESS)
}

async fn models(config_path: &Path) -> Result<ExitCode> {
    let settings = SettingsStore::open(config_path)?.into_settings();
    let models = local_models(&settings.endpoint)
        .await
        .with_context(|| format!("could not list models at {}", settings.endpoint))?;

    let Ok(chosen) = select_model(&models) else {
        println!("No models installed at {}.", settings.endpoint);
        println!("Pull one with: ollama pull mistral");
        return Ok(ExitCode::FAILURE);
    };

    println!("Models at {}:", settings.endpoint);
    for model in &models {
        let marker = if model.reference == chosen.reference { "*" } else { " " };
        println!("{marker} {:<32} rank {}", model.reference, model.rank());
    }
    if !settings.auto_select_model {
        println!("Automatic selection is off; configured model: {}", settings.model);
    }
    Ok(ExitCode::SUCCESS)
}

fn config(config_path: &Path, command: ConfigCommands) -> Result<ExitCode> {
    let mut store = SettingsStore::open(config_path)?;
    match command {
        ConfigCommands::Show => {
            let mut shown = store.settings().clone();
            if shown.cloud_credential().is_some() {
                shown.cloud_api_key = Some("********".to_string());
            }
            println!("# {}", store.path().display());
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        ConfigCommands::Set { key, value } => {
            store.set(&key, &value)?;
            println!("{key} updated");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_fatal_hint(err: &LlmError) {
    match err {
        LlmError::MissingCredential { .. } => {
            eprintln!();
            eprintln!("Make sure you have Ollama installed and running:");
            eprintln!("  1. Download Ollama: https://ollama.ai");
            eprintln!("  2. Run: ollama serve");
            eprintln!("  3. In another terminal, pull a model: ollama pull mistral");
            eprintln!();
            eprintln!("Or configure the cloud fallback:");
            eprintln!("  autocomment config set cloud_api_key <key>");
        }
        LlmError::NoModels => {
            eprintln!();
            eprintln!("Pull a model first: ollama pull mistral");
        }
        _ => {}
    }
}
