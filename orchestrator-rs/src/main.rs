// orchestrator-rs/src/main.rs
// Command-line entry point for the complaint pipeline

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use complaint_types::PipelineError;
use llm_sdk::EnvConfigProvider;
use orchestrator::config::ENV_PREFIX;
use orchestrator::{
    credential, init_logging, render_usage_file, CurationPrompt, LogFormat, Orchestrator, PhaseSelection,
    PipelineConfig,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const EXIT_FAILURE: u8 = 1;
const EXIT_PRECONDITION: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "complaint-pipeline")]
#[command(about = "Collect, categorise and classify customer complaints")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "PIPELINE_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,
    /// Raise the log level (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one phase (1, 2, 4) or `all`
    Run {
        phase: PhaseSelection,
        /// In `all` mode, wait on stdin for curation instead of stopping
        #[arg(long, default_value_t = false)]
        pause_for_curation: bool,
    },
    /// Summarise the model usage log
    Usage {
        #[arg(long, default_value_t = false)]
        details: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

/// Waits for the operator to press Enter once the curated taxonomy is saved
struct StdinCurationPrompt;

#[async_trait]
impl CurationPrompt for StdinCurationPrompt {
    async fn wait_for_curation(&self, proposed: &Path, curated: &Path, reason: &str) -> bool {
        eprintln!();
        eprintln!("Curation needed: {}", reason);
        eprintln!("  review    {}", proposed.display());
        eprintln!("  save as   {}", curated.display());
        eprintln!("Press Enter when done, or type 'q' to stop.");

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(0) | Err(_) => false,
            Ok(_) => !line.trim().eq_ignore_ascii_case("q"),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = match err.downcast_ref::<PipelineError>() {
                Some(e) if e.is_cancelled() => EXIT_CANCELLED,
                Some(e) if e.is_precondition() => EXIT_PRECONDITION,
                _ => EXIT_FAILURE,
            };
            eprintln!("error: {:#}", err);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let env = EnvConfigProvider::new().with_prefix(ENV_PREFIX);
    let mut config = PipelineConfig::load(cli.config.as_deref(), &env).context("loading configuration")?;

    if let Some(format) = cli.log_format {
        config.logging.format = match format {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        };
    }
    match cli.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }
    init_logging(&config.logging)?;

    match cli.command {
        Command::Usage { details } => {
            let report = render_usage_file(&config.paths.usage_log(), details)
                .await
                .context("reading the usage log")?;
            print!("{}", report);
            Ok(())
        }
        Command::Run {
            phase,
            pause_for_curation,
        } => {
            let api_key = credential(&EnvConfigProvider::new());
            let mut orchestrator = Orchestrator::new(config, api_key);
            if pause_for_curation {
                orchestrator = orchestrator.with_curation_prompt(Arc::new(StdinCurationPrompt));
            }

            let cancel = orchestrator.cancellation();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, stopping after the current step");
                    cancel.cancel();
                }
            });

            let reports = orchestrator.run(phase).await?;
            for report in &reports {
                println!("{}", report);
            }
            Ok(())
        }
    }
}
