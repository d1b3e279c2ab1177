//! Command-line interface: one-shot `run`/`stream` calls and `serve`.

use std::io::Read;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::SwitchyardConfig;
use crate::error::SwitchyardError;
use crate::orchestrator::{Orchestrator, StreamEvent};
use crate::types::{CallSpec, ProviderCandidate};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "SWITCHYARD_LOG";

/// Switchyard LLM orchestrator
#[derive(Parser, Debug)]
#[command(name = "switchyard", version, about = "LLM request orchestration with provider fallback and tool loops")]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a call spec and print the aggregated response
    Run(SpecArgs),
    /// Stream a call spec, one JSON event per line
    Stream(SpecArgs),
    /// Start the HTTP server
    Serve(ServeArgs),
}

/// Where the call spec comes from. Stdin when neither flag is given.
#[derive(Args, Debug, Default)]
pub struct SpecArgs {
    /// Read the call spec from a JSON file
    #[arg(long, conflicts_with = "spec")]
    pub file: Option<PathBuf>,

    /// Inline JSON spec
    #[arg(long)]
    pub spec: Option<String>,

    /// Replace the call spec's candidates (provider:model, repeatable)
    #[arg(long = "candidate", short = 'c')]
    pub candidates: Vec<ProviderCandidate>,
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Listen address, overriding the config file
    #[arg(long)]
    pub listen: Option<String>,
}

impl SpecArgs {
    /// Load the call spec from the selected source and apply overrides.
    pub fn load(&self, stdin: impl Read) -> Result<CallSpec, SwitchyardError> {
        let raw = match (&self.file, &self.spec) {
            (Some(path), _) => std::fs::read_to_string(path)?,
            (None, Some(inline)) => inline.clone(),
            (None, None) => {
                let mut buf = String::new();
                let mut stdin = stdin;
                stdin.read_to_string(&mut buf)?;
                buf
            }
        };
        let mut spec: CallSpec = serde_json::from_str(&raw)
            .map_err(|err| SwitchyardError::Validation(format!("invalid call spec: {err}")))?;
        if !self.candidates.is_empty() {
            spec.candidates = self.candidates.clone();
        }
        Ok(spec)
    }
}

/// Install the stderr subscriber. Keeps an existing global subscriber.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Execute a parsed command line.
pub async fn execute(cli: Cli) -> Result<(), SwitchyardError> {
    let mut config = SwitchyardConfig::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Run(args) => {
            let spec = args.load(std::io::stdin())?;
            let orchestrator = Orchestrator::from_config(&config)?;
            let cancel = cancel_on_ctrl_c();
            let response = orchestrator.run(&spec, &cancel).await?;
            println!("{}", serde_json::to_string(&response)?);
            Ok(())
        }
        Commands::Stream(args) => {
            let spec = args.load(std::io::stdin())?;
            let orchestrator = Orchestrator::from_config(&config)?;
            let cancel = cancel_on_ctrl_c();
            let mut events = orchestrator.stream(spec, cancel).await?;
            while let Some(event) = events.next().await {
                println!("{}", serde_json::to_string(&event)?);
                if let StreamEvent::Error { message, .. } = event {
                    return Err(SwitchyardError::Stream(message));
                }
            }
            Ok(())
        }
        Commands::Serve(args) => {
            if let Some(listen) = args.listen {
                config.server.listen = listen;
            }
            crate::server::serve(&config).await
        }
    }
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            token.cancel();
        }
    });
    cancel
}
