//! Switchyard: LLM request orchestration.
//!
//! A [`CallSpec`](types::CallSpec) names an ordered list of provider
//! candidates, the conversation and the tools on offer. The
//! [`Orchestrator`](orchestrator::Orchestrator) retries and falls back across
//! candidates, runs the tool loop under a call budget and aggregates the
//! result, either at once ([`run`](orchestrator::Orchestrator::run)) or as a
//! pull-based event stream ([`stream`](orchestrator::Orchestrator::stream)).
//!
//! # Quick Start
//!
//! ```no_run
//! use switchyard::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> switchyard::error::Result<()> {
//! let orchestrator = Orchestrator::from_config(&SwitchyardConfig::default())?;
//! let spec = CallSpec {
//!     messages: vec![ModelMessage::user("Hello!")],
//!     candidates: vec!["local:echo".parse()?],
//!     ..Default::default()
//! };
//! let response = orchestrator.run(&spec, &CancellationToken::new()).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod admission;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;
