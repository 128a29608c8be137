//! subsync - keep git submodules pulled, pushed and pinned
//!
//! subsync pulls every submodule of a parent repository to its integration
//! branch, offers to commit and push whatever diverged locally, and records
//! the new submodule heads in the parent.
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`git`]: The git command seam and the operations built on it
//! - [`operator`]: Terminal prompts
//! - [`updater`], [`detector`], [`reconciler`], [`repin`]: the workflow steps
//! - [`sync`]: The driver tying the steps together

pub mod config;
pub mod detector;
pub mod discovery;
pub mod git;
pub mod health;
pub mod operator;
pub mod reconciler;
pub mod repin;
pub mod sync;
pub mod updater;

pub use config::Config;
pub use detector::DivergenceState;
pub use discovery::Submodule;
pub use git::{CommandOutput, CommandRunner, GitClient, ProcessRunner};
pub use health::HealthCheck;
pub use operator::{Operator, TerminalOperator};
pub use reconciler::ReconcileOutcome;
pub use repin::{PushResult, RepinOutcome};
pub use sync::{RunOutcome, StatusOutcome, SyncEngine, SyncOptions, SyncSummary};
pub use updater::{UpdateFailure, UpdateStage};
