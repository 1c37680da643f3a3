//! tunebench-core: tuning actions and orchestration
//!
//! Implements the `ActionExecutor` (ring buffers, tuned profiles, reboot
//! confirmation, environment tests) and the `TuningActor` front-end using
//! the kameo framework.

pub mod actor;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod exit_codes;
pub mod message;
pub mod outcome;
pub mod reboot;

pub use actor::tuning::{TuningActor, TuningActorArgs};
pub use commands::{CommandBuilder, parse_active_profile};
pub use config::{
    ClientRole, EnvTestSpec, ExecutorSettings, MutationSpec, ProfileSpec, RebootPolicy,
    RingBufferSpec, ServerRole,
};
pub use error::{ActionError, CoreError};
pub use executor::ActionExecutor;
pub use exit_codes::{ExitClass, ExitCodeTable};
pub use message::{
    ApplyProfile, ApplyRingBuffers, InvalidateInventory, ListNodes, RebootNodes, RunEnvTest,
};
pub use outcome::{ActionOutcome, BatchReport, EnvTestReport};
pub use reboot::{RebootState, RebootTracker};
