//! `bootstrap-core`: runs a cluster bootstrap manifest.
//!
//! A manifest is a JSON array of steps, each `{id, action, ...}`. The
//! [`Bootstrap`] executor waits until enough hosts have joined the cluster,
//! then runs every step's [`Action`] in order against a shared [`State`],
//! streaming [`StepInfo`] progress events to the caller.
//!
//! # Architecture
//!
//! ```text
//! Bootstrap        ← executor: validation, discoverd ping, step loop
//!     │
//!     ├── ReadinessGate   ← polls discovery until min hosts are online
//!     │
//!     ├── ActionRegistry  ← action name → constructor
//!     │
//!     ▼
//! Action::run(&mut State)
//!     │
//!     └── run-app ── provision() → launch_job() per instance
//!                                      │
//!                                      ▼
//!                              host_client::Host (subscribe, submit, wait)
//! ```

pub mod action;
pub mod actions;
pub mod attempt;
pub mod bootstrap;
pub mod config;
pub mod discoverd;
pub mod discovery;
pub mod error;
pub mod formation;
pub mod gate;
pub mod interpolate;
pub mod launch;
pub mod resource;
pub mod state;

#[cfg(test)]
mod testing;

pub use action::{Action, ActionRegistry, StepAction};
pub use bootstrap::{Bootstrap, StepInfo, StepState, ONLINE_HOSTS_STEP};
pub use config::BootstrapConfig;
pub use discovery::DiscoveryClient;
pub use error::{BootstrapError, Result};
pub use gate::{HostConnector, HttpConnector, ReadinessGate};
pub use launch::{launch_job, JobRecord};
pub use state::State;
