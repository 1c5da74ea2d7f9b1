//! Built-in step actions, registered by [`ActionRegistry::builtin`](crate::ActionRegistry::builtin).

pub mod check;
pub mod gen_random;
pub mod run_app;
pub mod wait;

pub use check::CheckAction;
pub use gen_random::GenRandomAction;
pub use run_app::{RunAppAction, RunAppState};
pub use wait::WaitAction;
