//! `host-client`: typed client for the fleet host job API.
//!
//! A host runs jobs and publishes their lifecycle (`create`, `start`,
//! `stop`, `error`, …) as a server-sent-event stream. The bootstrap
//! orchestrator only ever talks to hosts through the [`Host`] trait, so
//! alternative transports and test doubles plug in at that seam.
//!
//! # Architecture
//!
//! ```text
//! HostClient      ← reqwest client for one host's /host/jobs API
//!     │
//!     ▼
//! EventStream     ← implements futures::Stream<Item = Result<Event>>
//!     │              background SSE decoder + mpsc channel
//!     ▼
//! Event           ← {event, job_id, job?}
//! ```

pub mod client;
pub mod error;
pub mod host;
pub mod stream;
pub mod types;

pub use client::HostClient;
pub use error::HostError;
pub use host::Host;
pub use stream::EventStream;
pub use types::{
    ActiveJob, ContainerConfig, Event, EventKind, Job, JobArtifact, JobStatus, Mount, Port,
    ResourceSpec, Resources, VolumeBinding, VolumeInfo,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, HostError>;
