use async_trait::async_trait;

use crate::stream::EventStream;
use crate::types::{ActiveJob, Job, VolumeInfo};
use crate::Result;

/// A fleet member capable of running jobs and streaming their lifecycle.
///
/// Handles are shared read-only across the whole bootstrap run, so every
/// operation takes `&self`.
#[async_trait]
pub trait Host: Send + Sync {
    /// Host identifier, also used as the job id prefix.
    fn id(&self) -> &str;

    /// `host:port` the host API listens on.
    fn addr(&self) -> &str;

    /// Submit a job. Returns once the host has accepted the submission, not
    /// once the job is running.
    async fn add_job(&self, job: &Job) -> Result<()>;

    /// Fetch the host's current record of a job.
    async fn get_job(&self, id: &str) -> Result<ActiveJob>;

    /// Subscribe to events for one job id, or `"all"`.
    ///
    /// Returns only after the subscription is live, so no event published
    /// after this call returns can be missed.
    async fn stream_events(&self, job_id: &str) -> Result<EventStream>;

    /// Create a data volume on this host.
    async fn create_volume(&self) -> Result<VolumeInfo>;
}
