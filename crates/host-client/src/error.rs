use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url}: unexpected status {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("failed to parse event frame: {source}\n  frame: {frame}")]
    Parse {
        frame: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("event stream error: {0}")]
    Stream(String),
}
