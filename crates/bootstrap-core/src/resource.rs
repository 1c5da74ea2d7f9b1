use serde_json::Value;
use tracing::info;

use crate::error::{BootstrapError, Result};
use crate::formation::Resource;

/// Ask a resource provider to create a resource.
///
/// `POST <url>` with `config` (or `{}`) as the body; a 2xx `{id, env}`
/// response describes the new resource. No retries: a failed call fails the
/// enclosing deployment.
pub async fn provision(http: &reqwest::Client, url: &str, config: Option<&Value>) -> Result<Resource> {
    let empty = Value::Object(Default::default());
    let body = config.unwrap_or(&empty);

    let res = http
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| BootstrapError::Provision {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = res.status();
    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        return Err(BootstrapError::Provision {
            url: url.to_string(),
            reason: format!("unexpected status {}: {}", status.as_u16(), text.trim()),
        });
    }

    let resource: Resource = res.json().await.map_err(|e| BootstrapError::Provision {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    info!(url, resource = %resource.id, "resource provisioned");
    Ok(resource)
}
