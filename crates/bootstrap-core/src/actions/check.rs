use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::action::Action;
use crate::error::{BootstrapError, Result};
use crate::state::State;

/// Assert that enough hosts are known and record them.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckAction {
    pub id: String,
    /// Defaults to the run's `min_hosts`.
    #[serde(default)]
    pub min_hosts: Option<usize>,
}

#[async_trait]
impl Action for CheckAction {
    async fn run(&mut self, state: &mut State) -> Result<()> {
        let required = self.min_hosts.unwrap_or(state.min_hosts);
        if state.hosts.len() < required {
            return Err(BootstrapError::NotEnoughHosts {
                required,
                online: state.hosts.len(),
            });
        }
        state
            .step_data
            .insert(self.id.clone(), json!({ "hosts": state.host_summaries() }));
        Ok(())
    }
}
