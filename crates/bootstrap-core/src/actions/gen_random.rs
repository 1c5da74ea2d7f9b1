use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;

use crate::action::Action;
use crate::error::Result;
use crate::state::State;

/// Record a random alphanumeric string (e.g. a generated auth key) as
/// `{data}` for later steps to interpolate.
#[derive(Debug, Clone, Deserialize)]
pub struct GenRandomAction {
    pub id: String,
    #[serde(default = "default_length")]
    pub length: usize,
    /// Used verbatim instead of generating, when set.
    #[serde(default)]
    pub data: Option<String>,
}

fn default_length() -> usize {
    32
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[async_trait]
impl Action for GenRandomAction {
    async fn run(&mut self, state: &mut State) -> Result<()> {
        let data = match self.data.take().filter(|d| !d.is_empty()) {
            Some(d) => d,
            None => random_string(self.length),
        };
        state.step_data.insert(self.id.clone(), json!({ "data": data }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generates_string_of_requested_length() {
        let mut state = State::new("", 1, true);
        let mut a: GenRandomAction =
            serde_json::from_value(json!({"id": "key", "action": "gen-random", "length": 12}))
                .unwrap();
        a.run(&mut state).await.unwrap();

        let data = state.step_data["key"]["data"].as_str().unwrap();
        assert_eq!(data.len(), 12);
        assert!(data.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn default_length_is_32() {
        let mut state = State::new("", 1, true);
        let mut a: GenRandomAction =
            serde_json::from_value(json!({"id": "key", "action": "gen-random"})).unwrap();
        a.run(&mut state).await.unwrap();
        assert_eq!(state.step_data["key"]["data"].as_str().unwrap().len(), 32);
    }

    #[tokio::test]
    async fn explicit_data_is_kept() {
        let mut state = State::new("", 1, true);
        let mut a = GenRandomAction {
            id: "key".into(),
            length: 32,
            data: Some("fixed".into()),
        };
        a.run(&mut state).await.unwrap();
        assert_eq!(state.step_data["key"], json!({"data": "fixed"}));
    }
}
