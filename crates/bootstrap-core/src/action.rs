//! Step actions and the name → constructor registry.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::{CheckAction, GenRandomAction, RunAppAction, WaitAction};
use crate::error::{BootstrapError, Result};
use crate::state::State;

/// One unit of work in a manifest.
///
/// An action is decoded from its full step record, run once against the
/// shared [`State`], and dropped. Results that later steps (or the caller)
/// should see go into `state.step_data` under the step's own id.
#[async_trait]
pub trait Action: Send {
    async fn run(&mut self, state: &mut State) -> Result<()>;
}

/// The `{id, action}` descriptor every manifest step carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepAction {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub action: String,
}

impl StepAction {
    pub fn new(id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
        }
    }
}

type Constructor = fn(&str, Value) -> Result<Box<dyn Action>>;

fn construct<A>(step: &str, raw: Value) -> Result<Box<dyn Action>>
where
    A: Action + DeserializeOwned + 'static,
{
    let action: A = serde_json::from_value(raw).map_err(|source| BootstrapError::Decode {
        step: step.to_string(),
        source,
    })?;
    Ok(Box::new(action))
}

/// Maps action names to the types that implement them.
///
/// Built once before a run and handed to the executor; it is never mutated
/// while a manifest runs.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every action this crate ships.
    pub fn builtin() -> Self {
        let mut r = Self::new();
        r.register::<CheckAction>("check");
        r.register::<RunAppAction>("run-app");
        r.register::<GenRandomAction>("gen-random");
        r.register::<WaitAction>("wait");
        r
    }

    /// Register `A` under `name`. A later registration of the same name
    /// replaces the earlier one.
    pub fn register<A>(&mut self, name: &str) -> &mut Self
    where
        A: Action + DeserializeOwned + 'static,
    {
        self.constructors.insert(name.to_string(), construct::<A>);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Instantiate the action named by `step.action`, decoding `raw` (the
    /// whole step record) into it.
    pub fn resolve(&self, step: &StepAction, raw: Value) -> Result<Box<dyn Action>> {
        let ctor = self
            .constructors
            .get(&step.action)
            .ok_or_else(|| BootstrapError::UnknownAction(step.action.clone()))?;
        ctor(&step.id, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Record {
        id: String,
        value: u32,
    }

    #[async_trait]
    impl Action for Record {
        async fn run(&mut self, state: &mut State) -> Result<()> {
            state.step_data.insert(self.id.clone(), json!(self.value));
            Ok(())
        }
    }

    #[test]
    fn builtin_registers_all_actions() {
        let r = ActionRegistry::builtin();
        assert_eq!(r.names(), vec!["check", "gen-random", "run-app", "wait"]);
    }

    #[test]
    fn unknown_action_is_error() {
        let r = ActionRegistry::builtin();
        let err = r
            .resolve(&StepAction::new("x", "deploy-rockets"), json!({}))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), r#"bootstrap: unknown action "deploy-rockets""#);
    }

    #[test]
    fn bad_payload_names_the_step() {
        let mut r = ActionRegistry::new();
        r.register::<Record>("record");
        let err = r
            .resolve(
                &StepAction::new("r1", "record"),
                json!({"id": "r1", "action": "record", "value": "nope"}),
            )
            .err()
            .unwrap();
        assert!(matches!(err, BootstrapError::Decode { ref step, .. } if step == "r1"));
    }

    #[tokio::test]
    async fn resolved_action_runs_against_state() {
        let mut r = ActionRegistry::new();
        r.register::<Record>("record");
        assert!(r.contains("record"));

        let mut action = r
            .resolve(
                &StepAction::new("r1", "record"),
                json!({"id": "r1", "action": "record", "value": 7}),
            )
            .unwrap();
        let mut state = State::new("", 1, true);
        action.run(&mut state).await.unwrap();
        assert_eq!(state.step_data["r1"], json!(7));
    }
}
