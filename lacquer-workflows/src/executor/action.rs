//! ABOUTME: Built-in action step runner - update_state and human_input
//! ABOUTME: human_input has no durable transport; it suspends the step until resume_human_input is called

use crate::context::RunContext;
use lacquer_core::document::Value;
use std::collections::BTreeMap;

/// Outcome of a single built-in action. `Suspended` is not a failure: the
/// scheduler parks the step rather than retrying or failing it, and it
/// becomes ready again once `RunContext::resume_human_input` is called.
pub enum ActionOutcome {
    Completed { output: BTreeMap<String, Value> },
    Suspended,
}

pub fn update_state(run: &RunContext, updates: &BTreeMap<String, Value>) -> ActionOutcome {
    for (key, value) in updates {
        run.state_set(key.clone(), value.clone());
    }
    ActionOutcome::Completed { output: BTreeMap::new() }
}

/// Returns `Suspended` the first time a given step id is seen; once a
/// caller has resolved the suspension via `resume_human_input`, the value is
/// taken and surfaced as the step's `response` output.
pub fn human_input(run: &RunContext, step_id: &str) -> ActionOutcome {
    match run.take_human_input(step_id) {
        Some(value) => {
            let mut output = BTreeMap::new();
            output.insert("response".to_string(), value);
            ActionOutcome::Completed { output }
        }
        None => ActionOutcome::Suspended,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn update_state_writes_every_key() {
        let run = RunContext::new(BTreeMap::new(), BTreeMap::new());
        let mut updates = BTreeMap::new();
        updates.insert("counter".to_string(), Value::Int(1));
        let outcome = update_state(&run, &updates);
        assert!(matches!(outcome, ActionOutcome::Completed { .. }));
        assert_eq!(run.state_get("counter"), Some(Value::Int(1)));
    }

    #[test]
    fn human_input_suspends_until_resumed() {
        let run = RunContext::new(BTreeMap::new(), BTreeMap::new());
        assert!(matches!(human_input(&run, "approve"), ActionOutcome::Suspended));
        run.resume_human_input("approve", Value::Bool(true));
        match human_input(&run, "approve") {
            ActionOutcome::Completed { output } => {
                assert_eq!(output.get("response"), Some(&Value::Bool(true)));
            }
            ActionOutcome::Suspended => panic!("expected completion after resume"),
        }
    }
}
