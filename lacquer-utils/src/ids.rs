//! ABOUTME: Identifier helpers shared across the engine
//! ABOUTME: Thin wrappers over lacquer-core's ComponentId for run/step scoped ids, plus the
//! ABOUTME: identifier-shape rule shared by step/agent/tool ids

use lacquer_core::ComponentId;
use uuid::Uuid;

/// Whether `s` matches `[A-Za-z_][A-Za-z0-9_]*`, the identifier shape
/// required of step ids, agent names, and tool names.
#[must_use]
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A random v4 identifier for a single workflow run.
#[must_use]
pub fn new_run_id() -> Uuid {
    Uuid::new_v4()
}

/// A deterministic identifier derived from a step's declared id, stable
/// across re-runs of the same document (used to key content-hash caches for
/// compiled script runtimes).
#[must_use]
pub fn step_component_id(step_id: &str) -> ComponentId {
    ComponentId::from_name(step_id)
}
