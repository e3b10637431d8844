//! ABOUTME: Shared utilities for the lacquer workflow engine
//! ABOUTME: Duration parsing, id helpers, and scratch workspace provisioning

pub mod duration;
pub mod ids;
pub mod sandbox;

pub use duration::parse_duration;
pub use ids::{is_valid_identifier, new_run_id, step_component_id};
pub use sandbox::ScratchWorkspace;
