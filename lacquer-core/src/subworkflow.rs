//! ABOUTME: SubWorkflowRunner - the capability a block-kind step dispatches through
//! ABOUTME: Lives here (not lacquer-workflows) so lacquer-tools can depend on the trait without a
//! ABOUTME: cycle; lacquer-workflows provides the concrete impl and injects it into the registry

use crate::document::Value;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Runs a sub-workflow referenced by a `uses:` string and returns its
/// declared outputs. Implemented by the scheduler crate; the tool registry
/// and block executor only see this narrow surface.
#[async_trait]
pub trait SubWorkflowRunner: Send + Sync {
    async fn run(
        &self,
        reference: &str,
        inputs: BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>>;
}
