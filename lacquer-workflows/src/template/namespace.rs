//! ABOUTME: Namespace - the read-only view over a RunContext that paths resolve against
//! ABOUTME: Implements the scope resolution rules of §4.3: inputs/state/steps/metadata/env/workflow

use crate::context::RunContext;
use lacquer_core::document::{Value, WorkflowDocument};
use lacquer_core::error::TemplateError;

/// A read-only view assembled fresh for each render call (cheap: it only
/// borrows the document and the run context).
pub struct Namespace<'a> {
    document: &'a WorkflowDocument,
    run: &'a RunContext,
    /// The step whose scope is currently rendering (used to resolve
    /// self-references inside a `while` sub-step: `steps.<self>.iteration`).
    current_step: Option<&'a str>,
    iteration: Option<u64>,
}

impl<'a> Namespace<'a> {
    #[must_use]
    pub fn new(document: &'a WorkflowDocument, run: &'a RunContext) -> Self {
        Self {
            document,
            run,
            current_step: None,
            iteration: None,
        }
    }

    #[must_use]
    pub fn with_current_step(mut self, step_id: &'a str, iteration: u64) -> Self {
        self.current_step = Some(step_id);
        self.iteration = Some(iteration);
        self
    }

    pub fn resolve(&self, segments: &[String]) -> Result<Value, TemplateError> {
        let full_path = segments.join(".");
        let Some((scope, rest)) = segments.split_first() else {
            return Err(TemplateError::UnresolvedPath { path: full_path });
        };

        match scope.as_str() {
            "inputs" => self.resolve_inputs(rest, &full_path),
            "state" => self.resolve_state(rest, &full_path),
            "steps" => self.resolve_steps(rest, &full_path),
            "metadata" => self.resolve_metadata(rest, &full_path),
            "env" => Ok(self.resolve_env(rest)),
            "workflow" => self.resolve_workflow(rest, &full_path),
            _ => Err(TemplateError::UnresolvedPath { path: full_path }),
        }
    }

    fn resolve_inputs(&self, rest: &[String], full_path: &str) -> Result<Value, TemplateError> {
        let Some(name) = rest.first() else {
            return Err(TemplateError::UndefinedVariable { path: full_path.into() });
        };
        if let Some(value) = self.run.inputs.get(name) {
            return Ok(value.clone());
        }
        if let Some(declared) = self.document.inputs.get(name) {
            if let Some(default) = &declared.default {
                return Ok(default.clone());
            }
        }
        Err(TemplateError::UndefinedVariable { path: full_path.into() })
    }

    fn resolve_state(&self, rest: &[String], full_path: &str) -> Result<Value, TemplateError> {
        let Some(name) = rest.first() else {
            return Err(TemplateError::UndefinedVariable { path: full_path.into() });
        };
        self.run
            .state_get(name)
            .or_else(|| self.document.state.get(name).cloned())
            .ok_or_else(|| TemplateError::UndefinedVariable { path: full_path.into() })
    }

    fn resolve_steps(&self, rest: &[String], full_path: &str) -> Result<Value, TemplateError> {
        let [step_id, field, ..] = rest else {
            return Err(TemplateError::UndefinedVariable { path: full_path.into() });
        };

        if self.current_step == Some(step_id.as_str()) && field == "iteration" {
            return Ok(Value::Int(self.iteration.unwrap_or(0) as i64));
        }

        let Some(result) = self.run.step_result(step_id) else {
            return Err(TemplateError::UndefinedVariable { path: full_path.into() });
        };

        let field_name = if field == "outputs" {
            rest.get(2).map(String::as_str).unwrap_or(field)
        } else {
            field.as_str()
        };

        result.field(field_name).ok_or_else(|| TemplateError::UndefinedStepField {
            step: step_id.clone(),
            field: field_name.to_string(),
        })
    }

    fn resolve_metadata(&self, rest: &[String], full_path: &str) -> Result<Value, TemplateError> {
        let Some(field) = rest.first() else {
            return Err(TemplateError::UnresolvedPath { path: full_path.into() });
        };
        let value = match field.as_str() {
            "name" => Value::String(self.document.metadata.name.clone()),
            "description" => self
                .document
                .metadata
                .description
                .clone()
                .map_or(Value::Null, Value::String),
            "author" => self
                .document
                .metadata
                .author
                .clone()
                .map_or(Value::Null, Value::String),
            "version" => self
                .document
                .metadata
                .version
                .clone()
                .map_or(Value::Null, Value::String),
            "tags" => Value::List(
                self.document
                    .metadata
                    .tags
                    .iter()
                    .cloned()
                    .map(Value::String)
                    .collect(),
            ),
            _ => return Err(TemplateError::UnresolvedPath { path: full_path.into() }),
        };
        Ok(value)
    }

    fn resolve_env(&self, rest: &[String]) -> Value {
        let Some(name) = rest.first() else {
            return Value::String(String::new());
        };
        Value::String(std::env::var(name).unwrap_or_default())
    }

    fn resolve_workflow(&self, rest: &[String], full_path: &str) -> Result<Value, TemplateError> {
        let Some(field) = rest.first() else {
            return Err(TemplateError::UnresolvedPath { path: full_path.into() });
        };
        match field.as_str() {
            "run_id" => Ok(Value::String(self.run.run_id.to_string())),
            "started_at" => Ok(Value::String(self.run.started_at.to_rfc3339())),
            _ => Err(TemplateError::UnresolvedPath { path: full_path.into() }),
        }
    }
}
