//! ABOUTME: YAML source -> `WorkflowDocument`, with source positions recovered for every path
//! ABOUTME: Two-pass: a `serde_yaml::Value` tree pass for shorthand/duration expansion, plus a
//! ABOUTME: raw-text indentation scan that builds the `SourceMap` used by every later error

use crate::report::{Category, Issue, Report};
use lacquer_core::document::{SourceMap, SourcePosition, WorkflowDocument};
use std::collections::HashMap;

/// Workflow documents are capped at 10 MiB; anything larger is rejected
/// before a single byte is handed to the YAML lexer.
const MAX_SOURCE_BYTES: usize = 10 * 1024 * 1024;

/// Parse a UTF-8 workflow source into a [`WorkflowDocument`]. On success the
/// returned document carries a populated `source_map`. On failure, every
/// issue found is collected into the returned [`Report`] rather than
/// stopping at the first one where that's possible (YAML syntax errors are
/// still necessarily singular — nothing downstream of a broken parse can be
/// inspected).
pub fn parse(source: &str) -> Result<WorkflowDocument, Report> {
    let mut report = Report::new();

    if source.len() > MAX_SOURCE_BYTES {
        report.push(Issue::error(
            Category::Yaml,
            "SourceTooLarge",
            "<root>",
            format!(
                "source document exceeds the 10 MiB size ceiling ({} bytes)",
                source.len()
            ),
        ));
        return Err(report);
    }

    let source_map = source_scan::build(source);

    let mut raw: serde_yaml::Value = match serde_yaml::from_str(source) {
        Ok(v) => v,
        Err(e) => {
            let position = e.location().map(|l| SourcePosition {
                line: l.line() as u32,
                column: l.column() as u32,
            });
            let mut issue = Issue::error(Category::Yaml, "YAMLParse", "<root>", e.to_string());
            if let Some(pos) = position {
                issue = issue.with_position(pos).with_excerpt(source);
            }
            report.push(issue);
            return Err(report);
        }
    };

    if let Some(mapping) = raw.as_mapping_mut() {
        if let Some(inputs) = mapping.get_mut("inputs") {
            expand_input_shorthand(inputs);
        }
        if let Some(steps) = mapping.get_mut("steps") {
            convert_durations_in_steps(steps, "steps", &source_map, &mut report);
        }
    }

    if !report.valid() {
        return Err(report);
    }

    let mut document: WorkflowDocument = match serde_yaml::from_value(raw) {
        Ok(doc) => doc,
        Err(e) => {
            report.push(Issue::error(Category::Yaml, "InvalidYaml", "<root>", e.to_string()));
            return Err(report);
        }
    };

    document.source_map = source_map;
    Ok(document)
}

/// `topic: string` -> `topic: { type: string, required: true }`. Only bare
/// scalar entries are expanded; anything already a mapping is left as-is.
fn expand_input_shorthand(inputs: &mut serde_yaml::Value) {
    let Some(mapping) = inputs.as_mapping_mut() else {
        return;
    };
    for (_, value) in mapping.iter_mut() {
        if let serde_yaml::Value::String(scalar) = value.clone() {
            let mut expanded = serde_yaml::Mapping::new();
            expanded.insert("type".into(), scalar.into());
            expanded.insert("required".into(), true.into());
            *value = serde_yaml::Value::Mapping(expanded);
        }
    }
}

/// Walks `steps:` (recursively through `while` sub-steps) converting
/// duration literals (`timeout`, `retry.initial_delay`) from their `"30s"`
/// string form into the seconds-as-number form the document model expects.
fn convert_durations_in_steps(
    steps: &mut serde_yaml::Value,
    prefix: &str,
    source_map: &SourceMap,
    report: &mut Report,
) {
    let Some(seq) = steps.as_sequence_mut() else {
        return;
    };
    for (i, step) in seq.iter_mut().enumerate() {
        let step_path = format!("{prefix}[{i}]");
        let Some(map) = step.as_mapping_mut() else {
            continue;
        };
        convert_duration_field(map, "timeout", &step_path, source_map, report);

        if let Some(retry_val) = map.get_mut("retry") {
            if let Some(retry_map) = retry_val.as_mapping_mut() {
                convert_duration_field(
                    retry_map,
                    "initial_delay",
                    &format!("{step_path}.retry"),
                    source_map,
                    report,
                );
            }
        }

        if let Some(nested) = map.get_mut("steps") {
            convert_durations_in_steps(nested, &format!("{step_path}.steps"), source_map, report);
        }
    }
}

fn convert_duration_field(
    map: &mut serde_yaml::Mapping,
    field: &str,
    path_prefix: &str,
    source_map: &SourceMap,
    report: &mut Report,
) {
    let key = serde_yaml::Value::String(field.to_string());
    let Some(v) = map.get_mut(key) else {
        return;
    };
    if let serde_yaml::Value::String(literal) = v.clone() {
        match lacquer_utils::parse_duration(&literal) {
            Ok(duration) => {
                *v = serde_yaml::Value::Number(duration.as_secs_f64().into());
            }
            Err(reason) => {
                let path = format!("{path_prefix}.{field}");
                let mut issue = Issue::error(
                    Category::Yaml,
                    "DurationParse",
                    path.clone(),
                    format!("could not parse duration literal '{literal}': {reason}"),
                );
                if let Some(pos) = source_map.lookup(&path) {
                    issue = issue.with_position(pos);
                }
                report.push(issue);
            }
        }
    }
}

/// The raw-text second pass: a small indentation-aware scanner that
/// recovers `(line, column)` for every dotted/JSON-pointer-like path in the
/// document, without re-implementing a full YAML grammar. Good enough for
/// block-style mappings and sequences, which is all the workflow format
/// uses; flow-style collections (`tags: [a, b]`) are not individually
/// positioned.
mod source_scan {
    use super::{HashMap, SourceMap, SourcePosition};

    struct Frame {
        indent: usize,
        path: String,
    }

    pub(super) fn build(source: &str) -> SourceMap {
        let mut map = SourceMap::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut list_counts: HashMap<String, usize> = HashMap::new();

        for (idx, raw_line) in source.lines().enumerate() {
            let line_no = (idx + 1) as u32;
            if raw_line.trim().is_empty() {
                continue;
            }
            let indent = raw_line.len() - raw_line.trim_start().len();
            let content = raw_line.trim_start();
            if content.starts_with('#') {
                continue;
            }

            while stack.last().is_some_and(|f| f.indent >= indent) {
                stack.pop();
            }
            let parent_path = stack.last().map_or_else(String::new, |f| f.path.clone());

            if let Some(rest) = content.strip_prefix("- ") {
                let item_path = next_item_path(&parent_path, &mut list_counts);
                map.insert(
                    item_path.clone(),
                    SourcePosition {
                        line: line_no,
                        column: (indent + 1) as u32,
                    },
                );
                stack.push(Frame {
                    indent,
                    path: item_path.clone(),
                });
                process_key_line(rest, indent + 2, line_no, &item_path, &mut stack, &mut map);
            } else if content == "-" {
                let item_path = next_item_path(&parent_path, &mut list_counts);
                map.insert(
                    item_path.clone(),
                    SourcePosition {
                        line: line_no,
                        column: (indent + 1) as u32,
                    },
                );
                stack.push(Frame {
                    indent,
                    path: item_path,
                });
            } else {
                process_key_line(content, indent, line_no, &parent_path, &mut stack, &mut map);
            }
        }

        map
    }

    fn next_item_path(parent_path: &str, list_counts: &mut HashMap<String, usize>) -> String {
        let counter = list_counts.entry(parent_path.to_string()).or_insert(0);
        let index = *counter;
        *counter += 1;
        if parent_path.is_empty() {
            format!("[{index}]")
        } else {
            format!("{parent_path}[{index}]")
        }
    }

    fn process_key_line(
        content: &str,
        indent: usize,
        line_no: u32,
        parent_path: &str,
        stack: &mut Vec<Frame>,
        map: &mut SourceMap,
    ) {
        while stack.last().is_some_and(|f| f.indent >= indent) {
            stack.pop();
        }

        let key = if let Some(pos) = content.find(": ") {
            &content[..pos]
        } else if let Some(stripped) = content.strip_suffix(':') {
            stripped
        } else {
            return;
        };
        let key = key.trim();
        if key.is_empty() {
            return;
        }

        let full_path = if parent_path.is_empty() {
            key.to_string()
        } else {
            format!("{parent_path}.{key}")
        };
        map.insert(
            full_path.clone(),
            SourcePosition {
                line: line_no,
                column: (indent + 1) as u32,
            },
        );
        stack.push(Frame {
            indent,
            path: full_path,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
version: "1.0"
metadata:
  name: demo
inputs:
  topic: string
steps:
  - id: s1
    agent: researcher
    prompt: "say hi about {{ inputs.topic }}"
"#;

    #[test]
    fn parses_shorthand_inputs_as_required_strings() {
        let doc = parse(MINIMAL).unwrap();
        let input = &doc.inputs["topic"];
        assert!(input.required);
        assert_eq!(input.param_type, lacquer_core::document::ParamType::String);
    }

    #[test]
    fn source_map_locates_nested_with_field() {
        let src = r#"
version: "1.0"
steps:
  - id: s1
    agent: researcher
    prompt: "hi"
    with:
      topic: "{{ inputs.topic }}"
"#;
        let doc = parse(src).unwrap();
        let pos = doc.source_map.lookup("steps[0].with.topic");
        assert!(pos.is_some());
    }

    #[test]
    fn rejects_oversized_source() {
        let huge = "a".repeat(MAX_SOURCE_BYTES + 1);
        let report = parse(&huge).unwrap_err();
        assert_eq!(report.issues[0].code, "SourceTooLarge");
    }

    #[test]
    fn converts_timeout_duration_literal_to_seconds() {
        let src = r#"
version: "1.0"
steps:
  - id: s1
    agent: researcher
    prompt: "hi"
    timeout: "30s"
"#;
        let doc = parse(src).unwrap();
        let step = doc.step("s1").unwrap();
        assert_eq!(step.timeout, Some(std::time::Duration::from_secs(30)));
    }

    #[test]
    fn malformed_duration_literal_is_a_report_error() {
        let src = r#"
version: "1.0"
steps:
  - id: s1
    agent: researcher
    prompt: "hi"
    timeout: "not-a-duration"
"#;
        let report = parse(src).unwrap_err();
        assert_eq!(report.issues[0].code, "DurationParse");
    }

    #[test]
    fn malformed_yaml_reports_a_position() {
        let src = "version: \"1.0\"\nsteps: [this is: not valid";
        let report = parse(src).unwrap_err();
        assert_eq!(report.issues[0].code, "YAMLParse");
    }
}
