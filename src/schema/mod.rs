//! Declarative schema validation for repaired LLM output.
//!
//! Each note kind family has its own schema: a generic note schema for the
//! concept-note kinds and a cheatsheet schema for freeform bodies. Unknown
//! top-level keys pass through untouched so new LLM fields do not break
//! older templates. Validation enumerates every failing path instead of
//! stopping at the first.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A recursive bulleted-list node.
///
/// Any field whose name matches the `_bullets` convention carries an array
/// of these. A node with empty `content` is invalid; the renderer skips it
/// rather than failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulletNode {
    /// The bullet text.
    #[serde(default)]
    pub content: String,
    /// Nested child bullets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BulletNode>,
}

impl BulletNode {
    /// Creates a leaf node.
    #[must_use]
    pub fn leaf(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            children: Vec::new(),
        }
    }
}

/// Expected type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A JSON string.
    Str,
    /// An array of strings.
    StrArray,
    /// An array of recursive bullet nodes.
    Bullets,
    /// A JSON object (sub-objects are validated through their own dotted
    /// field rules).
    Object,
}

/// One declarative field rule: dotted path, expected type, requiredness.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    /// Dotted path into the object (e.g. `details.explanation_bullets`).
    pub path: &'static str,
    /// Expected type at the path.
    pub kind: FieldKind,
    /// Whether the field must be present.
    pub required: bool,
}

const fn rule(path: &'static str, kind: FieldKind, required: bool) -> FieldRule {
    FieldRule {
        path,
        kind,
        required,
    }
}

/// A per-kind-family schema.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    /// Stable identifier used in error messages.
    pub id: &'static str,
    rules: &'static [FieldRule],
}

/// Generic concept-note schema: Core, Fundamental, Comparison, and every
/// other kind that is not a cheatsheet.
pub const GENERIC_NOTE: Schema = Schema {
    id: "generic_note",
    rules: &[
        rule("concept_name", FieldKind::Str, true),
        rule("summary", FieldKind::Object, false),
        rule("summary.overview", FieldKind::Str, false),
        rule("fundamental", FieldKind::Object, false),
        rule("fundamental.principle_bullets", FieldKind::Bullets, false),
        rule("details", FieldKind::Object, false),
        rule("details.explanation_bullets", FieldKind::Bullets, false),
        rule("comparison", FieldKind::Object, false),
        rule("comparison.contrast_bullets", FieldKind::Bullets, false),
        rule("relationship", FieldKind::Object, false),
        rule("relationship.context", FieldKind::Str, false),
        rule("connections", FieldKind::Object, false),
        rule("connections.link_bullets", FieldKind::Bullets, false),
        rule("keywords", FieldKind::StrArray, false),
        rule("related", FieldKind::StrArray, false),
        rule("code", FieldKind::Str, false),
    ],
};

/// Cheatsheet schema: freeform markdown body plus minimal metadata.
pub const CHEATSHEET: Schema = Schema {
    id: "cheatsheet",
    rules: &[
        rule("concept_name", FieldKind::Str, true),
        rule("body", FieldKind::Str, true),
        rule("keywords", FieldKind::StrArray, false),
    ],
};

/// Selects the schema for a note kind.
#[must_use]
pub fn schema_for_kind(kind: &str) -> Schema {
    if kind.eq_ignore_ascii_case("cheatsheet") {
        CHEATSHEET
    } else {
        GENERIC_NOTE
    }
}

/// One failing path inside a validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFailure {
    /// Dotted path of the offending field.
    pub path: String,
    /// What went wrong.
    pub problem: String,
}

/// Structured validation failure listing every offending path.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Identifier of the schema that was violated.
    pub schema: &'static str,
    /// Every failing field, in rule order.
    pub failures: Vec<FieldFailure>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema '{}' validation failed:", self.schema)?;
        for failure in &self.failures {
            write!(f, " [{}: {}]", failure.path, failure.problem)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Validates a repaired JSON object against the given schema.
///
/// Unknown top-level keys are preserved, not rejected. Recursive bullet
/// fields validate each node's `content` as a required string and
/// `children` as an optional array of the same shape.
///
/// # Errors
///
/// Returns a [`ValidationError`] enumerating every failing path.
pub fn validate(value: &Value, schema: &Schema) -> Result<(), ValidationError> {
    let mut failures = Vec::new();

    if !value.is_object() {
        failures.push(FieldFailure {
            path: "$".to_string(),
            problem: "expected a JSON object".to_string(),
        });
        return Err(ValidationError {
            schema: schema.id,
            failures,
        });
    }

    for field in schema.rules {
        match lookup(value, field.path) {
            None => {
                if field.required {
                    failures.push(FieldFailure {
                        path: field.path.to_string(),
                        problem: "missing required field".to_string(),
                    });
                }
            },
            Some(Value::Null) => {
                if field.required {
                    failures.push(FieldFailure {
                        path: field.path.to_string(),
                        problem: "required field is null".to_string(),
                    });
                }
            },
            Some(found) => check_kind(field, found, &mut failures),
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            schema: schema.id,
            failures,
        })
    }
}

fn check_kind(field: &FieldRule, found: &Value, failures: &mut Vec<FieldFailure>) {
    match field.kind {
        FieldKind::Str => {
            if found.as_str().is_none() {
                failures.push(FieldFailure {
                    path: field.path.to_string(),
                    problem: "expected a string".to_string(),
                });
            } else if field.required && found.as_str().is_some_and(|s| s.trim().is_empty()) {
                failures.push(FieldFailure {
                    path: field.path.to_string(),
                    problem: "required string is empty".to_string(),
                });
            }
        },
        FieldKind::StrArray => match found.as_array() {
            None => failures.push(FieldFailure {
                path: field.path.to_string(),
                problem: "expected an array of strings".to_string(),
            }),
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        failures.push(FieldFailure {
                            path: format!("{}[{i}]", field.path),
                            problem: "expected a string".to_string(),
                        });
                    }
                }
            },
        },
        FieldKind::Bullets => match found.as_array() {
            None => failures.push(FieldFailure {
                path: field.path.to_string(),
                problem: "expected an array of bullet nodes".to_string(),
            }),
            Some(nodes) => {
                for (i, node) in nodes.iter().enumerate() {
                    validate_bullet(node, &format!("{}[{i}]", field.path), failures);
                }
            },
        },
        FieldKind::Object => {
            if !found.is_object() {
                failures.push(FieldFailure {
                    path: field.path.to_string(),
                    problem: "expected an object".to_string(),
                });
            }
        },
    }
}

fn validate_bullet(node: &Value, path: &str, failures: &mut Vec<FieldFailure>) {
    let Some(obj) = node.as_object() else {
        failures.push(FieldFailure {
            path: path.to_string(),
            problem: "expected a bullet node object".to_string(),
        });
        return;
    };

    match obj.get("content") {
        Some(Value::String(_)) => {},
        Some(_) => failures.push(FieldFailure {
            path: format!("{path}.content"),
            problem: "expected a string".to_string(),
        }),
        None => failures.push(FieldFailure {
            path: format!("{path}.content"),
            problem: "missing required field".to_string(),
        }),
    }

    match obj.get("children") {
        None | Some(Value::Null) => {},
        Some(Value::Array(children)) => {
            for (i, child) in children.iter().enumerate() {
                validate_bullet(child, &format!("{path}.children[{i}]"), failures);
            }
        },
        Some(_) => failures.push(FieldFailure {
            path: format!("{path}.children"),
            problem: "expected an array of bullet nodes".to_string(),
        }),
    }
}

/// Resolves a dotted path inside a JSON value.
#[must_use]
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
