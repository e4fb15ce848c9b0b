//! Internal `$ref` resolution
//!
//! References are followed on demand against the parsed document instead of
//! materializing a dereferenced copy, so cyclic schemas cost nothing until
//! they are serialized. [`inline`] produces the self-contained form with an
//! explicit work stack: every reference target is expanded at most once and
//! later sightings become a `"[Circular: <pointer>]"` marker.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Upper bound on `$ref -> $ref` hops before a chain counts as a loop
const MAX_REF_HOPS: usize = 32;

/// The internal pointer of a `{"$ref": "#/..."}` object
pub fn internal_ref(value: &Value) -> Option<&str> {
    value
        .as_object()?
        .get("$ref")?
        .as_str()
        .filter(|r| r.starts_with('#'))
}

/// Look up an internal reference such as `#/components/schemas/Pet`
pub fn lookup<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    root.pointer(pointer)
}

/// A value with its reference chain followed
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub value: &'a Value,
    /// First reference of the chain, if any
    pub via: Option<&'a str>,
}

/// Follow `$ref` chains until a non-reference value is reached
pub fn resolve<'a>(root: &'a Value, value: &'a Value) -> Option<Resolved<'a>> {
    let mut current = value;
    let mut via = None;

    for _ in 0..MAX_REF_HOPS {
        match internal_ref(current) {
            Some(reference) => {
                via.get_or_insert(reference);
                current = lookup(root, reference)?;
            }
            None => return Some(Resolved { value: current, via }),
        }
    }
    None
}

/// Component name for a reference to a named schema
pub fn schema_name(reference: &str) -> Option<&str> {
    let name = reference
        .strip_prefix("#/components/schemas/")
        .or_else(|| reference.strip_prefix("#/definitions/"))?;
    (!name.is_empty() && !name.contains('/')).then_some(name)
}

/// A reference problem found while validating a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefProblem {
    Unresolved(String),
    Loop(String),
}

impl std::fmt::Display for RefProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefProblem::Unresolved(r) => write!(f, "unresolved reference {}", r),
            RefProblem::Loop(r) => write!(f, "reference loop at {}", r),
        }
    }
}

/// Check that every internal reference resolves to a concrete value.
/// Returns the number of external references left in place.
pub fn validate(root: &Value) -> Result<usize, RefProblem> {
    let mut external = 0;
    let mut stack = vec![root];

    while let Some(value) = stack.pop() {
        match value {
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    if reference.starts_with('#') {
                        if lookup(root, reference).is_none() {
                            return Err(RefProblem::Unresolved(reference.to_string()));
                        }
                        if resolve(root, value).is_none() {
                            return Err(RefProblem::Loop(reference.to_string()));
                        }
                    } else {
                        tracing::debug!("Leaving external reference {}", reference);
                        external += 1;
                    }
                }
                stack.extend(map.values());
            }
            Value::Array(items) => stack.extend(items),
            _ => {}
        }
    }

    Ok(external)
}

enum Step<'a> {
    Visit(&'a Value),
    Array(usize),
    Object(Vec<String>),
}

/// Inline every internal reference below `value`, cycle-safe.
///
/// `origin` is the pointer `value` was reached through; it counts as already
/// expanded so a self-reference collapses to the marker immediately.
pub fn inline(root: &Value, value: &Value, origin: Option<&str>) -> Value {
    let mut seen: HashSet<&str> = origin.into_iter().collect();
    let mut steps = vec![Step::Visit(value)];
    let mut out: Vec<Value> = Vec::new();

    while let Some(step) = steps.pop() {
        match step {
            Step::Visit(v) => {
                if let Some(reference) = internal_ref(v) {
                    if !seen.insert(reference) {
                        out.push(circular_marker(reference));
                        continue;
                    }
                    match lookup(root, reference) {
                        Some(target) => steps.push(Step::Visit(target)),
                        None => out.push(v.clone()),
                    }
                    continue;
                }

                match v {
                    Value::Object(map) => {
                        steps.push(Step::Object(map.keys().cloned().collect()));
                        steps.extend(map.values().rev().map(Step::Visit));
                    }
                    Value::Array(items) => {
                        steps.push(Step::Array(items.len()));
                        steps.extend(items.iter().rev().map(Step::Visit));
                    }
                    scalar => out.push(scalar.clone()),
                }
            }
            Step::Array(len) => {
                let items = out.split_off(out.len() - len);
                out.push(Value::Array(items));
            }
            Step::Object(keys) => {
                let values = out.split_off(out.len() - keys.len());
                let map: Map<String, Value> = keys.into_iter().zip(values).collect();
                out.push(Value::Object(map));
            }
        }
    }

    out.pop().unwrap_or(Value::Null)
}

pub fn circular_marker(reference: &str) -> Value {
    Value::String(format!("[Circular: {}]", reference))
}

/// SHA-256 (hex) of a serialized schema body
pub fn structural_hash(serialized: &str) -> String {
    let digest = Sha256::digest(serialized.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
