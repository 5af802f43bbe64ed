// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reference evaluator for Mongo-style filter documents.
//!
//! Semantics follow the document-store conventions the graph layer emits:
//!
//! - Top-level (and nested) `$and`, `$or`, `$nor` take arrays of sub-filters.
//! - Any other key is a dotted field path into the record.
//! - A field condition is either an operator document (every key starts with
//!   `$`) or a literal, which means `$eq`.
//! - Equality against an array field matches when any element is equal.
//! - Numbers compare numerically regardless of integer/float encoding.
//! - Ordering operators only compare number-with-number and string-with-string;
//!   mixed types never match.

use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::{Map, Value};

use crate::{StoreError, StoreResult};

/// Returns `true` when `record` satisfies `filter`.
///
/// `null` and `{}` match every record.
pub fn matches(record: &Value, filter: &Value) -> StoreResult<bool> {
    match filter {
        Value::Null => Ok(true),
        Value::Object(clauses) => matches_clauses(record, clauses),
        other => Err(StoreError::InvalidQuery(format!(
            "filter must be an object, got {other}"
        ))),
    }
}

fn matches_clauses(record: &Value, clauses: &Map<String, Value>) -> StoreResult<bool> {
    for (key, condition) in clauses {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in sub_filters(key, condition)? {
                    if !matches(record, sub)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for sub in sub_filters(key, condition)? {
                    if matches(record, sub)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for sub in sub_filters(key, condition)? {
                    if matches(record, sub)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            op if op.starts_with('$') => {
                return Err(StoreError::InvalidQuery(format!(
                    "unsupported top-level operator `{op}`"
                )))
            }
            path => matches_field(lookup(record, path), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_filters<'a>(op: &str, condition: &'a Value) -> StoreResult<&'a Vec<Value>> {
    condition
        .as_array()
        .ok_or_else(|| StoreError::InvalidQuery(format!("`{op}` expects an array")))
}

/// Resolve a dotted path (`context.population`) inside `record`.
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |current, segment| current.as_object()?.get(segment))
}

fn is_operator_doc(condition: &Value) -> bool {
    condition
        .as_object()
        .is_some_and(|map| !map.is_empty() && map.keys().all(|k| k.starts_with('$')))
}

fn matches_field(field: Option<&Value>, condition: &Value) -> StoreResult<bool> {
    let Some(ops) = condition.as_object().filter(|_| is_operator_doc(condition)) else {
        return Ok(eq_match(field, condition));
    };
    for (op, operand) in ops {
        let ok = match op.as_str() {
            "$eq" => eq_match(field, operand),
            "$ne" => !eq_match(field, operand),
            "$gt" => ordered(field, operand, |o| o == Ordering::Greater),
            "$gte" => ordered(field, operand, |o| o != Ordering::Less),
            "$lt" => ordered(field, operand, |o| o == Ordering::Less),
            "$lte" => ordered(field, operand, |o| o != Ordering::Greater),
            "$in" => in_match(field, op, operand)?,
            "$nin" => !in_match(field, op, operand)?,
            "$exists" => {
                let want = operand.as_bool().ok_or_else(|| {
                    StoreError::InvalidQuery("`$exists` expects a boolean".into())
                })?;
                field.is_some() == want
            }
            "$regex" => regex_match(field, operand, ops.get("$options"))?,
            "$options" => true,
            "$not" => !matches_field(field, operand)?,
            other => {
                return Err(StoreError::InvalidQuery(format!(
                    "unsupported operator `{other}`"
                )))
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Numeric-aware equality: `1` equals `1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

fn eq_match(field: Option<&Value>, operand: &Value) -> bool {
    match field {
        None => operand.is_null(),
        Some(value) => {
            values_equal(value, operand)
                || value
                    .as_array()
                    .is_some_and(|items| items.iter().any(|item| values_equal(item, operand)))
        }
    }
}

fn in_match(field: Option<&Value>, op: &str, operand: &Value) -> StoreResult<bool> {
    let candidates = operand
        .as_array()
        .ok_or_else(|| StoreError::InvalidQuery(format!("`{op}` expects an array")))?;
    Ok(candidates.iter().any(|candidate| eq_match(field, candidate)))
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn ordered(field: Option<&Value>, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let Some(value) = field else {
        return false;
    };
    let direct = compare(value, operand).is_some_and(&accept);
    direct
        || value.as_array().is_some_and(|items| {
            items
                .iter()
                .any(|item| compare(item, operand).is_some_and(&accept))
        })
}

fn regex_match(
    field: Option<&Value>,
    operand: &Value,
    options: Option<&Value>,
) -> StoreResult<bool> {
    let pattern = operand
        .as_str()
        .ok_or_else(|| StoreError::InvalidQuery("`$regex` expects a string".into()))?;
    let flags = options.and_then(Value::as_str).unwrap_or_default();
    let re = RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|err| StoreError::InvalidQuery(format!("bad `$regex`: {err}")))?;
    Ok(match field {
        Some(Value::String(s)) => re.is_match(s),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|s| re.is_match(s)),
        _ => false,
    })
}
