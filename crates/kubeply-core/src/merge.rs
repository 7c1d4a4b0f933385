//! Recursive manifest merging for overlay layers
//!
//! Merging is driven by the shape of the inputs at each node:
//! - Mappings: union of keys in first-seen order, each key merged across the
//!   inputs that define it. Keys whose merged value is null are dropped.
//! - Sequences: mapping elements with a `name` field are grouped by name and
//!   merged within their group; all other elements stay independent. Groups
//!   keep their first-seen order across the concatenated inputs.
//! - Anything else: the last input wins verbatim.
//!
//! Earlier inputs are the base, later inputs override. The operation is not
//! commutative.

use serde_yaml::{Mapping, Value};
use std::collections::HashMap;

use crate::manifest::Manifest;

/// Merge several same-named manifests, earliest first.
///
/// A single manifest is returned as an unmodified copy.
pub fn merge_manifests(manifests: &[Manifest]) -> Manifest {
    match manifests {
        [] => Manifest(Value::Null),
        [only] => only.clone(),
        _ => {
            let values: Vec<&Value> = manifests.iter().map(Manifest::inner).collect();
            Manifest(merge_values(&values))
        }
    }
}

/// Merge a sequence of YAML nodes, earliest first
pub fn merge_values(values: &[&Value]) -> Value {
    let Some(last) = values.last() else {
        return Value::Null;
    };
    if last.is_null() {
        return Value::Null;
    }

    let present: Vec<&Value> = values.iter().copied().filter(|v| !v.is_null()).collect();

    if present.iter().all(|v| v.is_mapping()) {
        Value::Mapping(merge_mappings(&present))
    } else if present.iter().all(|v| v.is_sequence()) {
        Value::Sequence(merge_sequences(&present))
    } else {
        (*last).clone()
    }
}

fn merge_mappings(values: &[&Value]) -> Mapping {
    let maps: Vec<&Mapping> = values.iter().filter_map(|v| v.as_mapping()).collect();

    let mut keys: Vec<&Value> = Vec::new();
    for map in &maps {
        for key in map.keys() {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }

    let mut result = Mapping::new();
    for key in keys {
        let defined: Vec<&Value> = maps.iter().filter_map(|map| map.get(key)).collect();
        let merged = merge_values(&defined);
        if !merged.is_null() {
            result.insert(key.clone(), merged);
        }
    }
    result
}

fn merge_sequences(values: &[&Value]) -> Vec<Value> {
    let mut groups: Vec<Vec<&Value>> = Vec::new();
    let mut named: HashMap<&Value, usize> = HashMap::new();

    for element in values
        .iter()
        .filter_map(|v| v.as_sequence())
        .flat_map(|seq| seq.iter())
    {
        match element.as_mapping().and_then(|map| map.get("name")) {
            Some(name) => match named.get(name) {
                Some(&index) => groups[index].push(element),
                None => {
                    named.insert(name, groups.len());
                    groups.push(vec![element]);
                }
            },
            None => groups.push(vec![element]),
        }
    }

    groups.iter().map(|group| merge_values(group)).collect()
}
