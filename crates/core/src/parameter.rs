//! Parameters, their registry, and the timestamped values read through it.

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;

use crate::address::Address;
use crate::encoding::Encoding;
use crate::error::{CoreError, StorageError};
use crate::unit::Unit;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParameterKind {
    Scalar,
    Aggregated { child_count: usize, child_unit: Unit },
}

/// A single data location in the heating control device, or one slot of an
/// aggregated one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub id: String,
    pub name: String,
    pub unit: Unit,
    pub readonly: bool,
    pub kind: ParameterKind,
}

impl Parameter {
    pub fn scalar(id: impl Into<String>, name: impl Into<String>, unit: Unit, readonly: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit,
            readonly,
            kind: ParameterKind::Scalar,
        }
    }

    pub fn aggregated(
        id: impl Into<String>,
        name: impl Into<String>,
        child_unit: Unit,
        child_count: usize,
        readonly: bool,
    ) -> Self {
        let id = id.into();
        let name = name.into();
        Self {
            id,
            name,
            unit: Unit::array(child_unit.clone()),
            readonly,
            kind: ParameterKind::Aggregated {
                child_count,
                child_unit,
            },
        }
    }

    pub fn validate(&self, value: &Value) -> Result<(), CoreError> {
        self.unit.validate(value).map_err(CoreError::from)
    }

    /// The scalar child parameter at `index`, for an aggregated parameter.
    pub fn child(&self, index: usize) -> Option<Parameter> {
        let ParameterKind::Aggregated {
            child_count,
            child_unit,
        } = &self.kind
        else {
            return None;
        };
        if index >= *child_count {
            return None;
        }
        Some(Parameter::scalar(
            format!("{}.{}", self.id, index),
            format!("{}[{}]", self.name, index),
            child_unit.clone(),
            self.readonly,
        ))
    }
}

/// The value a [`Parameter`] held at a specific moment.
#[derive(Debug, Clone)]
pub struct ParameterReading {
    pub parameter: Parameter,
    pub value: Value,
    pub time: Instant,
}

impl ParameterReading {
    pub fn now(parameter: Parameter, value: Value) -> Self {
        Self {
            parameter,
            value,
            time: Instant::now(),
        }
    }
}

struct StorageEntry {
    parameter: Parameter,
    address: Address,
    encoding: Encoding,
}

/// Registry of parameters with their wire address and encoding, resolving dotted
/// `"parent.index"` ids to their computed child address.
#[derive(Default)]
pub struct ParameterStorage {
    entries: HashMap<String, StorageEntry>,
}

impl ParameterStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        parameter: Parameter,
        address: Address,
        encoding: Encoding,
    ) -> Result<(), StorageError> {
        if self.entries.contains_key(&parameter.id) {
            return Err(StorageError::DuplicateParameter(parameter.id));
        }
        self.entries.insert(
            parameter.id.clone(),
            StorageEntry {
                parameter,
                address,
                encoding,
            },
        );
        Ok(())
    }

    pub fn supported(&self) -> Vec<&Parameter> {
        self.entries.values().map(|e| &e.parameter).collect()
    }

    /// Resolves an id, routing dotted `"parent.index"` ids through child
    /// resolution.
    pub fn get(&self, id: &str) -> Result<(Parameter, Address, Encoding), CoreError> {
        if let Some((parent_id, index)) = split_child_id(id) {
            return self.resolve_child(parent_id, index);
        }
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| CoreError::UnknownParameter(id.to_string()))?;
        Ok((
            entry.parameter.clone(),
            entry.address,
            entry.encoding.clone(),
        ))
    }

    pub fn resolve_child(
        &self,
        parent_id: &str,
        index: usize,
    ) -> Result<(Parameter, Address, Encoding), CoreError> {
        let entry = self
            .entries
            .get(parent_id)
            .ok_or_else(|| CoreError::UnknownParameter(parent_id.to_string()))?;
        let ParameterKind::Aggregated { child_count, .. } = &entry.parameter.kind else {
            return Err(CoreError::UnknownParameter(format!("{parent_id}.{index}")));
        };
        if index >= *child_count {
            return Err(CoreError::ChildIndexOutOfRange {
                parent: parent_id.to_string(),
                index,
                count: *child_count,
            });
        }
        let Encoding::Array { member, .. } = &entry.encoding else {
            unreachable!("aggregated parameters are always backed by an Array encoding")
        };
        let child_parameter = entry
            .parameter
            .child(index)
            .expect("index already bounds-checked above");
        let child_address = entry.address.offset(index, member.size());
        Ok((child_parameter, child_address, (**member).clone()))
    }
}

/// Splits `"P.i"` into `("P", i)`. Returns `None` for ids without a dotted suffix,
/// or where the suffix is not a valid index.
fn split_child_id(id: &str) -> Option<(&str, usize)> {
    let (base, index) = id.split_once('.')?;
    let index: usize = index.parse().ok()?;
    Some((base, index))
}
