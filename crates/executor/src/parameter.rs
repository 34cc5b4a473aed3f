//! Positional statement parameters

use strata_remote_core::{Error, ParamMeta, Result, Value};

/// One `?` placeholder of a prepared statement.
///
/// Created unbound by the initial prepare. Re-preparation keeps the
/// parameter and its bound value.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    index: usize,
    meta: ParamMeta,
    value: Option<Value>,
}

impl Parameter {
    /// An unbound parameter at 0-based `index`.
    pub fn new(index: usize, meta: ParamMeta) -> Self {
        Parameter {
            index,
            meta,
            value: None,
        }
    }

    /// 0-based position.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Declared type, precision, scale and nullability.
    pub fn meta(&self) -> &ParamMeta {
        &self.meta
    }

    /// Bind `value`, replacing any earlier binding.
    pub fn set_value(&mut self, value: Value) {
        self.value = Some(value);
    }

    /// The bound value, if any.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Returns true once a value is bound.
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Fail with a usage error unless a value is bound.
    pub fn check_set(&self) -> Result<()> {
        if self.value.is_none() {
            return Err(Error::ParameterNotSet {
                position: self.index + 1,
            });
        }
        Ok(())
    }

    /// Release the bound value.
    pub fn clear(&mut self) {
        self.value = None;
    }
}
