//! The synchronized in-process mirror of flag definitions.
//!
//! Readers (every typed evaluation) take the shared lock and never touch
//! the store; writers (the watcher and the initial seed) take the exclusive
//! lock. Single-document change events replace the whole map inside one
//! exclusive critical section, so a reader can never observe a partially
//! applied event.


use std::collections::HashMap;
use std::sync::PoisonError;
use std::sync::RwLock;

use mongodb::bson::Bson;

use crate::context::EvaluationContext;
use crate::flag::Definition;
use crate::resolution::Resolution;
use crate::resolution::ResolutionDetail;

/// Types a flag evaluation can resolve to.
pub trait FlagValue: Sized {
    /// Extracts the typed value, or `None` on a type mismatch.
    fn from_bson(value: Bson) -> Option<Self>;
}

impl FlagValue for bool {
    fn from_bson(value: Bson) -> Option<Self> {
        match value {
            Bson::Boolean(v) => Some(v),
            _ => None,
        }
    }
}

impl FlagValue for String {
    fn from_bson(value: Bson) -> Option<Self> {
        match value {
            Bson::String(v) => Some(v),
            _ => None,
        }
    }
}

impl FlagValue for i64 {
    fn from_bson(value: Bson) -> Option<Self> {
        match value {
            Bson::Int64(v) => Some(v),
            Bson::Int32(v) => Some(v.into()),
            _ => None,
        }
    }
}

impl FlagValue for f64 {
    fn from_bson(value: Bson) -> Option<Self> {
        match value {
            Bson::Double(v) => Some(v),
            _ => None,
        }
    }
}

/// Object evaluation: any stored value passes through unchanged.
impl FlagValue for Bson {
    fn from_bson(value: Bson) -> Option<Self> {
        Some(value)
    }
}

/// Thread-safe map from flag name to definition. No TTL; entries live until
/// replaced, removed, or cleared by the watcher.
#[derive(Debug, Default)]
pub struct FlagCache {
    flags: RwLock<HashMap<String, Definition>>,
}

impl FlagCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one definition.
    pub fn set(&self, flag_name: impl Into<String>, definition: Definition) {
        let mut flags = self.flags.write().unwrap_or_else(PoisonError::into_inner);
        flags.insert(flag_name.into(), definition);
    }

    /// Bulk insert/replace. Entries absent from `definitions` are kept.
    pub fn set_all(&self, definitions: HashMap<String, Definition>) {
        let mut flags = self.flags.write().unwrap_or_else(PoisonError::into_inner);
        flags.extend(definitions);
    }

    /// Swaps the entire contents in one exclusive critical section.
    pub fn replace_all(&self, definitions: HashMap<String, Definition>) {
        let mut flags = self.flags.write().unwrap_or_else(PoisonError::into_inner);
        *flags = definitions;
    }

    /// Removes one definition, if present.
    pub fn remove(&self, flag_name: &str) {
        let mut flags = self.flags.write().unwrap_or_else(PoisonError::into_inner);
        flags.remove(flag_name);
    }

    /// Removes every definition atomically.
    pub fn clear(&self) {
        let mut flags = self.flags.write().unwrap_or_else(PoisonError::into_inner);
        flags.clear();
    }

    pub fn len(&self) -> usize {
        let flags = self.flags.read().unwrap_or_else(PoisonError::into_inner);
        flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed evaluation facade. An unknown flag resolves to the caller's
    /// default with the `DEFAULT` reason; a value that does not fit `T`
    /// resolves to the default with `ERROR`/`TYPE_MISMATCH`.
    pub fn evaluate<T: FlagValue>(
        &self,
        ctx: &EvaluationContext,
        flag_name: &str,
        default_value: T,
    ) -> Resolution<T> {
        let flags = self.flags.read().unwrap_or_else(PoisonError::into_inner);
        let Some(definition) = flags.get(flag_name) else {
            return Resolution {
                value: default_value,
                detail: ResolutionDetail::flag_missing(),
            };
        };

        let (value, detail) = definition.evaluate(ctx);
        let element_type = value.element_type();
        match T::from_bson(value) {
            Some(value) => Resolution { value, detail },
            None => Resolution {
                value: default_value,
                detail: ResolutionDetail::type_mismatch(format!(
                    "expected {}, got {:?}",
                    std::any::type_name::<T>(),
                    element_type
                )),
            },
        }
    }
}
