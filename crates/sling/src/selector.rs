// Catch-clause selectors
// Decide whether a clause accepts the object of a caught context

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use sling_error::{Result, SlingError};
use tracing::trace;

use crate::payload::Object;

/// Test applied to a caught object.
#[derive(Clone)]
pub enum Selector {
    /// The object's concrete type is `id`
    Type { id: TypeId, name: &'static str },
    /// The object is a native error of a given type, wherever it is held
    Error {
        name: &'static str,
        test: fn(&Object) -> bool,
    },
    /// The object is keyed and `key` maps to `value`
    KeyValue { key: String, value: Value },
    /// Arbitrary predicate over the object
    Predicate(Rc<dyn Fn(&Object) -> bool>),
}

impl Selector {
    /// Matches objects whose concrete type is exactly `T`, values and
    /// native errors alike. An error that reached the handler boxed or inside
    /// an `anyhow::Error` has lost its type here; use [`Selector::error`].
    pub fn of<T: Any>() -> Self {
        Selector::Type {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Matches native errors of type `E`, including ones held in a
    /// `Box<dyn Error>` or an `anyhow::Error`.
    pub fn error<E: StdError + Send + Sync + 'static>() -> Self {
        Selector::Error {
            name: type_name::<E>(),
            test: |object| object.downcast_error::<E>().is_some(),
        }
    }

    /// Matches keyed objects whose `key` equals `value`.
    pub fn key_value(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Selector::KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Matches objects for which `predicate` holds.
    pub fn when(predicate: impl Fn(&Object) -> bool + 'static) -> Self {
        Selector::Predicate(Rc::new(predicate))
    }

    /// Matches values of type `T` for which `predicate` holds.
    pub fn when_value<T: Any>(predicate: impl Fn(&T) -> bool + 'static) -> Self {
        Selector::when(move |object| object.downcast_ref::<T>().map_or(false, &predicate))
    }

    /// Matches everything.
    pub fn any() -> Self {
        Selector::when(|_| true)
    }

    /// Key/value selector from a `[key, value]` pair.
    pub fn from_pair(pair: &[Value]) -> Result<Self> {
        match pair {
            [Value::String(key), value] => Ok(Selector::key_value(key.clone(), value.clone())),
            [key, _] => Err(SlingError::malformed_selector(format!("key must be a string, got {}", key))),
            _ => Err(SlingError::KeyValueArity(pair.len())),
        }
    }

    /// Selector from its data form: a type name registered in `registry`,
    /// or a `[key, value]` array.
    pub fn parse(data: &Value, registry: &TypeRegistry) -> Result<Self> {
        match data {
            Value::String(name) => registry.selector(name),
            Value::Array(pair) => Self::from_pair(pair),
            other => Err(SlingError::malformed_selector(other.to_string())),
        }
    }

    /// Whether `object` is accepted.
    pub fn matches(&self, object: &Object) -> bool {
        let matched = match self {
            Selector::Type { id, .. } => object.type_id() == *id,
            Selector::Error { test, .. } => test(object),
            Selector::KeyValue { key, value } => object.get(key) == Some(value),
            Selector::Predicate(predicate) => predicate(object),
        };
        trace!(selector = ?self, matched, "selector tested");
        matched
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Type { name, .. } => write!(f, "Type({})", name),
            Selector::Error { name, .. } => write!(f, "Error({})", name),
            Selector::KeyValue { key, value } => write!(f, "KeyValue({} = {})", key, value),
            Selector::Predicate(_) => write!(f, "Predicate"),
        }
    }
}

/// Names under which types can be referred to by data-driven selectors.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, Selector>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `name`
    pub fn register<T: Any>(&mut self, name: impl Into<String>) -> Result<()> {
        self.insert(name.into(), Selector::of::<T>())
    }

    /// Register the error type `E` under `name`; its selector also matches
    /// boxed and `anyhow` errors of that type.
    pub fn register_error<E: StdError + Send + Sync + 'static>(&mut self, name: impl Into<String>) -> Result<()> {
        self.insert(name.into(), Selector::error::<E>())
    }

    /// Register `T` under `name`, builder style
    pub fn with<T: Any>(mut self, name: impl Into<String>) -> Result<Self> {
        self.register::<T>(name)?;
        Ok(self)
    }

    /// Register the error type `E` under `name`, builder style
    pub fn with_error<E: StdError + Send + Sync + 'static>(mut self, name: impl Into<String>) -> Result<Self> {
        self.register_error::<E>(name)?;
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Type selector for a registered name
    pub fn selector(&self, name: &str) -> Result<Selector> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| SlingError::unresolved_type(name))
    }

    fn insert(&mut self, name: String, selector: Selector) -> Result<()> {
        if self.types.contains_key(&name) {
            return Err(SlingError::DuplicateTypeName(name));
        }
        self.types.insert(name, selector);
        Ok(())
    }
}
