// Raised values
// Any-typed payloads, the object enum that distinguishes them from native
// errors, and binding snapshots

use std::any::{type_name, Any, TypeId};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::context::Carrier;
use crate::raised::Raised;

/// An arbitrary raised value.
///
/// Besides the value itself a payload keeps its `Debug` rendering (used in
/// messages) and, for keyed values, a structured JSON view that key/value
/// selectors test against.
#[derive(Clone)]
pub struct Payload {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    repr: Arc<str>,
    fields: Option<Arc<Value>>,
}

impl Payload {
    /// Wrap a value. A `serde_json::Value` payload is keyed automatically.
    pub fn new<T: Any + fmt::Debug + Send + Sync>(value: T) -> Self {
        let fields = (&value as &dyn Any)
            .downcast_ref::<Value>()
            .map(|json| Arc::new(json.clone()));
        Payload {
            repr: format!("{:?}", value).into(),
            type_name: type_name::<T>(),
            value: Arc::new(value),
            fields,
        }
    }

    /// Wrap a serializable value, keeping its serialized form as the
    /// structured view for key/value selectors.
    pub fn keyed<T: Any + Serialize + fmt::Debug + Send + Sync>(value: T) -> Self {
        let fields = serde_json::to_value(&value).ok().map(Arc::new);
        Payload {
            repr: format!("{:?}", value).into(),
            type_name: type_name::<T>(),
            value: Arc::new(value),
            fields,
        }
    }

    /// Whether the payload holds a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Look up `key` in the structured view, if the payload has one.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.as_deref()?.as_object()?.get(key)
    }

    /// The structured view of a keyed payload.
    pub fn fields(&self) -> Option<&Value> {
        self.fields.as_deref()
    }

    /// Printable rendering of the value.
    pub fn repr(&self) -> &str {
        &self.repr
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn ptr_eq(&self, other: &Payload) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    fn value_type_id(&self) -> TypeId {
        Any::type_id(&*self.value)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

/// The object carried by a raise event: either an arbitrary value or an
/// error that can travel natively on its own.
#[derive(Clone, Debug)]
pub enum Object {
    Value(Payload),
    Error(Raised),
}

impl Object {
    /// Wrap an arbitrary value. Native handles passed here are recognised
    /// and kept as errors rather than being boxed a second time.
    pub fn value<T: Any + fmt::Debug + Send + Sync>(value: T) -> Self {
        let any = &value as &dyn Any;
        if let Some(raised) = any.downcast_ref::<Raised>() {
            return Object::from(raised.clone());
        }
        if let Some(carrier) = any.downcast_ref::<Carrier>() {
            return carrier.object().clone();
        }
        if let Some(payload) = any.downcast_ref::<Payload>() {
            return Object::Value(payload.clone());
        }
        if let Some(object) = any.downcast_ref::<Object>() {
            return object.clone();
        }
        Object::Value(Payload::new(value))
    }

    /// Wrap a serializable value with a structured view.
    pub fn keyed<T: Any + Serialize + fmt::Debug + Send + Sync>(value: T) -> Self {
        Object::Value(Payload::keyed(value))
    }

    /// Wrap a native error.
    pub fn error<E: StdError + Send + Sync + 'static>(error: E) -> Self {
        Object::from(Raised::new(error))
    }

    /// Whether the object is exception-compatible.
    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }

    pub fn as_error(&self) -> Option<&Raised> {
        match self {
            Object::Error(raised) => Some(raised),
            Object::Value(_) => None,
        }
    }

    pub fn as_payload(&self) -> Option<&Payload> {
        match self {
            Object::Value(payload) => Some(payload),
            Object::Error(_) => None,
        }
    }

    /// Concrete type of the value, or of the error inside a native handle.
    pub fn type_id(&self) -> TypeId {
        match self {
            Object::Value(payload) => payload.value_type_id(),
            Object::Error(raised) => raised.inner_type_id(),
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id() == TypeId::of::<T>()
    }

    /// Exact-type view of the value, or of the error inside a native handle.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Object::Value(payload) => payload.downcast_ref::<T>(),
            Object::Error(raised) => raised.downcast_any::<T>(),
        }
    }

    /// The error of type `E`, also when it reached the handler boxed or
    /// inside an `anyhow::Error`.
    pub fn downcast_error<E: StdError + Send + Sync + 'static>(&self) -> Option<&E> {
        self.as_error()?.downcast_ref::<E>()
    }

    /// Key lookup on the structured view of a keyed value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_payload()?.get(key)
    }

    /// Printable rendering used in messages.
    pub fn repr(&self) -> String {
        match self {
            Object::Value(payload) => payload.repr().to_string(),
            Object::Error(raised) => format!("{:?}", raised),
        }
    }

    /// Whether both objects are the same raised value.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Value(a), Object::Value(b)) => a.ptr_eq(b),
            (Object::Error(a), Object::Error(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

// A carrier is never itself the object: unwrap to what it carries.
impl From<Raised> for Object {
    fn from(raised: Raised) -> Self {
        match raised.downcast_ref::<Carrier>() {
            Some(carrier) => carrier.context().object.clone(),
            None => Object::Error(raised),
        }
    }
}

impl From<Payload> for Object {
    fn from(payload: Payload) -> Self {
        Object::Value(payload)
    }
}

/// Snapshot of named local values at a raise site.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    entries: BTreeMap<String, Payload>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding, builder style
    pub fn with<T: Any + fmt::Debug + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<T: Any + fmt::Debug + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.entries.insert(name.into(), Payload::new(value));
    }

    pub fn get(&self, name: &str) -> Option<&Payload> {
        self.entries.get(name)
    }

    /// Typed lookup of a binding
    pub fn value<T: Any>(&self, name: &str) -> Option<&T> {
        self.entries.get(name)?.downcast_ref::<T>()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Payload)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name to rendering map, for structured output
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(name, value)| (name.clone(), Value::String(value.repr().to_string())))
                .collect(),
        )
    }
}
