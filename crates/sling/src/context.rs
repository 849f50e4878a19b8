// Raise contexts and the carrier error
// A context describes one raise event; a carrier lets a non-error payload
// travel as a native error

use std::error::Error as StdError;
use std::fmt;

use serde_json::{json, Value};

use crate::payload::{Bindings, Object};
use crate::raised::Raised;
use crate::stack::StackTrace;

/// Everything known about one raise event.
#[derive(Clone, Debug)]
pub struct Context {
    /// The raised object, never a carrier
    pub object: Object,
    /// Descriptive message
    pub message: Option<String>,
    /// The error being handled when this raise happened
    pub cause: Option<Raised>,
    /// Call stack at the raise site
    pub stack_trace: StackTrace,
    /// Local values at the raise site; only for non-error objects
    pub bindings: Option<Bindings>,
    /// Outermost native error currently carrying this context
    pub wrapper: Option<Raised>,
}

impl Context {
    /// A bare context around `object`.
    pub fn new(object: impl Into<Object>) -> Self {
        Context {
            object: object.into(),
            message: None,
            cause: None,
            stack_trace: StackTrace::empty(),
            bindings: None,
            wrapper: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_cause(mut self, cause: Raised) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_stack_trace(mut self, stack_trace: StackTrace) -> Self {
        self.stack_trace = stack_trace;
        self
    }

    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = Some(bindings);
        self
    }

    pub fn with_wrapper(mut self, wrapper: Raised) -> Self {
        self.wrapper = Some(wrapper);
        self
    }

    /// Typed view of the object
    pub fn downcast_ref<T: std::any::Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    /// The structured context map
    pub fn to_json(&self) -> Value {
        let object = match &self.object {
            Object::Value(payload) => json!({
                "type": payload.type_name(),
                "repr": payload.repr(),
                "fields": payload.fields(),
            }),
            Object::Error(raised) => json!({
                "type": "error",
                "repr": format!("{:?}", raised),
                "display": raised.to_string(),
            }),
        };
        json!({
            "object": object,
            "message": self.message,
            "cause": self.cause.as_ref().map(|cause| cause.to_string()),
            "bindings": self.bindings.as_ref().map(Bindings::to_json),
            "stack_trace": self.stack_trace.frames(),
        })
    }
}

/// Native error wrapping a non-error payload and its context.
///
/// Code that never heard of handler chains can still downcast a [`Raised`]
/// to `Carrier` and read the message, cause, stack trace and context map.
pub struct Carrier {
    message: String,
    context: Context,
}

impl Carrier {
    /// Build a carrier for `context`. The message is the context message
    /// (or `default_message`) followed by the payload rendering.
    pub(crate) fn new(context: Context, default_message: &str) -> Self {
        let prefix = context.message.as_deref().unwrap_or(default_message);
        let message = format!("{}: {}", prefix, context.object.repr());
        let context = Context {
            wrapper: None,
            ..context
        };
        Carrier { message, context }
    }

    /// Full message, including the payload rendering
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn object(&self) -> &Object {
        &self.context.object
    }

    pub fn cause(&self) -> Option<&Raised> {
        self.context.cause.as_ref()
    }

    pub fn stack_trace(&self) -> &StackTrace {
        &self.context.stack_trace
    }

    pub fn bindings(&self) -> Option<&Bindings> {
        self.context.bindings.as_ref()
    }

    /// The carried context. Its `wrapper` is unset; the resolver fills it in.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Structured context map
    pub fn data(&self) -> Value {
        self.context.to_json()
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Carrier")
            .field("message", &self.message)
            .field("object", &self.context.object)
            .field("cause", &self.context.cause)
            .finish()
    }
}

impl StdError for Carrier {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.context.cause.as_ref().map(|cause| cause as &(dyn StdError + 'static))
    }
}
