// Raise pipeline
// Builds a context for a raised object and hands it to the throw hook

use std::any::{type_name, Any};
use std::error::Error as StdError;
use std::fmt;

use sling_error::SlingError;
use tracing::debug;

use crate::config;
use crate::context::{Carrier, Context};
use crate::hooks;
use crate::payload::{Bindings, Object};
use crate::raised::Raised;
use crate::stack::StackTrace;

/// A raise under construction.
///
/// ```ignore
/// let user: User = Raise::value(json!({"code": 404}))
///     .message("user not found")
///     .bindings(bindings!(id))
///     .raise()?;
/// ```
#[derive(Debug)]
pub struct Raise {
    object: Object,
    message: Option<String>,
    bindings: Option<Bindings>,
}

impl Raise {
    pub fn new(object: impl Into<Object>) -> Self {
        Raise {
            object: object.into(),
            message: None,
            bindings: None,
        }
    }

    /// Raise an arbitrary value
    pub fn value<T: Any + fmt::Debug + Send + Sync>(value: T) -> Self {
        Self::new(Object::value(value))
    }

    /// Raise a native error
    pub fn error<E: StdError + Send + Sync + 'static>(error: E) -> Self {
        Self::new(Object::error(error))
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach a snapshot of local values. Ignored for native errors.
    pub fn bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = Some(bindings);
        self
    }

    /// Build the context for this raise without raising it.
    pub fn context(self) -> Context {
        let config = config::get();
        let Raise {
            object,
            message,
            bindings,
        } = self;

        let cause = hooks::current_context()
            .and_then(|handled| handled.wrapper)
            .filter(|wrapper| object.as_error().map_or(true, |raised| !raised.ptr_eq(wrapper)));

        let (message, bindings) = match &object {
            Object::Error(raised) => (message.or_else(|| Some(raised.to_string())), None),
            Object::Value(_) => (
                Some(message.unwrap_or_else(|| config.default_message.clone())),
                Some(bindings.unwrap_or_default()),
            ),
        };

        Context {
            object,
            message,
            cause,
            stack_trace: StackTrace::capture(config.stack_traces),
            bindings,
            wrapper: None,
        }
    }

    /// Raise through the active throw hook.
    ///
    /// Evaluates to `Ok` only when a hook override returns a value instead
    /// of raising.
    pub fn raise<T: Any>(self) -> Result<T, Raised> {
        throw_context(self.context())
    }
}

/// Raise `object` through the active throw hook.
pub fn raise<T: Any>(object: impl Into<Object>) -> Result<T, Raised> {
    Raise::new(object).raise()
}

/// Raise a native error through the active throw hook.
pub fn raise_error<T: Any, E: StdError + Send + Sync + 'static>(error: E) -> Result<T, Raised> {
    Raise::error(error).raise()
}

/// Propagate the error being handled, unchanged.
///
/// Only meaningful inside a handler body; elsewhere it raises
/// [`SlingError::NoActiveHandler`].
pub fn rethrow<T>() -> Result<T, Raised> {
    match hooks::current_context().and_then(|handled| handled.wrapper) {
        Some(wrapper) => Err(wrapper),
        None => Err(SlingError::NoActiveHandler.into()),
    }
}

/// Default throw behavior: errors propagate as themselves, anything else
/// inside a [`Carrier`].
pub fn native_raise(context: Context) -> Raised {
    match &context.object {
        Object::Error(raised) => {
            debug!(error = %raised, "raising native error");
            raised.clone()
        }
        Object::Value(payload) => {
            debug!(
                payload = payload.repr(),
                type_name = payload.type_name(),
                "raising payload in carrier"
            );
            Raised::new(Carrier::new(context, &config::get().default_message))
        }
    }
}

/// Pass a built context through the throw hook.
pub(crate) fn throw_context<T: Any>(context: Context) -> Result<T, Raised> {
    match hooks::apply_throw_hook(context) {
        Err(raised) => Err(raised),
        Ok(value) => match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(_) => Err(SlingError::ReturnType {
                expected: type_name::<T>(),
            }
            .into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{enter_handler, with_throw_hook};
    use crate::payload::Payload;

    #[derive(Debug, thiserror::Error)]
    #[error("quota exceeded")]
    struct Quota;

    #[test]
    fn test_value_raise_builds_carrier() {
        let err = raise::<()>(Object::value("boom")).unwrap_err();
        let carrier = err.downcast_ref::<Carrier>().unwrap();
        assert_eq!(carrier.message(), "object raised: \"boom\"");
        assert_eq!(carrier.context().message.as_deref(), Some("object raised"));
        assert!(carrier.bindings().unwrap().is_empty());
        assert_eq!(carrier.object().downcast_ref::<&str>(), Some(&"boom"));
    }

    #[test]
    fn test_default_raise_records_stack_trace() {
        let context = Raise::value("boom").context();
        assert!(context.stack_trace.is_captured());
        assert!(!context.stack_trace.frames().is_empty());
    }

    #[test]
    fn test_error_raise_is_not_wrapped() {
        let err = raise_error::<(), _>(Quota).unwrap_err();
        assert!(err.is::<Quota>());
        assert!(!err.is_carrier());
    }

    #[test]
    fn test_error_context_has_no_bindings() {
        let context = Raise::error(Quota).bindings(Bindings::new().with("x", 1)).context();
        assert!(context.bindings.is_none());
        assert_eq!(context.message.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn test_raising_a_carrier_does_not_double_wrap() {
        let first = raise::<()>(Object::value(42u64)).unwrap_err();
        let second = raise::<()>(first.clone()).unwrap_err();
        let carrier = second.downcast_ref::<Carrier>().unwrap();
        assert!(!carrier.object().is_error());
        assert_eq!(carrier.object().downcast_ref::<u64>(), Some(&42));
    }

    #[test]
    fn test_cause_is_wrapper_of_handled_context() {
        let wrapper = Raised::new(Quota);
        let handled = Context::new(wrapper.clone()).with_wrapper(wrapper.clone());
        let _scope = enter_handler(handled);

        let context = Raise::value("retry failed").context();
        assert!(context.cause.unwrap().ptr_eq(&wrapper));

        assert!(rethrow::<()>().unwrap_err().ptr_eq(&wrapper));
    }

    #[test]
    fn test_rethrow_outside_handler() {
        let err = rethrow::<()>().unwrap_err();
        assert_eq!(err.downcast_ref::<SlingError>(), Some(&SlingError::NoActiveHandler));
    }

    #[test]
    fn test_hook_value_becomes_result() {
        let value: i32 = with_throw_hook(|_| Ok(Box::new(7i32) as Box<dyn Any>), || raise(Payload::new("ignored"))).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_hook_value_of_wrong_type() {
        let err = with_throw_hook(|_| Ok(Box::new("text") as Box<dyn Any>), || raise::<i32>(Payload::new(1))).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SlingError>(),
            Some(SlingError::ReturnType { .. })
        ));
    }
}
