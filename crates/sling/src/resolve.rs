// Cause-chain resolver
// Recovers the raise context from whatever error a handler actually observed

use std::error::Error as StdError;

use tracing::{trace, warn};

use crate::config;
use crate::context::{Carrier, Context};
use crate::raised::Raised;
use crate::stack::StackTrace;

/// Build the context for a caught error.
///
/// Walks `error`, its source, its source's source and so on. The first
/// [`Carrier`] found yields its context; otherwise a context is synthesized
/// around `error` itself. Either way `wrapper` is `error`, the outermost
/// link, so a handler can always rethrow exactly what it caught.
pub fn resolve_context(error: &Raised) -> Context {
    match find_carrier(error, config::get().max_cause_depth) {
        Some(carrier) => carrier.context().clone().with_wrapper(error.clone()),
        None => synthesize(error),
    }
}

/// First carrier along the cause chain of `error`, following at most
/// `max_depth` links.
pub fn find_carrier(error: &Raised, max_depth: usize) -> Option<&Carrier> {
    let mut link: Option<&(dyn StdError + 'static)> = Some(error.as_error());
    let mut depth = 0;
    while let Some(current) = link {
        if depth >= max_depth {
            warn!(max_depth, "cause chain exceeds depth cap, treating as foreign error");
            return None;
        }
        // A native handle inside the chain is looked through to what it wraps.
        let current = match current.downcast_ref::<Raised>() {
            Some(raised) => raised.as_error() as &(dyn StdError + 'static),
            None => current,
        };
        if let Some(carrier) = current.downcast_ref::<Carrier>() {
            trace!(depth, "found carrier in cause chain");
            return Some(carrier);
        }
        trace!(depth, error = %current, "skipping foreign link");
        link = current.source();
        depth += 1;
    }
    None
}

// A context for an error raised without going through `raise`.
fn synthesize(error: &Raised) -> Context {
    let cause = error
        .as_error()
        .source()
        .and_then(|source| source.downcast_ref::<Raised>())
        .cloned();
    Context {
        object: crate::payload::Object::Error(error.clone()),
        message: Some(error.to_string()),
        cause,
        stack_trace: StackTrace::empty(),
        bindings: None,
        wrapper: Some(error.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Object;
    use crate::raise::raise;
    use serde_json::json;
    use thiserror::Error;

    #[derive(Error, Debug)]
    #[error("request failed")]
    struct RequestFailed(#[source] Raised);

    #[derive(Error, Debug)]
    #[error("job failed")]
    struct JobFailed(#[source] RequestFailed);

    #[derive(Error, Debug)]
    #[error("permission denied")]
    struct Denied;

    #[test]
    fn test_direct_carrier() {
        let err = raise::<()>(Object::value(json!({"code": 404}))).unwrap_err();
        let context = resolve_context(&err);
        assert_eq!(context.object.get("code"), Some(&json!(404)));
        assert!(context.wrapper.unwrap().ptr_eq(&err));
        assert!(context.bindings.is_some());
    }

    #[test]
    fn test_carrier_under_two_foreign_layers() {
        let err = raise::<()>(Object::value("boom")).unwrap_err();
        let outer = Raised::new(JobFailed(RequestFailed(err)));
        let context = resolve_context(&outer);
        assert_eq!(context.object.downcast_ref::<&str>(), Some(&"boom"));
        // Wrapper is the outermost error, not the carrier.
        assert!(context.wrapper.unwrap().ptr_eq(&outer));
    }

    #[test]
    fn test_carrier_behind_anyhow_context() {
        let err = raise::<()>(Object::value(7i64)).unwrap_err();
        let wrapped = anyhow::Error::new(err).context("loading profile").context("handling request");
        let outer = Raised::from(wrapped);
        let context = resolve_context(&outer);
        assert_eq!(context.object.downcast_ref::<i64>(), Some(&7));
    }

    #[test]
    fn test_foreign_error_is_synthesized() {
        let err = Raised::new(Denied);
        let context = resolve_context(&err);
        assert!(context.object.is::<Denied>());
        assert_eq!(context.message.as_deref(), Some("permission denied"));
        assert!(context.bindings.is_none());
        assert!(context.cause.is_none());
        assert!(context.wrapper.unwrap().ptr_eq(&err));
    }

    #[test]
    fn test_synthesized_cause_recovers_native_handle() {
        let inner = Raised::new(Denied);
        let outer = Raised::new(RequestFailed(inner.clone()));
        let context = resolve_context(&outer);
        assert!(context.object.is::<RequestFailed>());
        assert!(context.cause.unwrap().ptr_eq(&inner));
    }

    #[test]
    fn test_depth_cap() {
        let err = raise::<()>(Object::value(1u8)).unwrap_err();
        let outer = Raised::new(JobFailed(RequestFailed(err)));
        assert!(find_carrier(&outer, 1).is_none());
        assert!(find_carrier(&outer, 3).is_some());
    }
}
