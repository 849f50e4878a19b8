// Sling: raise any value, catch it by type, key or predicate
//
// Layered on ordinary `Result` propagation. A raised value that is not an
// error travels inside a `Carrier`; handlers recover its context from
// whatever error reaches them, however deeply third-party code wrapped it.

//! Raise arbitrary values and select handlers by flexible criteria.
//!
//! - [`raise`] / [`Raise`] / [`raise!`] build a [`Context`] for a payload and
//!   hand it to the throw hook, which by default converts it into a
//!   [`Raised`] error (wrapping non-errors in a [`Carrier`]).
//! - [`Handler`] runs a body and, on error, resolves the context through the
//!   cause chain ([`resolve_context`]), lets the catch hook decide, then
//!   picks the first clause whose [`Selector`] matches.
//! - [`with_throw_hook`] and [`with_catch_hook`] install thread-scoped
//!   overrides that are undone on every exit path.
//!
//! ```ignore
//! use serde_json::json;
//! use sling::{raise, Handler, Object};
//!
//! let code = Handler::builder()
//!     .catch_key("code", 404, |context| Ok(context.object.get("code").cloned()))
//!     .build()?
//!     .run(|| raise(Object::value(json!({"code": 404}))))?;
//! ```

// Re-export the error taxonomy for convenience
pub use sling_error::{self, ErrorCode, ErrorKind, ErrorMessage, SlingError};

// Module structure
mod macros;

pub mod config;
pub mod context;
pub mod handler;
pub mod hooks;
pub mod payload;
pub mod raise;
pub mod raised;
pub mod resolve;
pub mod selector;
pub mod stack;

// Public exports
pub use config::{SlingConfig, TraceCapture};
pub use context::{Carrier, Context};
pub use handler::{handle, Clause, Handler, HandlerBuilder, Part};
pub use hooks::{current_context, with_catch_hook, with_throw_hook, Decision, ThrowOutcome};
pub use payload::{Bindings, Object, Payload};
pub use raise::{native_raise, raise, raise_error, rethrow, Raise};
pub use raised::{NativeError, Raised};
pub use resolve::resolve_context;
pub use selector::{Selector, TypeRegistry};
pub use stack::{Frame, StackTrace};
