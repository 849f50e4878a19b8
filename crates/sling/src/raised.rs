// Native exception handle
// Shared, clonable wrapper around any std error travelling through `Result`

use std::any::{Any, TypeId};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use sling_error::SlingError;

use crate::context::Carrier;

/// Object-safe view of an error that can also be downcast through `Any`.
pub trait NativeError: StdError + Send + Sync + 'static {
    /// Returns this error as a `&dyn Any` to allow downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns this error as a plain std error trait object.
    fn as_std(&self) -> &(dyn StdError + Send + Sync + 'static);
}

impl<E: StdError + Send + Sync + 'static> NativeError for E {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_std(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }
}

/// A native exception in flight.
///
/// Cloning shares the underlying error, so the handle that reaches a handler
/// is the same object that was raised; compare with [`Raised::ptr_eq`].
#[derive(Clone)]
pub struct Raised {
    inner: Arc<dyn NativeError>,
}

impl Raised {
    /// Wrap an error. Wrapping an existing `Raised` returns it unchanged.
    pub fn new<E: StdError + Send + Sync + 'static>(error: E) -> Self {
        if let Some(raised) = (&error as &dyn Any).downcast_ref::<Raised>() {
            return raised.clone();
        }
        Raised {
            inner: Arc::new(error),
        }
    }

    /// Wrap an already boxed error, recovering `Raised` and `Carrier` values
    /// that were boxed on their way through foreign code.
    pub fn from_boxed(error: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        let error = match error.downcast::<Raised>() {
            Ok(raised) => return *raised,
            Err(error) => error,
        };
        match error.downcast::<Carrier>() {
            Ok(carrier) => Raised {
                inner: Arc::new(*carrier),
            },
            Err(error) => Raised {
                inner: Arc::new(Foreign::Boxed(error)),
            },
        }
    }

    /// Whether both handles refer to the same raised error.
    pub fn ptr_eq(&self, other: &Raised) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The wrapped error as a std error trait object.
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.inner.as_std()
    }

    /// Downcast the wrapped error to a concrete type.
    ///
    /// Errors that arrived boxed or as an `anyhow::Error` are type-erased;
    /// the lookup reaches into them as well.
    pub fn downcast_ref<E: StdError + Send + Sync + 'static>(&self) -> Option<&E> {
        if let Some(error) = self.inner.as_any().downcast_ref::<E>() {
            return Some(error);
        }
        self.inner
            .as_any()
            .downcast_ref::<Foreign>()
            .and_then(Foreign::downcast_ref::<E>)
    }

    /// Whether the wrapped error is of type `E`.
    pub fn is<E: StdError + Send + Sync + 'static>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }

    /// Whether the wrapped error is a carrier for a non-error payload.
    pub fn is_carrier(&self) -> bool {
        self.is::<Carrier>()
    }

    // Exact-type view of the wrapped error, no reaching into foreign boxes.
    pub(crate) fn downcast_any<T: Any>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    pub(crate) fn inner_type_id(&self) -> TypeId {
        Any::type_id(self.inner.as_any())
    }
}

impl fmt::Display for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.inner.as_std(), f)
    }
}

impl fmt::Debug for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.inner.as_std(), f)
    }
}

// Transparent: the chain continues with the wrapped error's own source.
impl StdError for Raised {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.as_std().source()
    }
}

impl From<SlingError> for Raised {
    fn from(err: SlingError) -> Self {
        Raised::new(err)
    }
}

impl From<anyhow::Error> for Raised {
    fn from(err: anyhow::Error) -> Self {
        // Only unwrap a bare error; `downcast` would also see through
        // `.context(..)` layers and drop them.
        let outermost = err.chain().next();
        if let Some(raised) = outermost.and_then(|e| e.downcast_ref::<Raised>()) {
            return raised.clone();
        }
        if outermost.map_or(false, |e| e.is::<Carrier>()) {
            match err.downcast::<Carrier>() {
                Ok(carrier) => return Raised::new(carrier),
                Err(err) => return Raised::new(Foreign::Anyhow(err)),
            }
        }
        Raised::new(Foreign::Anyhow(err))
    }
}

impl From<Box<dyn StdError + Send + Sync + 'static>> for Raised {
    fn from(err: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        Raised::from_boxed(err)
    }
}

/// An error of unknown type, boxed or held by `anyhow`. It shows up as its
/// own link in the cause chain so the erased error is still visited by the
/// resolver.
enum Foreign {
    Boxed(Box<dyn StdError + Send + Sync + 'static>),
    Anyhow(anyhow::Error),
}

impl Foreign {
    fn erased(&self) -> &(dyn StdError + Send + Sync + 'static) {
        match self {
            Foreign::Boxed(error) => &**error,
            Foreign::Anyhow(error) => &**error,
        }
    }

    fn downcast_ref<E: StdError + Send + Sync + 'static>(&self) -> Option<&E> {
        match self {
            Foreign::Boxed(error) => error.downcast_ref::<E>(),
            // anyhow also matches the error under its own context layers
            Foreign::Anyhow(error) => error.downcast_ref::<E>(),
        }
    }
}

impl fmt::Display for Foreign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.erased(), f)
    }
}

impl fmt::Debug for Foreign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.erased(), f)
    }
}

impl StdError for Foreign {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.erased())
    }
}
