// Handler chains and the catch dispatcher
//
// A handler is an ordered list of catch clauses plus an optional finally
// block. When the guarded body fails, the caught error is resolved to a
// context, passed through the catch hook, and the first clause whose
// selector accepts the object runs.

use std::any::{type_name, Any};
use std::error::Error as StdError;

use serde_json::Value;
use sling_error::{Result as SlingResult, SlingError};
use tracing::debug;

use crate::context::Context;
use crate::hooks::{self, Decision};
use crate::payload::Object;
use crate::raise::{rethrow, Raise};
use crate::raised::Raised;
use crate::resolve::resolve_context;
use crate::selector::{Selector, TypeRegistry};

type Body<'a, T> = Box<dyn FnOnce(&Context) -> Result<T, Raised> + 'a>;
type FinallyBody<'a> = Box<dyn FnOnce() + 'a>;

/// A selector and the body that runs when it matches.
///
/// The body receives the full context; the caught object is
/// `context.object`.
pub struct Clause<'a, T> {
    selector: Selector,
    body: Body<'a, T>,
}

impl<'a, T> Clause<'a, T> {
    pub fn new(selector: Selector, body: impl FnOnce(&Context) -> Result<T, Raised> + 'a) -> Self {
        Clause {
            selector,
            body: Box::new(body),
        }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }
}

/// One element of a raw clause list.
pub enum Part<'a, T> {
    Catch(Clause<'a, T>),
    Finally(FinallyBody<'a>),
}

impl<'a, T> Part<'a, T> {
    pub fn catch(selector: Selector, body: impl FnOnce(&Context) -> Result<T, Raised> + 'a) -> Self {
        Part::Catch(Clause::new(selector, body))
    }

    pub fn finally(body: impl FnOnce() + 'a) -> Self {
        Part::Finally(Box::new(body))
    }
}

/// A validated handler chain.
pub struct Handler<'a, T> {
    clauses: Vec<Clause<'a, T>>,
    finally: Option<FinallyBody<'a>>,
}

impl<'a, T: Any> Handler<'a, T> {
    pub fn builder() -> HandlerBuilder<'a, T> {
        HandlerBuilder::new()
    }

    /// Validate a raw clause list: catch clauses, then at most one finally
    /// block, which must come last.
    pub fn from_parts(parts: Vec<Part<'a, T>>) -> SlingResult<Self> {
        let mut clauses = Vec::new();
        let mut finally = None;
        for (index, part) in parts.into_iter().enumerate() {
            match part {
                Part::Catch(_) if finally.is_some() => return Err(SlingError::ClauseAfterFinally(index)),
                Part::Catch(clause) => clauses.push(clause),
                Part::Finally(_) if finally.is_some() => return Err(SlingError::DuplicateFinally),
                Part::Finally(body) => finally = Some(body),
            }
        }
        Ok(Handler { clauses, finally })
    }

    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    /// Evaluate `body`, dispatching any error it raises to the clauses.
    ///
    /// The finally block runs on every way out, after dispatch.
    pub fn run(self, body: impl FnOnce() -> Result<T, Raised>) -> Result<T, Raised> {
        let Handler { clauses, finally } = self;
        let _finally = FinallyGuard(finally);
        match body() {
            Ok(value) => Ok(value),
            Err(error) => dispatch(clauses, error),
        }
    }
}

/// Evaluate `body` under `handler`.
pub fn handle<'a, T: Any>(
    body: impl FnOnce() -> Result<T, Raised>,
    handler: Handler<'a, T>,
) -> Result<T, Raised> {
    handler.run(body)
}

fn dispatch<T: Any>(clauses: Vec<Clause<'_, T>>, error: Raised) -> Result<T, Raised> {
    let mut context = match hooks::apply_catch_hook(resolve_context(&error)) {
        Decision::Handle(context) => context,
        Decision::Return(value) => {
            debug!("catch hook returned a value");
            return value.downcast::<T>().map(|value| *value).map_err(|_| {
                SlingError::ReturnType {
                    expected: type_name::<T>(),
                }
                .into()
            });
        }
        Decision::Throw { object, message } => {
            debug!(object = ?object, "catch hook raised a new object");
            let _scope = hooks::enter_handler(Context::new(error.clone()).with_wrapper(error));
            let raise = Raise::new(object);
            return match message {
                Some(message) => raise.message(message).raise(),
                None => raise.raise(),
            };
        }
        Decision::Rethrow(context) => {
            let wrapper = context.wrapper.unwrap_or(error);
            debug!(error = %wrapper, "catch hook rethrew");
            return Err(wrapper);
        }
    };
    if context.wrapper.is_none() {
        context.wrapper = Some(error.clone());
    }

    match clauses.into_iter().find(|clause| clause.selector.matches(&context.object)) {
        Some(clause) => {
            debug!(selector = ?clause.selector, "clause selected");
            let _scope = hooks::enter_handler(context.clone());
            (clause.body)(&context)
        }
        None => {
            debug!(object = ?context.object, "no clause matched, rethrowing");
            Err(context.wrapper.take().unwrap_or(error))
        }
    }
}

struct FinallyGuard<'a>(Option<FinallyBody<'a>>);

impl Drop for FinallyGuard<'_> {
    fn drop(&mut self) {
        if let Some(finally) = self.0.take() {
            finally();
        }
    }
}

/// Builds a [`Handler`], collecting setup errors until [`build`].
///
/// [`build`]: HandlerBuilder::build
pub struct HandlerBuilder<'a, T> {
    parts: Vec<Part<'a, T>>,
    error: Option<SlingError>,
}

impl<'a, T: Any> HandlerBuilder<'a, T> {
    pub fn new() -> Self {
        HandlerBuilder {
            parts: Vec::new(),
            error: None,
        }
    }

    /// Catch clause with an explicit selector
    pub fn catch(mut self, selector: Selector, body: impl FnOnce(&Context) -> Result<T, Raised> + 'a) -> Self {
        self.parts.push(Part::catch(selector, body));
        self
    }

    /// Catch objects of exact type `E`, binding them as `&E`
    pub fn catch_type<E: Any>(self, body: impl FnOnce(&E, &Context) -> Result<T, Raised> + 'a) -> Self {
        self.catch(Selector::of::<E>(), move |context| match context.downcast_ref::<E>() {
            Some(object) => body(object, context),
            None => rethrow(),
        })
    }

    /// Catch native errors of type `E`, also when they arrived boxed or
    /// inside an `anyhow::Error`
    pub fn catch_error<E: StdError + Send + Sync + 'static>(
        self,
        body: impl FnOnce(&E, &Context) -> Result<T, Raised> + 'a,
    ) -> Self {
        self.catch(Selector::error::<E>(), move |context| match context.object.downcast_error::<E>() {
            Some(error) => body(error, context),
            None => rethrow(),
        })
    }

    /// Catch keyed objects whose `key` equals `value`
    pub fn catch_key(
        self,
        key: impl Into<String>,
        value: impl Into<Value>,
        body: impl FnOnce(&Context) -> Result<T, Raised> + 'a,
    ) -> Self {
        self.catch(Selector::key_value(key, value), body)
    }

    /// Catch objects accepted by `predicate`
    pub fn catch_when(
        self,
        predicate: impl Fn(&Object) -> bool + 'static,
        body: impl FnOnce(&Context) -> Result<T, Raised> + 'a,
    ) -> Self {
        self.catch(Selector::when(predicate), body)
    }

    /// Catch clause whose selector is given in data form, see [`Selector::parse`]
    pub fn catch_data(
        mut self,
        data: &Value,
        registry: &TypeRegistry,
        body: impl FnOnce(&Context) -> Result<T, Raised> + 'a,
    ) -> Self {
        match Selector::parse(data, registry) {
            Ok(selector) => self.catch(selector, body),
            Err(err) => {
                self.error.get_or_insert(err);
                self
            }
        }
    }

    pub fn finally(mut self, body: impl FnOnce() + 'a) -> Self {
        self.parts.push(Part::finally(body));
        self
    }

    pub fn build(self) -> SlingResult<Handler<'a, T>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Handler::from_parts(self.parts)
    }
}

impl<'a, T: Any> Default for HandlerBuilder<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}
