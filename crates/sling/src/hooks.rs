// Throw and catch hooks
//
// Two dynamically scoped hook slots, plus the stack of contexts currently
// being handled. All three live in thread-local storage: an override
// installed on one thread is never seen by another, and every install is
// undone by a guard on every way out of its scope, unwinding included.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::context::Context;
use crate::payload::Object;
use crate::raised::Raised;

/// What a throw hook produced: a native error to propagate, or a value
/// that `raise` evaluates to instead.
pub type ThrowOutcome = Result<Box<dyn Any>, Raised>;

/// Installed throw hook
pub type ThrowHook = Rc<dyn Fn(Context) -> ThrowOutcome>;

/// Installed catch hook
pub type CatchHook = Rc<dyn Fn(Context) -> Decision>;

/// Result of a catch hook.
pub enum Decision {
    /// Evaluate clauses against this (possibly modified) context
    Handle(Context),
    /// Skip all clauses; the handler evaluates to this value
    Return(Box<dyn Any>),
    /// Skip all clauses; raise a new object through the raise pipeline
    Throw {
        object: Object,
        message: Option<String>,
    },
    /// Skip all clauses; propagate `context.wrapper`, falling back to the
    /// caught error when the hook cleared it
    Rethrow(Context),
}

impl Decision {
    /// Return-value directive
    pub fn return_value<T: Any>(value: T) -> Self {
        Decision::Return(Box::new(value))
    }

    /// Throw directive
    pub fn throw(object: impl Into<Object>) -> Self {
        Decision::Throw {
            object: object.into(),
            message: None,
        }
    }
}

impl std::fmt::Debug for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Handle(context) => f.debug_tuple("Handle").field(context).finish(),
            Decision::Return(_) => f.write_str("Return(..)"),
            Decision::Throw { object, message } => f
                .debug_struct("Throw")
                .field("object", object)
                .field("message", message)
                .finish(),
            Decision::Rethrow(context) => f.debug_tuple("Rethrow").field(context).finish(),
        }
    }
}

thread_local! {
    static THROW_HOOKS: RefCell<Vec<ThrowHook>> = RefCell::new(Vec::new());
    static CATCH_HOOKS: RefCell<Vec<CatchHook>> = RefCell::new(Vec::new());
    static HANDLING: RefCell<Vec<Context>> = RefCell::new(Vec::new());
}

/// Run `f` with `hook` as the throw hook for this thread.
pub fn with_throw_hook<H, F, R>(hook: H, f: F) -> R
where
    H: Fn(Context) -> ThrowOutcome + 'static,
    F: FnOnce() -> R,
{
    let _guard = ScopeGuard::push(&THROW_HOOKS, Rc::new(hook) as ThrowHook);
    f()
}

/// Run `f` with `hook` as the catch hook for this thread.
pub fn with_catch_hook<H, F, R>(hook: H, f: F) -> R
where
    H: Fn(Context) -> Decision + 'static,
    F: FnOnce() -> R,
{
    let _guard = ScopeGuard::push(&CATCH_HOOKS, Rc::new(hook) as CatchHook);
    f()
}

/// The innermost throw hook, if any override is active.
pub fn current_throw_hook() -> Option<ThrowHook> {
    THROW_HOOKS.with(|hooks| hooks.borrow().last().cloned())
}

/// The innermost catch hook, if any override is active.
pub fn current_catch_hook() -> Option<CatchHook> {
    CATCH_HOOKS.with(|hooks| hooks.borrow().last().cloned())
}

/// The context of the innermost handler body running on this thread.
pub fn current_context() -> Option<Context> {
    HANDLING.with(|stack| stack.borrow().last().cloned())
}

pub(crate) fn apply_throw_hook(context: Context) -> ThrowOutcome {
    // Cloned out before the call so the hook may install or raise freely.
    match current_throw_hook() {
        Some(hook) => hook(context),
        None => Err(crate::raise::native_raise(context)),
    }
}

pub(crate) fn apply_catch_hook(context: Context) -> Decision {
    match current_catch_hook() {
        Some(hook) => hook(context),
        None => Decision::Handle(context),
    }
}

/// Marks `context` as being handled for the lifetime of the returned guard.
pub(crate) fn enter_handler(context: Context) -> ScopeGuard<Context> {
    ScopeGuard::push(&HANDLING, context)
}

type Slot<T> = std::thread::LocalKey<RefCell<Vec<T>>>;

/// Pops the value it pushed when dropped.
pub(crate) struct ScopeGuard<T: 'static> {
    slot: &'static Slot<T>,
    depth: usize,
}

impl<T: 'static> ScopeGuard<T> {
    fn push(slot: &'static Slot<T>, value: T) -> Self {
        let depth = slot.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(value);
            stack.len()
        });
        ScopeGuard { slot, depth }
    }
}

impl<T: 'static> Drop for ScopeGuard<T> {
    fn drop(&mut self) {
        // Guards drop in reverse order of creation, so truncating to our own
        // depth also discards anything a misbehaving inner scope leaked.
        let popped = self.slot.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            let keep = (self.depth - 1).min(stack.len());
            stack.split_off(keep)
        });
        // Dropped outside the borrow: a payload's destructor may read the slot.
        drop(popped);
    }
}
