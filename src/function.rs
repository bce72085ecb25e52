//! The overload registry: a named, ordered collection of overloads with
//! candidate collection and dispatch.
//!
//! Dispatch order:
//! 1. collect every overload whose candidate check passes, in registration
//!    order;
//! 2. zero candidates is an error listing every registered signature;
//! 3. with exactly two candidates of which exactly one is raw-argument,
//!    the raw one yields (it matches anything, so a typed match wins);
//! 4. more than one survivor is an ambiguity error listing the survivors;
//! 5. the sole survivor runs.

use std::cell::RefCell;
use std::rc::Rc;

use crate::call::CallContext;
use crate::engine::Engine;
use crate::error::NativeError;
use crate::overload::{IntoOverload, Overload};
use crate::value::Value;

/// Generic candidate selection, shared by function and constructor
/// registries.
pub(crate) fn select_candidate<E>(
    name: &str,
    entries: &[Rc<E>],
    engine: &Engine,
    args: &[Value],
    can: impl Fn(&E, &Engine, &[Value]) -> bool,
    is_raw: impl Fn(&E) -> bool,
    format: impl Fn(&E) -> String,
) -> Result<Rc<E>, NativeError> {
    let mut candidates: Vec<&Rc<E>> =
        entries.iter().filter(|e| can(e, engine, args)).collect();

    if candidates.is_empty() {
        return Err(NativeError::NoMatchingOverload {
            name: name.to_string(),
            overloads: entries.iter().map(|e| format(e)).collect(),
        });
    }

    // A raw-argument overload matches anything, so when it ties with one
    // typed match the typed match wins. Only the two-candidate case; wider
    // ties stay ambiguous, raw candidate included.
    if candidates.len() == 2 {
        let raws = [is_raw(candidates[0]), is_raw(candidates[1])];
        if raws[0] != raws[1] {
            candidates.retain(|e| !is_raw(e));
        }
    }

    if candidates.len() > 1 {
        return Err(NativeError::AmbiguousOverload {
            name: name.to_string(),
            candidates: candidates.iter().map(|e| format(e)).collect(),
        });
    }

    Ok(Rc::clone(candidates[0]))
}

struct Registry {
    name: String,
    overloads: RefCell<Vec<Rc<Overload>>>,
}

/// A named native endpoint holding one or more overloads.
///
/// Cloning is cheap and aliases the same registry, so an endpoint can sit
/// in several maps (and inside its own trampoline) while its overloads
/// exist exactly once.
#[derive(Clone)]
pub struct NativeFunction {
    inner: Rc<Registry>,
}

impl NativeFunction {
    pub fn new(name: impl Into<String>) -> Self {
        NativeFunction {
            inner: Rc::new(Registry {
                name: name.into(),
                overloads: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Register a typed overload. Builder-style; chains.
    pub fn overload<Args, Ret>(self, f: impl IntoOverload<Args, Ret>) -> Self {
        self.push(f.into_overload());
        self
    }

    /// Register a raw-argument overload. Builder-style; chains.
    pub fn raw_overload<F>(self, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<Value, NativeError> + 'static,
    {
        self.push(Overload::raw(f));
        self
    }

    pub(crate) fn push(&self, overload: Overload) {
        self.inner.overloads.borrow_mut().push(Rc::new(overload));
    }

    pub fn overload_count(&self) -> usize {
        self.inner.overloads.borrow().len()
    }

    /// Formatted signature of every registered overload, in registration
    /// order.
    pub fn signatures(&self) -> Vec<String> {
        self.inner
            .overloads
            .borrow()
            .iter()
            .map(|o| o.signature().format())
            .collect()
    }

    /// Would any overload accept this argument list?
    pub fn can_invoke(&self, engine: &Engine, args: &[Value]) -> bool {
        self.inner
            .overloads
            .borrow()
            .iter()
            .any(|o| o.can_invoke(engine, args))
    }

    /// Dispatch and run. The selected entry is cloned out of the registry
    /// before invocation, so a callable registering more overloads on the
    /// same endpoint mid-call cannot corrupt the scan.
    pub fn invoke(&self, ctx: &mut CallContext<'_>) -> Result<Value, NativeError> {
        let selected = {
            let overloads = self.inner.overloads.borrow();
            select_candidate(
                &self.inner.name,
                &overloads,
                ctx.engine(),
                ctx.args(),
                |o, engine, args| o.can_invoke(engine, args),
                |o| o.is_raw_args(),
                |o| o.signature().format(),
            )?
        };
        selected.invoke(ctx)
    }
}
