//! ---
//! strata_section: "03-persistence-logging"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Structured logging core: events, enrichment, sinks, routing."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
//! Correlation ids scoped to a logical unit of work.
//!
//! Two scopes exist. Async work uses [`CorrelationContext::scope`], backed by
//! a tokio task-local, so tasks multiplexed on one worker thread never see
//! each other's id. Synchronous work on a dedicated thread uses
//! [`CorrelationContext::enter`], backed by a thread-local and restored when
//! the returned guard drops. The task-local scope wins when both are set.
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

tokio::task_local! {
    static TASK_CORRELATION: CorrelationId;
}

thread_local! {
    static THREAD_CORRELATION: RefCell<Option<CorrelationId>> = const { RefCell::new(None) };
}

/// Identifier threading together the events of one request or unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Borrow the id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Entry points for setting and reading the current correlation id.
pub struct CorrelationContext;

impl CorrelationContext {
    /// The id of the innermost active scope, if any.
    pub fn current() -> Option<CorrelationId> {
        TASK_CORRELATION
            .try_with(|id| id.clone())
            .ok()
            .or_else(|| THREAD_CORRELATION.with(|slot| slot.borrow().clone()))
    }

    /// Run `future` with `id` as the current correlation id.
    pub async fn scope<F>(id: CorrelationId, future: F) -> F::Output
    where
        F: Future,
    {
        TASK_CORRELATION.scope(id, future).await
    }

    /// Set `id` for the current thread until the guard drops.
    ///
    /// Do not hold the guard across `.await` points; use [`Self::scope`] in
    /// async code instead. The guard is `!Send` to enforce this.
    pub fn enter(id: CorrelationId) -> CorrelationGuard {
        let previous = THREAD_CORRELATION.with(|slot| slot.replace(Some(id)));
        CorrelationGuard {
            previous,
            _not_send: PhantomData,
        }
    }

    /// Run `f` with `id` as the current thread's correlation id.
    pub fn sync_scope<R>(id: CorrelationId, f: impl FnOnce() -> R) -> R {
        let _guard = Self::enter(id);
        f()
    }
}

/// Restores the previous thread correlation id when dropped.
#[must_use = "the correlation id is cleared as soon as the guard is dropped"]
pub struct CorrelationGuard {
    previous: Option<CorrelationId>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for CorrelationGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        THREAD_CORRELATION.with(|slot| *slot.borrow_mut() = previous);
    }
}
