//! Bounded pool of reusable render contexts.
//!
//! Contexts are expensive to initialize (the engine parses the full style
//! document and opens its datasources), so the pool creates them lazily up
//! to a fixed capacity and keeps them for the process lifetime. A fair
//! semaphore bounds concurrent use: callers past capacity suspend and
//! resume in arrival order, so sustained load cannot starve early waiters.
//!
//! [`PooledContext`] returns its context to the idle set on drop. That
//! makes release unconditional — a render failure travels back to the
//! caller while the context still goes back into rotation. A leaked
//! context would permanently shrink the pool, which is why the guard is
//! the only way to hold one.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

use crate::engine::RenderEngine;
use crate::error::EngineError;

/// Fixed-capacity pool of render contexts, all bound to one serialized
/// style document.
pub struct ContextPool<E: RenderEngine> {
    engine: E,
    document: String,
    width: u32,
    height: u32,
    capacity: usize,
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<E::Context>>,
    created: AtomicUsize,
}

impl<E: RenderEngine> ContextPool<E> {
    pub fn new(engine: E, document: String, capacity: usize, width: u32, height: u32) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        ContextPool {
            engine,
            document,
            width,
            height,
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            idle: Mutex::new(Vec::with_capacity(capacity)),
            created: AtomicUsize::new(0),
        }
    }

    /// Borrows a context, waiting in arrival order when all are in use.
    ///
    /// A context is initialized on demand if none is idle and the pool is
    /// below capacity. Initialization failure surfaces here and leaves the
    /// pool no smaller than before.
    pub async fn acquire(&self) -> Result<PooledContext<'_, E>, EngineError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("pool semaphore closed unexpectedly");

        let idle = self.idle.lock().expect("pool mutex poisoned").pop();
        let context = match idle {
            Some(context) => context,
            None => {
                let context = self
                    .engine
                    .create_context(&self.document, self.width, self.height)
                    .await?;
                let total = self.created.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(contexts = total, capacity = self.capacity, "initialized render context");
                context
            }
        };

        Ok(PooledContext {
            pool: self,
            context: Some(context),
            _permit: permit,
        })
    }

    /// Eagerly initializes every context the pool may hand out.
    ///
    /// Startup convenience: document and datasource problems surface here
    /// instead of on the first capacity-th request.
    pub async fn warm_up(&self) -> Result<(), EngineError> {
        let guards =
            futures::future::try_join_all((0..self.capacity).map(|_| self.acquire())).await?;
        info!(capacity = self.capacity, "render context pool warmed up");
        drop(guards);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Contexts not currently checked out.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Contexts initialized so far; never exceeds capacity.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// The serialized style document every context was initialized from.
    pub fn document(&self) -> &str {
        &self.document
    }
}

/// Exclusive borrow of one render context.
///
/// Dereferences to the engine context; dropping it returns the context to
/// the pool and wakes the oldest waiter.
pub struct PooledContext<'a, E: RenderEngine> {
    pool: &'a ContextPool<E>,
    context: Option<E::Context>,
    _permit: OwnedSemaphorePermit,
}

impl<E: RenderEngine> Deref for PooledContext<'_, E> {
    type Target = E::Context;

    fn deref(&self) -> &E::Context {
        self.context.as_ref().expect("context present until drop")
    }
}

impl<E: RenderEngine> DerefMut for PooledContext<'_, E> {
    fn deref_mut(&mut self) -> &mut E::Context {
        self.context.as_mut().expect("context present until drop")
    }
}

impl<E: RenderEngine> Drop for PooledContext<'_, E> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool
                .idle
                .lock()
                .expect("pool mutex poisoned")
                .push(context);
        }
        // The permit drops after this body, waking the oldest waiter only
        // once the context is back in the idle set.
    }
}
