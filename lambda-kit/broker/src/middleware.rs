//! Broker middlewares.
//!
//! A middleware wraps every action handler registered on the broker and can hook into the
//! broker lifecycle. Middlewares are applied in the order they are configured: the first one is
//! the outermost wrapper, so it sees each call first.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};

use async_trait::async_trait;

use crate::{service::ActionHandler, BrokerError};

#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    /// Wrap the handler of `action`. The default leaves it untouched.
    fn wrap_action(&self, action: &str, next: ActionHandler) -> ActionHandler {
        let _ = action;
        next
    }

    async fn started(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn stopped(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}

/// Wrap `handler` with `middlewares`, first middleware outermost.
pub(crate) fn compose(
    action: &str,
    handler: ActionHandler,
    middlewares: &[Arc<dyn Middleware>],
) -> ActionHandler {
    middlewares
        .iter()
        .rev()
        .fold(handler, |next, mw| mw.wrap_action(action, next))
}

/// Built-in call tracking, enabled by `internalMiddlewares`.
#[derive(Debug, Default)]
pub struct CallTracker {
    in_flight: Arc<AtomicUsize>,
}

impl CallTracker {
    pub const NAME: &'static str = "$tracking";

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Middleware for CallTracker {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn wrap_action(&self, action: &str, next: ActionHandler) -> ActionHandler {
        let in_flight = Arc::clone(&self.in_flight);
        let action = action.to_string();
        Arc::new(move |ctx| {
            let next = Arc::clone(&next);
            let in_flight = Arc::clone(&in_flight);
            let action = action.clone();
            Box::pin(async move {
                let cur = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                let started = Instant::now();
                let res = next(ctx).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                tracing::debug!(
                    action = %action,
                    in_flight = cur,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    ok = res.is_ok(),
                    "tracked action call"
                );
                res
            })
        })
    }
}
