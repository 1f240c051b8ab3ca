//! Interceptor plugins run ahead of the broker.
//!
//! Each plugin sees the (mutable) event, the invocation context and the response [`Callback`].
//! A plugin that answers the request itself sends through the callback and returns `true` to
//! interrupt dispatch.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::{handler::InvocationContext, response::ResponseEnvelope};

/// Single-use response channel back to the hosting runtime.
///
/// Errors are never reported through it: failures are folded into an envelope with an error
/// status code before being sent.
#[derive(Debug)]
pub struct Callback {
    tx: Mutex<Option<oneshot::Sender<ResponseEnvelope>>>,
}

impl Callback {
    pub fn channel() -> (Self, oneshot::Receiver<ResponseEnvelope>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Deliver `envelope`. Returns `false` if the callback was already used or nobody listens.
    pub fn send(&self, envelope: ResponseEnvelope) -> bool {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match tx {
            Some(tx) => tx.send(envelope).is_ok(),
            None => {
                tracing::warn!("callback already used; dropping response");
                false
            }
        }
    }

    pub fn is_used(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

pub trait Plugin: Send + Sync {
    /// Returns `true` to ask the dispatcher to stop.
    fn intercept(&self, event: &mut Value, context: &InvocationContext, callback: &Callback)
        -> bool;
}

impl<F> Plugin for F
where
    F: Fn(&mut Value, &InvocationContext, &Callback) -> bool + Send + Sync,
{
    fn intercept(
        &self,
        event: &mut Value,
        context: &InvocationContext,
        callback: &Callback,
    ) -> bool {
        self(event, context, callback)
    }
}

/// Run every plugin in order. Plugins are not short-circuited: the last plugin's answer decides.
pub fn run_plugins(
    plugins: &[Arc<dyn Plugin>],
    event: &mut Value,
    context: &InvocationContext,
    callback: &Callback,
) -> bool {
    let mut interrupt = false;
    for plugin in plugins {
        interrupt = plugin.intercept(event, context, callback);
    }
    interrupt
}
