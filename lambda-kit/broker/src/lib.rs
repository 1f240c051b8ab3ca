//! `lmb-broker`: the service broker the gateway drives for each invocation.
//!
//! The gateway only relies on the [`Broker`] / [`BrokerEngine`] contract: construct a broker from
//! [`BrokerParams`], register services, `start`, `call` an action, `stop`. [`ServiceBroker`] is
//! the in-process engine behind [`LocalEngine`].
//!
//! Core modules:
//! - [`broker`]: the contract plus the in-process engine
//! - [`service`]: service schemas, actions and lifecycle hooks
//! - [`middleware`]: action wrappers and the built-in call tracker
//! - [`error`]: [`BrokerError`]

pub mod broker;
pub mod error;
pub mod middleware;
pub mod service;

pub use broker::{Broker, BrokerEngine, BrokerParams, BrokerState, LocalEngine, ServiceBroker};
pub use error::BrokerError;
pub use middleware::{CallTracker, Middleware};
pub use service::{action_fn, ActionContext, ActionHandler, ServiceSchema};
