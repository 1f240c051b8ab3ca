//! `lmb-runtime` hosts a gateway dispatcher as a Lambda custom runtime.
//!
//! Core modules:
//! - [`config`]: environment-driven runtime config
//! - [`runtime`]: setup, the invocation loop and tracing init
//! - [`demo`]: the services, handlers and plugins behind the sample `gateway.yaml`

pub mod config;
pub mod demo;
pub mod runtime;

pub use config::RuntimeConfig;
pub use runtime::{init_tracing, run, Gateway};
