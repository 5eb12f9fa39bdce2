//! Chaos Engineering for Kong.
//!
//! Discovers services and routes of one or more Kong deployments through
//! the Admin API and injects HTTP failures by managing the lifecycle of a
//! `request-termination` plugin:
//! - prepare: resolve the target and create the plugin disabled
//! - start: enable the plugin
//! - stop: delete the plugin
//!
//! # Discovery
//!
//! Services and routes are exposed as targets with `kong.`-prefixed
//! attributes. Instances are listed concurrently and best-effort; selected
//! attribute keys can be suppressed per target kind.

pub mod attributes;
pub mod config;
pub mod discovery;
pub mod error;
pub mod describe;
pub mod extension;
pub mod faults;
pub mod instance;
pub mod kong;
pub mod resolver;
pub mod targeting;
pub mod termination;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{ChaosError, Result};
pub use extension::KongExtension;
pub use faults::TerminationConfig;
pub use resolver::Selector;
pub use termination::{AttackState, RequestTermination};
