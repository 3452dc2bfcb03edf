//! Listener glue: accepts clients and hands each one to its own task.

pub mod listener;

use std::sync::Arc;

use crate::config::Config;
use crate::lookup::Upstream;

/// Everything a connection handler needs, shared read-only across tasks.
pub struct ServerState {
    pub config: Config,
    pub upstream: Upstream,
}

impl ServerState {
    pub fn new(config: Config, upstream: Upstream) -> Arc<Self> {
        Arc::new(Self { config, upstream })
    }
}
