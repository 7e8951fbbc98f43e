//! Decorator chain assembly

use std::sync::Arc;

use crate::config::{BatchConfig, Config};
use crate::error::LogError;

use super::{BatchingLog, LogCore, RecoveringLog, SerialLog};

/// Out-of-band observer for failures the recovery decorator cannot resolve
pub type ErrorCallback = Arc<dyn Fn(&LogError) + Send + Sync>;

/// What to wrap around a log
#[derive(Clone, Default)]
pub struct ChainConfig {
    /// Append coalescing (outermost layer when enabled)
    pub batch: BatchConfig,

    /// Called when a restart attempt fails
    pub on_error: Option<ErrorCallback>,
}

impl ChainConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch: config.batch,
            on_error: None,
        }
    }

    pub fn batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn on_error(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }
}

/// Wrap `core` as `[BatchingLog] → RecoveringLog → SerialLog → core`
pub fn decorate<L: LogCore + 'static>(core: L, chain: &ChainConfig) -> Arc<dyn LogCore> {
    let mut recovering = RecoveringLog::new(SerialLog::new(core));
    if let Some(callback) = &chain.on_error {
        recovering = recovering.with_error_callback(Arc::clone(callback));
    }

    if chain.batch.enabled {
        Arc::new(BatchingLog::new(recovering, chain.batch))
    } else {
        Arc::new(recovering)
    }
}
