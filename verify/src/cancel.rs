// Licensed under the Apache-2.0 license

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::signal;

/// Cooperative stop request, checked by the sampling loop before each
/// handshake. Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    follow_signals: bool,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also reports cancelled once a stop signal arrives.
    /// Install the handlers with [`signal::install_stop_handlers`].
    pub fn with_signals() -> Self {
        Self {
            follow_signals: true,
            ..Self::default()
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || (self.follow_signals && signal::stop_requested())
    }
}
