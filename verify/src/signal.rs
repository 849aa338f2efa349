// Licensed under the Apache-2.0 license

//! SIGINT/SIGTERM hook. The handler only stores to an atomic flag; the
//! sampling loop notices it through [`crate::CancelToken`] between
//! handshakes.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_stop(_: i32) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to the stop flag.
pub fn install_stop_handlers() -> nix::Result<()> {
    let sig_action = SigAction::new(
        SigHandler::Handler(handle_stop),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        // The handler only touches an atomic.
        unsafe {
            signal::sigaction(sig, &sig_action)?;
        }
    }
    Ok(())
}

/// True once SIGINT or SIGTERM has been delivered.
pub fn stop_requested() -> bool {
    STOP_REQUESTED.load(Ordering::SeqCst)
}
