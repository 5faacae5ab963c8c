//! SIGINT/SIGHUP/SIGTERM handling: each signal only ever sets the shared
//! shutdown flag, matching the original's `intr`/`hup`/`term` handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

static SHUTDOWN: OnceLock<&'static AtomicBool> = OnceLock::new();

extern "C" fn handle_signal(_sig: libc::c_int) {
    if let Some(flag) = SHUTDOWN.get() {
        flag.store(true, Ordering::Release);
    }
}

/// Register SIGINT/SIGHUP/SIGTERM to set `flag` and return. `flag` must
/// outlive the process (a `'static` leaked `Arc` or a static), since a
/// signal handler cannot safely hold a non-trivial closure.
pub fn install(flag: &'static AtomicBool) {
    let _ = SHUTDOWN.set(flag);
    unsafe {
        libc::signal(libc::SIGINT, handle_signal as libc::sighandler_t);
        libc::signal(libc::SIGHUP, handle_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_signal as libc::sighandler_t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_sets_the_flag_without_registering() {
        static FLAG: AtomicBool = AtomicBool::new(false);
        let _ = SHUTDOWN.set(&FLAG);
        handle_signal(0);
        assert!(FLAG.load(Ordering::Acquire));
    }
}
