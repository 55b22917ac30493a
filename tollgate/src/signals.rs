//! `SIGHUP`/`SIGTERM`/`SIGINT` handling via a raw libc handler flipping
//! `AtomicBool` flags, rather than an async signal stream — the
//! `monoio` runtime doesn't expose one, and the handler only needs to
//! flip flags the main loop polls between worker-join checks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

static RELOAD_REQUESTED: AtomicBool = AtomicBool::new(false);
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);
static ABORT_REQUESTED: AtomicBool = AtomicBool::new(false);
/// Epoch millis of the most recent `SIGINT`, 0 until the first one.
static LAST_SIGINT_MILLIS: AtomicU64 = AtomicU64::new(0);

fn now_millis() -> u64 {
 SystemTime::now()
 .duration_since(UNIX_EPOCH)
 .map(|d| d.as_millis() as u64)
 .unwrap_or(0)
}

/// Installs handlers for `SIGHUP`, `SIGTERM`, and `SIGINT`. Must be
/// called once, from the main thread, before any worker thread starts.
pub fn install() {
 // SAFETY: the handlers below touch only `AtomicBool`/`AtomicU64`
 // and a monotonic clock read, both async-signal-safe in practice,
 // and are installed once before any other thread exists.
 unsafe {
 libc::signal(libc::SIGHUP, sighup_handler as libc::sighandler_t);
 libc::signal(libc::SIGTERM, sigterm_handler as libc::sighandler_t);
 libc::signal(libc::SIGINT, sigint_handler as libc::sighandler_t);
 }
}

extern "C" fn sighup_handler(_sig: libc::c_int) {
 RELOAD_REQUESTED.store(true, Ordering::Relaxed);
}

extern "C" fn sigterm_handler(_sig: libc::c_int) {
 SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

extern "C" fn sigint_handler(_sig: libc::c_int) {
 let now = now_millis();
 let previous = LAST_SIGINT_MILLIS.swap(now, Ordering::Relaxed);
 if previous != 0 && now.saturating_sub(previous) <= 5_000 {
 ABORT_REQUESTED.store(true, Ordering::Relaxed);
 }
 SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

/// Takes (clears) a pending reload request, if one arrived since the
/// last check.
pub fn take_reload_requested() -> bool {
 RELOAD_REQUESTED.swap(false, Ordering::Relaxed)
}

pub fn shutdown_requested() -> bool {
 SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

/// A second `SIGINT` arrived within 5s of the first: the
/// caller should abort immediately instead of waiting for a graceful
/// drain to finish.
pub fn abort_requested() -> bool {
 ABORT_REQUESTED.load(Ordering::Relaxed)
}

/// How long the main loop sleeps between polls of the flags above.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
