use log::{debug, warn};

/// Check if the process is running as root
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Warn ahead of time when the cache drop is going to be rejected.
///
/// The write is still attempted; this only improves the log.
pub fn preflight_cache_drop() {
    if is_root() {
        debug!("Running as root, cache drop should be permitted");
    } else {
        warn!("Not running as root, dropping the page cache will likely be denied");
    }
}
