//! User-facing alerts.
//!
//! Failures of external calls are reported to the player through a
//! [`Notifier`] and leave application state unchanged.

use tracing::error;

/// Something that can show an alert to the player.
pub trait Notifier: Send + Sync {
    fn alert(&self, title: &str, message: &str);
}

/// Sends alerts to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, title: &str, message: &str) {
        error!(title, message, "alert");
    }
}
