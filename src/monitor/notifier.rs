use tracing::error;

/// Blocking, user-visible notification channel
///
/// Only user-initiated failures are reported here.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Notifier that reports alerts through the log
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        error!("{}", message);
    }
}
