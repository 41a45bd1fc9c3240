use super::types::ErrorEntry;
use log::error;

/// A trait that defines how fatal PSI errors are reported.
///
/// The surrounding application may map a posted error to a safe-state
/// transition.
pub trait ErrorHandler {
    fn log_error(&mut self, entry: &ErrorEntry);
}

/// A `no_std` compatible error handler that does nothing.
pub struct NoOpErrorHandler;
impl ErrorHandler for NoOpErrorHandler {
    fn log_error(&mut self, _entry: &ErrorEntry) {}
}

/// An error handler that logs all errors using the `log` facade.
pub struct LoggingErrorHandler;
impl ErrorHandler for LoggingErrorHandler {
    fn log_error(&mut self, entry: &ErrorEntry) {
        error!("[PSI Error]: {:?}: {}", entry.module, entry.error);
    }
}

/// A `std`-based error handler that prints errors to the console.
#[cfg(feature = "std")]
pub struct StdoutErrorHandler;
#[cfg(feature = "std")]
impl ErrorHandler for StdoutErrorHandler {
    fn log_error(&mut self, entry: &ErrorEntry) {
        println!("[PSI ERROR]: {:?}: {}", entry.module, entry.error);
    }
}
