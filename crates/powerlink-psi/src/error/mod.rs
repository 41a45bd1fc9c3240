//! Centralizes the error sink of the PSI layer: the module taxonomy, the
//! handler trait fatal errors are posted to, and the manager that records them.

pub mod manager;
pub mod traits;
pub mod types;

pub use manager::ErrorManager;
pub use traits::{ErrorHandler, LoggingErrorHandler};
pub use types::{ErrorEntry, PsiModule};

// Re-export common handler implementations for convenience.
pub use traits::NoOpErrorHandler;
#[cfg(feature = "std")]
pub use traits::StdoutErrorHandler;
