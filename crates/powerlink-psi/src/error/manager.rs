use super::traits::ErrorHandler;
use super::types::{ErrorEntry, PsiModule};
use crate::hal::PsiError;

/// The single error-posting collaborator, generic over the handler.
pub struct ErrorManager<H>
where
    H: ErrorHandler,
{
    pub handler: H,
    last_error: Option<ErrorEntry>,
    error_count: u32,
}

impl<H> ErrorManager<H>
where
    H: ErrorHandler,
{
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            last_error: None,
            error_count: 0,
        }
    }

    /// Records the error and forwards it to the handler.
    pub fn post(&mut self, module: PsiModule, error: PsiError) {
        let entry = ErrorEntry { module, error };
        self.error_count = self.error_count.saturating_add(1);
        self.last_error = Some(entry);
        self.handler.log_error(&entry);
    }

    /// Passes `result` through, posting its error on the way.
    pub fn check<T>(&mut self, module: PsiModule, result: Result<T, PsiError>) -> Result<T, PsiError> {
        if let Err(e) = &result {
            self.post(module, *e);
        }
        result
    }

    pub fn last_error(&self) -> Option<ErrorEntry> {
        self.last_error
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }
}
