// crates/powerlink-psi/src/error/types.rs
use crate::hal::PsiError;

/// The module an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsiModule {
    Internal,
    Stream,
    Status,
    Logbook,
    Ssdo,
    Occ,
    SodStore,
}

/// A single posted error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorEntry {
    pub module: PsiModule,
    pub error: PsiError,
}
