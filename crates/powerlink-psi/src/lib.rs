#![cfg_attr(not(feature = "std"), no_std)]

// 'alloc' is used for the stream image, action lists and channel queues.
extern crate alloc;

// --- Foundation Modules ---
pub mod common;
pub mod hal;
pub mod log;
pub mod types;

// --- Error Sink ---
pub mod error;

// --- Buffer Transport ---
pub mod stream;
pub mod tbuf;
pub mod timeout;

// --- Channels ---
pub mod logbook;
pub mod occ;
pub mod ssdo;
pub mod status;

// --- Persistence ---
pub mod crc;
pub mod sodstore;

// --- Endpoint ---
pub mod config;
pub mod psi;

// --- Top-level Exports ---
pub use common::TimeStamp;
pub use config::PsiConfig;
pub use error::{ErrorHandler, ErrorManager, NoOpErrorHandler};
pub use hal::{GpioPort, NonVolatileStore, PsiError, TransferHandler};
pub use psi::{Psi, PsiSnapshot};
pub use stream::{BufferDescriptor, HandlerParam, Stream};
pub use types::{BufferId, SeqNr};
