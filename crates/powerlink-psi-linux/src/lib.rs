// crates/powerlink-psi-linux/src/lib.rs
//! Host-side collaborators for `powerlink-psi`.
//!
//! Nothing here touches real hardware: the non-volatile store is a file,
//! the stream transfer is a pair of in-process images and the GPIO port is
//! a pair of registers. This is enough to run a full PSI endpoint on a
//! development machine.

pub mod gpio;
pub mod link;
pub mod nvs;

pub use gpio::MemoryGpio;
pub use link::{RemotePeer, SharedImageLink};
pub use nvs::FileNvs;
