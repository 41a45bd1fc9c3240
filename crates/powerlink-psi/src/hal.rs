// crates/powerlink-psi/src/hal.rs
use crate::stream::HandlerParam;
use core::array::TryFromSliceError;
use core::fmt;

/// Defines a portable, descriptive Error type for the PSI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsiError {
    /// A parameter passed to an entry point is invalid (empty list, bad id, ...).
    InvalidParameter,
    /// A buffer descriptor has no backing memory or breaks the contiguous layout.
    InvalidBuffer,
    /// A buffer does not have the size its channel structure requires.
    BufferSizeMismatch { expected: usize, actual: usize },
    /// An access at `offset + width` exceeds the size of the buffer.
    OutOfBounds,
    /// The pre- or post-action list has no free slot left.
    NoFreeActionSlot,
    /// A registered buffer action reported a failure.
    ActionFailed,
    /// The transfer handler failed to move the stream images.
    TransferError,
    /// The synchronous user callback reported a failure.
    SyncCallbackFailed,
    /// The time synchronisation callback reported a failure.
    TimeSyncFailed,
    /// The transmit slot of a channel is still occupied.
    ChannelBusy,
    /// A configuration channel object has a size other than 1, 2, 4 or 8 bytes.
    InvalidSizeOfObject(u16),
    /// An object dictionary write is larger than a configuration channel object.
    ObjectLengthError(usize),
    /// A receive FIFO is full.
    FifoFull,
    /// A state machine reached a state it cannot process.
    InvalidState,
    /// A raw value is not a valid sequence number.
    InvalidSeqNr(u8),
    /// An error occurred in the non-volatile storage backend.
    StorageError(&'static str),
    /// A stored image failed its checksum verification.
    CrcError,
    /// The module was used before it was initialised.
    NotInitialized,
    /// A multi-byte value could not be parsed from a slice.
    SliceConversion,
}

impl fmt::Display for PsiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter => write!(f, "Invalid parameter"),
            Self::InvalidBuffer => write!(f, "Invalid buffer descriptor"),
            Self::BufferSizeMismatch { expected, actual } => write!(
                f,
                "Buffer size mismatch: expected {} bytes, got {}",
                expected, actual
            ),
            Self::OutOfBounds => write!(f, "Access exceeds the buffer size"),
            Self::NoFreeActionSlot => write!(f, "No free element in the action list"),
            Self::ActionFailed => write!(f, "A buffer action failed"),
            Self::TransferError => write!(f, "Stream transfer failed"),
            Self::SyncCallbackFailed => write!(f, "Synchronous callback failed"),
            Self::TimeSyncFailed => write!(f, "Time synchronisation callback failed"),
            Self::ChannelBusy => write!(f, "Channel is busy"),
            Self::InvalidSizeOfObject(v) => write!(f, "Invalid size of object: {} bytes", v),
            Self::ObjectLengthError(v) => write!(f, "Object length {} exceeds 8 bytes", v),
            Self::FifoFull => write!(f, "Receive FIFO is full"),
            Self::InvalidState => write!(f, "Invalid state machine state"),
            Self::InvalidSeqNr(v) => write!(f, "Invalid sequence number value: {v:#04x}"),
            Self::StorageError(s) => write!(f, "Storage error: {}", s),
            Self::CrcError => write!(f, "CRC verification failed"),
            Self::NotInitialized => write!(f, "Module is not initialized"),
            Self::SliceConversion => write!(f, "Failed to convert slice to a fixed-size array"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PsiError {}

// --- From Implementations for Error Conversion ---

impl From<TryFromSliceError> for PsiError {
    fn from(_: TryFromSliceError) -> Self {
        PsiError::SliceConversion
    }
}

impl From<&'static str> for PsiError {
    fn from(s: &'static str) -> Self {
        PsiError::StorageError(s)
    }
}

/// Hardware Abstraction Layer (HAL) for the physical stream transfer.
///
/// The handler moves the two stream images across the physical channel
/// (SPI, a shared DRAM window, a parallel bus, ...). The consumer image is
/// filled with what the remote side published, the producer image is sent
/// to the remote side.
pub trait TransferHandler {
    /// Transfers both images. Called once per cycle, after all pre-actions.
    fn transfer(&mut self, param: &mut HandlerParam<'_>) -> Result<(), PsiError>;
}

impl<F> TransferHandler for F
where
    F: FnMut(&mut HandlerParam<'_>) -> Result<(), PsiError>,
{
    fn transfer(&mut self, param: &mut HandlerParam<'_>) -> Result<(), PsiError> {
        self(param)
    }
}

/// Abstraction of the non-volatile memory holding the stored parameter set.
///
/// Offsets are relative to the start of the image area.
pub trait NonVolatileStore {
    /// Opens the underlying device.
    fn init(&mut self) -> Result<(), PsiError>;

    /// Closes the underlying device.
    fn close(&mut self);

    /// Writes `data` starting at `offset`.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), PsiError>;

    /// Reads the little-endian 32 bit word stored at `offset`.
    fn read_u32(&self, offset: u32) -> Result<u32, PsiError>;

    /// Erases the sector that contains `offset`.
    fn erase(&mut self, offset: u32) -> Result<(), PsiError>;

    /// Returns direct read access to the memory from `offset` to the end
    /// of the image area, bypassing `read_u32` for bulk data.
    fn address(&self, offset: u32) -> Result<&[u8], PsiError>;
}

/// Digital I/O port of the application processor.
pub trait GpioPort {
    /// Initialises the port. Returns the number of available outputs.
    fn init(&mut self) -> Result<u8, PsiError>;

    /// Releases the port.
    fn exit(&mut self);

    /// Drives all outputs from `value`.
    fn write_output_port(&mut self, value: u32);

    /// Samples all inputs.
    fn read_input_port(&mut self) -> u8;
}
