// crates/powerlink-psi/src/sodstore.rs
//! Persistence of the safety object dictionary (SOD) parameter set.
//!
//! Image layout in the non-volatile store, all fields little-endian:
//!
//! | offset | field                     |
//! |--------|---------------------------|
//! | 0x00   | magic word `0xDEADBEEF`   |
//! | 0x04   | state (`1` = invalid)     |
//! | 0x08   | parameter set length      |
//! | 0x0C   | CRC-32 of the data        |
//! | 0x10   | data                      |
//!
//! Storing is spread over several calls to [`SodStore::process`] so the
//! data is written in small chunks from the background loop. Every failure
//! is posted to the store's [`ErrorManager`] as [`PsiModule::SodStore`].

use crate::crc::crc32;
use crate::error::{ErrorHandler, ErrorManager, PsiModule};
use crate::hal::{NonVolatileStore, PsiError};
use log::{debug, error, info};

pub const SOD_MAGIC_WORD: u32 = 0xDEAD_BEEF;
pub const SOD_STATE_INVALID: u32 = 0x0000_0001;
/// Bytes written per `process` call.
pub const SOD_DATA_CHUNK_SIZE: usize = 8;

pub const SOD_OFFSET_MAGIC: u32 = 0x00;
pub const SOD_OFFSET_STATE: u32 = 0x04;
pub const SOD_OFFSET_LENGTH: u32 = 0x08;
pub const SOD_OFFSET_CRC32: u32 = 0x0C;
pub const SOD_OFFSET_DATA: u32 = 0x10;

/// Result of one [`SodStore::process`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcStoreStatus {
    Busy,
    Finished,
    /// An image already exists. It was marked invalid so the next boot
    /// starts from defaults and the store can run again.
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreState {
    Init,
    AddCrc,
    Process,
    Finished,
}

pub struct SodStore<N, H>
where
    N: NonVolatileStore,
    H: ErrorHandler,
{
    nvs: N,
    state: StoreState,
    data_pos: u32,
    param_offset: usize,
    errors: ErrorManager<H>,
}

impl<N, H> SodStore<N, H>
where
    N: NonVolatileStore,
    H: ErrorHandler,
{
    /// Opens the store. Failures are posted to `error_handler`.
    pub fn init(mut nvs: N, error_handler: H) -> Result<Self, PsiError> {
        let mut errors = ErrorManager::new(error_handler);
        let opened = nvs.init().map_err(|e| {
            error!("[SodStore] Unable to open the non-volatile store: {}", e);
            e
        });
        errors.check(PsiModule::SodStore, opened)?;
        Ok(Self {
            nvs,
            state: StoreState::Init,
            data_pos: 0,
            param_offset: 0,
            errors,
        })
    }

    pub fn close(&mut self) {
        self.nvs.close();
    }

    /// Erases the sector holding the image before a new store.
    pub fn prepare_storage(&mut self) -> Result<(), PsiError> {
        let result = self.nvs.erase(SOD_OFFSET_MAGIC);
        self.errors.check(PsiModule::SodStore, result)
    }

    /// Performs one step of storing `param_set`.
    pub fn process(&mut self, param_set: &[u8]) -> Result<ProcStoreStatus, PsiError> {
        let result = self.step(param_set);
        self.errors.check(PsiModule::SodStore, result)
    }

    fn step(&mut self, param_set: &[u8]) -> Result<ProcStoreStatus, PsiError> {
        if param_set.is_empty() || param_set.len() >= u32::MAX as usize {
            return Err(PsiError::InvalidParameter);
        }
        match self.state {
            StoreState::Init => {
                if self.verify_magic() {
                    self.nvs
                        .write(SOD_OFFSET_STATE, &SOD_STATE_INVALID.to_le_bytes())?;
                    info!("[SodStore] Existing image marked invalid");
                    return Ok(ProcStoreStatus::NotApplicable);
                }
                debug!("[SodStore] Storing {} bytes", param_set.len());
                self.data_pos = SOD_OFFSET_DATA;
                self.param_offset = 0;
                self.nvs.write(SOD_OFFSET_MAGIC, &SOD_MAGIC_WORD.to_le_bytes())?;
                self.nvs
                    .write(SOD_OFFSET_LENGTH, &(param_set.len() as u32).to_le_bytes())?;
                self.state = StoreState::AddCrc;
                Ok(ProcStoreStatus::Busy)
            }
            StoreState::AddCrc => {
                let crc = crc32(0, param_set);
                if crc == 0 {
                    error!("[SodStore] Parameter set checksum is zero");
                    return Err(PsiError::CrcError);
                }
                self.nvs.write(SOD_OFFSET_CRC32, &crc.to_le_bytes())?;
                self.state = StoreState::Process;
                Ok(ProcStoreStatus::Busy)
            }
            StoreState::Process => {
                if self.param_offset >= param_set.len() {
                    error!("[SodStore] Parameter set changed size while storing");
                    return Err(PsiError::InvalidParameter);
                }
                let end = (self.param_offset + SOD_DATA_CHUNK_SIZE).min(param_set.len());
                let chunk = &param_set[self.param_offset..end];
                self.nvs.write(self.data_pos, chunk)?;
                self.data_pos += chunk.len() as u32;
                self.param_offset = end;
                if self.param_offset == param_set.len() {
                    self.state = StoreState::Finished;
                }
                Ok(ProcStoreStatus::Busy)
            }
            StoreState::Finished => {
                self.data_pos = 0;
                self.param_offset = 0;
                self.state = StoreState::Init;
                info!("[SodStore] Parameter set stored");
                Ok(ProcStoreStatus::Finished)
            }
        }
    }

    /// Returns the stored parameter set if the image is present and intact.
    pub fn sod_image(&self) -> Option<&[u8]> {
        if !self.verify_magic() {
            return None;
        }
        let state = self.nvs.read_u32(SOD_OFFSET_STATE).ok()?;
        if state == SOD_STATE_INVALID {
            debug!("[SodStore] Image is marked invalid");
            return None;
        }
        let len = self.nvs.read_u32(SOD_OFFSET_LENGTH).ok()?;
        if len == 0 || len == u32::MAX {
            return None;
        }
        let stored_crc = self.nvs.read_u32(SOD_OFFSET_CRC32).ok()?;
        let data = self
            .nvs
            .address(SOD_OFFSET_DATA)
            .ok()?
            .get(..len as usize)?;
        if crc32(0, data) != stored_crc {
            debug!("[SodStore] Image checksum mismatch");
            return None;
        }
        Some(data)
    }

    pub fn nvs(&self) -> &N {
        &self.nvs
    }

    pub fn nvs_mut(&mut self) -> &mut N {
        &mut self.nvs
    }

    pub fn errors(&self) -> &ErrorManager<H> {
        &self.errors
    }

    fn verify_magic(&self) -> bool {
        self.nvs.read_u32(SOD_OFFSET_MAGIC) == Ok(SOD_MAGIC_WORD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorEntry, NoOpErrorHandler};
    use alloc::rc::Rc;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    struct SharedHandler(Rc<RefCell<Vec<ErrorEntry>>>);
    impl ErrorHandler for SharedHandler {
        fn log_error(&mut self, entry: &ErrorEntry) {
            self.0.borrow_mut().push(*entry);
        }
    }

    /// Flash-like store: erased cells read as 0xFF.
    struct MemNvs {
        mem: Vec<u8>,
        open: bool,
        writes: usize,
    }

    impl MemNvs {
        fn new(size: usize) -> Self {
            Self {
                mem: vec![0xFF; size],
                open: false,
                writes: 0,
            }
        }
    }

    impl NonVolatileStore for MemNvs {
        fn init(&mut self) -> Result<(), PsiError> {
            self.open = true;
            Ok(())
        }

        fn close(&mut self) {
            self.open = false;
        }

        fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), PsiError> {
            let start = offset as usize;
            self.mem
                .get_mut(start..start + data.len())
                .ok_or(PsiError::StorageError("write out of range"))?
                .copy_from_slice(data);
            self.writes += 1;
            Ok(())
        }

        fn read_u32(&self, offset: u32) -> Result<u32, PsiError> {
            let start = offset as usize;
            let bytes = self
                .mem
                .get(start..start + 4)
                .ok_or(PsiError::StorageError("read out of range"))?;
            Ok(u32::from_le_bytes(bytes.try_into()?))
        }

        fn erase(&mut self, _offset: u32) -> Result<(), PsiError> {
            self.mem.fill(0xFF);
            Ok(())
        }

        fn address(&self, offset: u32) -> Result<&[u8], PsiError> {
            self.mem
                .get(offset as usize..)
                .ok_or(PsiError::StorageError("address out of range"))
        }
    }

    fn store_all(store: &mut SodStore<MemNvs, NoOpErrorHandler>, data: &[u8]) -> usize {
        let mut calls = 0;
        loop {
            calls += 1;
            match store.process(data).unwrap() {
                ProcStoreStatus::Busy => continue,
                ProcStoreStatus::Finished => return calls,
                ProcStoreStatus::NotApplicable => panic!("image already present"),
            }
        }
    }

    fn param_set(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_store_writes_header_and_chunks() {
        let mut store = SodStore::init(MemNvs::new(64), NoOpErrorHandler).unwrap();
        assert!(store.nvs().open);
        let data = param_set(20);

        // header, crc, three chunks (8 + 8 + 4), finish
        assert_eq!(store_all(&mut store, &data), 6);
        let mem = &store.nvs().mem;
        assert_eq!(&mem[0..4], &SOD_MAGIC_WORD.to_le_bytes());
        assert_eq!(&mem[4..8], &[0xFF; 4]);
        assert_eq!(&mem[8..12], &20u32.to_le_bytes());
        assert_eq!(&mem[12..16], &crc32(0, &data).to_le_bytes());
        assert_eq!(&mem[16..36], &data[..]);
        assert_eq!(store.sod_image(), Some(&data[..]));
    }

    #[test]
    fn test_existing_image_is_invalidated() {
        let mut store = SodStore::init(MemNvs::new(64), NoOpErrorHandler).unwrap();
        let data = param_set(8);
        store_all(&mut store, &data);

        assert_eq!(store.process(&data), Ok(ProcStoreStatus::NotApplicable));
        assert_eq!(store.nvs().read_u32(SOD_OFFSET_STATE), Ok(SOD_STATE_INVALID));
        assert_eq!(store.sod_image(), None);

        store.prepare_storage().unwrap();
        assert_eq!(store.sod_image(), None);
        store_all(&mut store, &data);
        assert_eq!(store.sod_image(), Some(&data[..]));
    }

    #[test]
    fn test_corrupted_data_fails_verification() {
        let mut store = SodStore::init(MemNvs::new(64), NoOpErrorHandler).unwrap();
        store_all(&mut store, &param_set(16));
        store.nvs_mut().mem[20] ^= 0x01;
        assert_eq!(store.sod_image(), None);
    }

    #[test]
    fn test_zero_checksum_is_rejected() {
        let posted = Rc::new(RefCell::new(Vec::new()));
        let mut store = SodStore::init(MemNvs::new(64), SharedHandler(posted.clone())).unwrap();
        let data = [0u8; 8];
        assert_eq!(store.process(&data), Ok(ProcStoreStatus::Busy));
        assert_eq!(store.process(&data), Err(PsiError::CrcError));
        assert_eq!(
            *posted.borrow(),
            [ErrorEntry {
                module: PsiModule::SodStore,
                error: PsiError::CrcError
            }]
        );
        assert_eq!(store.errors().error_count(), 1);
    }

    #[test]
    fn test_write_failure_is_posted() {
        let posted = Rc::new(RefCell::new(Vec::new()));
        let mut store = SodStore::init(MemNvs::new(8), SharedHandler(posted.clone())).unwrap();
        let result = store.process(&param_set(8));
        assert_eq!(result, Err(PsiError::StorageError("write out of range")));
        assert_eq!(posted.borrow()[0].module, PsiModule::SodStore);
        assert_eq!(
            store.errors().last_error().map(|e| e.error),
            Some(PsiError::StorageError("write out of range"))
        );
    }

    #[test]
    fn test_empty_parameter_set_is_rejected() {
        let mut store = SodStore::init(MemNvs::new(64), NoOpErrorHandler).unwrap();
        assert_eq!(store.process(&[]), Err(PsiError::InvalidParameter));
        assert_eq!(store.nvs().writes, 0);
        assert_eq!(store.errors().error_count(), 1);
    }

    #[test]
    fn test_erased_store_has_no_image() {
        let store = SodStore::init(MemNvs::new(64), NoOpErrorHandler).unwrap();
        assert_eq!(store.sod_image(), None);
    }
}
