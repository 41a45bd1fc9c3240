// crates/powerlink-psi-linux/src/nvs.rs
use log::{debug, error, info};
use powerlink_psi::{NonVolatileStore, PsiError};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Value of an erased cell.
const ERASED: u8 = 0xFF;

/// A flash-like store backed by a regular file.
///
/// The whole device is mirrored in memory so `address` can hand out a
/// slice. Every write goes through to the file immediately.
pub struct FileNvs {
    path: PathBuf,
    size: usize,
    file: Option<File>,
    mirror: Vec<u8>,
}

impl FileNvs {
    pub fn new(path: impl AsRef<Path>, size: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            size,
            file: None,
            mirror: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn open(&mut self) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        let mut contents = Vec::with_capacity(self.size);
        file.read_to_end(&mut contents)?;
        contents.truncate(self.size);
        if contents.len() < self.size {
            // A fresh or short file reads as erased past its end.
            contents.resize(self.size, ERASED);
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&contents)?;
            file.flush()?;
        }

        self.mirror = contents;
        self.file = Some(file);
        Ok(())
    }

    fn write_through(&mut self, offset: usize, data: &[u8]) -> io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "store is closed"))?;
        file.seek(SeekFrom::Start(offset as u64))?;
        file.write_all(data)?;
        file.flush()
    }
}

impl NonVolatileStore for FileNvs {
    fn init(&mut self) -> Result<(), PsiError> {
        self.open().map_err(|e| {
            error!("[FileNvs] Failed to open {}: {}", self.path.display(), e);
            PsiError::StorageError("unable to open backing file")
        })?;
        info!(
            "[FileNvs] Opened {} ({} bytes)",
            self.path.display(),
            self.size
        );
        Ok(())
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!("[FileNvs] Closed {}", self.path.display());
        }
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), PsiError> {
        if self.file.is_none() {
            return Err(PsiError::NotInitialized);
        }
        let start = offset as usize;
        self.mirror
            .get_mut(start..start + data.len())
            .ok_or(PsiError::StorageError("write beyond the device"))?
            .copy_from_slice(data);
        self.write_through(start, data).map_err(|e| {
            error!("[FileNvs] Write at {:#x} failed: {}", start, e);
            PsiError::StorageError("write to backing file failed")
        })
    }

    fn read_u32(&self, offset: u32) -> Result<u32, PsiError> {
        let start = offset as usize;
        let bytes = self
            .mirror
            .get(start..start + 4)
            .ok_or(PsiError::StorageError("read beyond the device"))?;
        Ok(u32::from_le_bytes(bytes.try_into()?))
    }

    /// The device has a single sector, so any offset erases everything.
    fn erase(&mut self, _offset: u32) -> Result<(), PsiError> {
        if self.file.is_none() {
            return Err(PsiError::NotInitialized);
        }
        self.mirror.fill(ERASED);
        let image = self.mirror.clone();
        self.write_through(0, &image).map_err(|e| {
            error!("[FileNvs] Erase failed: {}", e);
            PsiError::StorageError("erase of backing file failed")
        })?;
        debug!("[FileNvs] Erased {}", self.path.display());
        Ok(())
    }

    fn address(&self, offset: u32) -> Result<&[u8], PsiError> {
        self.mirror
            .get(offset as usize..)
            .ok_or(PsiError::StorageError("address beyond the device"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powerlink_psi::NoOpErrorHandler;
    use powerlink_psi::sodstore::{ProcStoreStatus, SodStore};
    use std::fs;

    fn scratch_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "powerlink-psi-{}-{}.nvs",
            name,
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn test_fresh_file_reads_erased() {
        let path = scratch_file("fresh");
        let mut nvs = FileNvs::new(&path, 64);
        nvs.init().unwrap();
        assert_eq!(nvs.read_u32(0), Ok(0xFFFF_FFFF));
        assert_eq!(fs::read(&path).unwrap(), vec![0xFF; 64]);
        nvs.close();
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_write_requires_init() {
        let mut nvs = FileNvs::new(scratch_file("closed"), 64);
        assert_eq!(nvs.write(0, &[1, 2]), Err(PsiError::NotInitialized));
        assert_eq!(nvs.erase(0), Err(PsiError::NotInitialized));
    }

    #[test]
    fn test_writes_survive_reopen() {
        let path = scratch_file("reopen");
        let mut nvs = FileNvs::new(&path, 32);
        nvs.init().unwrap();
        nvs.write(4, &0x1234_5678u32.to_le_bytes()).unwrap();
        assert_eq!(
            nvs.write(30, &[0; 4]),
            Err(PsiError::StorageError("write beyond the device"))
        );
        nvs.close();

        let mut nvs = FileNvs::new(&path, 32);
        nvs.init().unwrap();
        assert_eq!(nvs.read_u32(4), Ok(0x1234_5678));
        nvs.erase(0).unwrap();
        assert_eq!(nvs.read_u32(4), Ok(0xFFFF_FFFF));
        nvs.close();
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_parameter_set_is_restored_after_restart() {
        let path = scratch_file("sod");
        let data: Vec<u8> = (0..200u16).map(|i| (i * 13) as u8).collect();

        let mut sod = SodStore::init(FileNvs::new(&path, 512), NoOpErrorHandler).unwrap();
        sod.prepare_storage().unwrap();
        while sod.process(&data).unwrap() != ProcStoreStatus::Finished {}
        sod.close();

        let sod = SodStore::init(FileNvs::new(&path, 512), NoOpErrorHandler).unwrap();
        assert_eq!(sod.sod_image(), Some(&data[..]));
        let _ = fs::remove_file(&path);
    }
}
