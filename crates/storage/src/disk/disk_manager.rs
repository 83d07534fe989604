use crate::page::PAGE_SIZE;
use crate::typedef::{FileId, PageId, PageNo};
use crate::Result;
use fs2::FileExt;
use pagedb_error::{errdata, errinput, Error};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) const DATA_DIR: &str = "src/disk/data/";

/// Owns the open page files and performs the synchronous block I/O the
/// buffer pool orchestrates: reading and writing whole pages at
/// `page_no * PAGE_SIZE`, and handing out fresh page numbers per file.
///
/// Page numbers are allocated monotonically within each file and never
/// reused. Writes are durable on return.
#[derive(Debug)]
pub struct DiskManager {
    files: HashMap<FileId, DbFile>,
    next_file_id: FileId,
    /// Pages read from disk since creation. Eviction and cache-hit behavior
    /// is observable through these counters.
    read_cnt: AtomicU64,
    /// Pages written to disk since creation.
    write_cnt: AtomicU64,
}

#[derive(Debug)]
struct DbFile {
    file: File,
    path: PathBuf,
    /// The next page number to hand out for this file.
    next_page_no: PageNo,
}

impl DiskManager {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            next_file_id: 0,
            read_cnt: AtomicU64::new(0),
            write_cnt: AtomicU64::new(0),
        }
    }

    /// Creates (or truncates) the page file `filename` under the data
    /// directory and opens it with an exclusive lock.
    pub fn create_file(&mut self, filename: &str) -> Result<FileId> {
        let path = Path::new(DATA_DIR).join(filename);
        self.check_not_open(&path)?;

        std::fs::create_dir_all(DATA_DIR)
            .map_err(|e| Error::IO(format!("Unable to create data directory: {}", e)))?;
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::IO(format!("Unable to create file {}: {}", path.display(), e)))?;

        self.register(file, path, 0)
    }

    /// Opens an existing page file, recovering the next page number from the
    /// file length.
    pub fn open_file(&mut self, filename: &str) -> Result<FileId> {
        let path = Path::new(DATA_DIR).join(filename);
        self.check_not_open(&path)?;

        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .open(&path)
            .map_err(|e| Error::IO(format!("Unable to open file {}: {}", path.display(), e)))?;
        let len = file
            .metadata()
            .map_err(|e| Error::IO(format!("Failed to get file size: {}", e)))?
            .len();
        let next_page_no = (len / PAGE_SIZE as u64) as PageNo;

        self.register(file, path, next_page_no)
    }

    /// Closes an open file, releasing its lock. Resident pages of the file
    /// should be flushed first; the disk manager does not track them.
    pub fn close_file(&mut self, file_id: FileId) -> Result<()> {
        let db_file = self
            .files
            .remove(&file_id)
            .ok_or_else(|| Error::IO(format!("file {} is not open", file_id)))?;
        if let Err(e) = FileExt::unlock(&db_file.file) {
            log::warn!("failed to unlock file {}: {}", db_file.path.display(), e);
        }
        Ok(())
    }

    /// Removes a page file from the data directory. The file must not be open.
    pub fn destroy_file(&mut self, filename: &str) -> Result<()> {
        let path = Path::new(DATA_DIR).join(filename);
        if self.files.values().any(|f| f.path == path) {
            return errinput!("file {} is still open", path.display());
        }
        std::fs::remove_file(&path)
            .map_err(|e| Error::IO(format!("Unable to remove file {}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Allocates a fresh, monotonically increasing page number in `file_id`
    /// and extends the file to cover it. The new page reads back zeroed;
    /// nothing is written here, so allocation never counts as a write-back.
    pub fn allocate_page(&mut self, file_id: FileId) -> Result<PageId> {
        let db_file = self.file_mut(file_id)?;
        let page_no = db_file.next_page_no;
        db_file.next_page_no += 1;
        let new_len = db_file.next_page_no as u64 * PAGE_SIZE as u64;
        db_file
            .file
            .set_len(new_len)
            .map_err(|e| Error::IO(format!("Failed to extend file: {}", e)))?;
        Ok(PageId::new(file_id, page_no))
    }

    /// Fills `buf` with the page's bytes. `buf` must be exactly one page.
    pub fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        if buf.len() != PAGE_SIZE {
            return errdata!("Read buffer must be exactly one page.");
        }
        let db_file = self.file_mut(page_id.file_id())?;
        if page_id.page_no() >= db_file.next_page_no {
            return Err(Error::IO(format!("page {} does not exist", page_id)));
        }
        db_file
            .file
            .seek(SeekFrom::Start(page_id.page_no() as u64 * PAGE_SIZE as u64))?;
        db_file.file.read_exact(buf)?;
        self.read_cnt.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes the page's bytes to disk. Durable on return. `data` must be
    /// exactly one page.
    pub fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        if data.len() != PAGE_SIZE {
            return errdata!("Page data must be exactly one page.");
        }
        let db_file = self.file_mut(page_id.file_id())?;
        if page_id.page_no() >= db_file.next_page_no {
            return Err(Error::IO(format!("page {} does not exist", page_id)));
        }
        db_file
            .file
            .seek(SeekFrom::Start(page_id.page_no() as u64 * PAGE_SIZE as u64))?;
        db_file.file.write_all(data)?;
        db_file.file.sync_all()?;
        self.write_cnt.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Returns the current size of an open page file in bytes.
    pub fn file_size(&self, file_id: FileId) -> Result<u64> {
        let db_file = self
            .files
            .get(&file_id)
            .ok_or_else(|| Error::IO(format!("file {} is not open", file_id)))?;
        db_file
            .file
            .metadata()
            .map(|meta| meta.len())
            .map_err(|e| Error::IO(format!("Failed to get file size: {}", e)))
    }

    /// Number of page reads performed since this manager was created.
    pub fn read_count(&self) -> u64 {
        self.read_cnt.load(Ordering::Relaxed)
    }

    /// Number of page writes performed since this manager was created.
    pub fn write_count(&self) -> u64 {
        self.write_cnt.load(Ordering::Relaxed)
    }

    fn register(&mut self, file: File, path: PathBuf, next_page_no: PageNo) -> Result<FileId> {
        // Acquire an exclusive lock for as long as the file stays open.
        file.lock_exclusive()
            .map_err(|e| Error::IO(format!("Failed to acquire exclusive file lock: {}", e)))?;

        let file_id = self.next_file_id;
        self.next_file_id += 1;
        log::debug!("opened page file {} as file {}", path.display(), file_id);
        self.files.insert(
            file_id,
            DbFile {
                file,
                path,
                next_page_no,
            },
        );
        Ok(file_id)
    }

    fn check_not_open(&self, path: &Path) -> Result<()> {
        if self.files.values().any(|f| f.path == path) {
            return errinput!("file {} is already open", path.display());
        }
        Ok(())
    }

    fn file_mut(&mut self, file_id: FileId) -> Result<&mut DbFile> {
        self.files
            .get_mut(&file_id)
            .ok_or_else(|| Error::IO(format!("file {} is not open", file_id)))
    }
}

impl Default for DiskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DiskManager {
    /// Releases the file locks when the disk manager goes away so another
    /// instance can take over the files.
    fn drop(&mut self) {
        for db_file in self.files.values() {
            if let Err(e) = FileExt::unlock(&db_file.file) {
                log::warn!("failed to unlock file {}: {}", db_file.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_disk_allocate_is_monotonic_per_file() {
        let mut disk = DiskManager::new();
        let fd_a = disk.create_file("disk_alloc_a.db").unwrap();
        let fd_b = disk.create_file("disk_alloc_b.db").unwrap();

        for expected in 0..4 {
            let pid = disk.allocate_page(fd_a).unwrap();
            assert_eq!(pid, PageId::new(fd_a, expected));
        }
        // Allocation in one file does not advance the other.
        assert_eq!(disk.allocate_page(fd_b).unwrap(), PageId::new(fd_b, 0));
        assert_eq!(disk.file_size(fd_a).unwrap(), 4 * PAGE_SIZE as u64);
    }

    #[test]
    #[serial]
    fn test_disk_write_read_roundtrip() {
        let mut disk = DiskManager::new();
        let fd = disk.create_file("disk_rw.db").unwrap();
        let pid = disk.allocate_page(fd).unwrap();

        let mut data = vec![0u8; PAGE_SIZE];
        data[..5].copy_from_slice(b"hello");
        disk.write_page(pid, &data).unwrap();

        let mut buf = vec![0u8; PAGE_SIZE];
        disk.read_page(pid, &mut buf).unwrap();
        assert_eq!(buf, data);
        assert_eq!(disk.read_count(), 1);
        assert_eq!(disk.write_count(), 1);
    }

    #[test]
    #[serial]
    fn test_disk_fresh_page_reads_zeroed() {
        let mut disk = DiskManager::new();
        let fd = disk.create_file("disk_zero.db").unwrap();
        let pid = disk.allocate_page(fd).unwrap();

        let mut buf = vec![0xffu8; PAGE_SIZE];
        disk.read_page(pid, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    #[serial]
    fn test_disk_rejects_unknown_file_and_page() {
        let mut disk = DiskManager::new();
        let fd = disk.create_file("disk_bounds.db").unwrap();
        let mut buf = vec![0u8; PAGE_SIZE];

        // No page has been allocated yet.
        assert!(disk.read_page(PageId::new(fd, 0), &mut buf).is_err());
        // Unknown file id.
        assert!(disk.read_page(PageId::new(fd + 100, 0), &mut buf).is_err());
        // Wrong buffer size.
        let pid = disk.allocate_page(fd).unwrap();
        assert!(disk.read_page(pid, &mut buf[..16]).is_err());
        assert!(disk.write_page(pid, &buf[..16]).is_err());
    }

    #[test]
    #[serial]
    fn test_disk_reopen_recovers_next_page_no() {
        let pid = {
            let mut disk = DiskManager::new();
            let fd = disk.create_file("disk_reopen.db").unwrap();
            disk.allocate_page(fd).unwrap();
            let pid = disk.allocate_page(fd).unwrap();
            let mut data = vec![7u8; PAGE_SIZE];
            data[0] = 42;
            disk.write_page(pid, &data).unwrap();
            disk.close_file(fd).unwrap();
            pid
        };

        let mut disk = DiskManager::new();
        let fd = disk.open_file("disk_reopen.db").unwrap();
        // Two pages existed, so the next allocation continues at 2.
        assert_eq!(disk.allocate_page(fd).unwrap().page_no(), 2);

        let mut buf = vec![0u8; PAGE_SIZE];
        disk.read_page(PageId::new(fd, pid.page_no()), &mut buf).unwrap();
        assert_eq!(buf[0], 42);
    }

    #[test]
    #[serial]
    fn test_disk_destroy_file() {
        let mut disk = DiskManager::new();
        let fd = disk.create_file("disk_destroy.db").unwrap();

        // Destroying an open file is refused.
        assert!(disk.destroy_file("disk_destroy.db").is_err());

        disk.close_file(fd).unwrap();
        disk.destroy_file("disk_destroy.db").unwrap();
        assert!(disk.open_file("disk_destroy.db").is_err());
    }
}
