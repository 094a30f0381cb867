//! Directory-backed store
//!
//! Directory layout:
//! - `<key>.csrec`: one framed record per key
//! - `<key>.csrec.tmp`: in-flight write, renamed over the record on success

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::record::Record;
use crate::Backend;

/// File extension for record files
const RECORD_EXT: &str = "csrec";

/// Backend storing each key as a record file inside a directory
#[derive(Debug)]
pub struct FileBackend {
    /// Directory holding the record files
    dir: PathBuf,

    /// Serializes writers within the process
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Open or create a store in the given directory
    ///
    /// # Arguments
    /// * `dir` - Directory for the record files
    ///
    /// # Returns
    /// * `Result<FileBackend>` - Store handle
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the record files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
        if !valid {
            return Err(Error::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", key, RECORD_EXT)))
    }
}

impl Backend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<Record>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Record::decode(&bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, record: &Record) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension(format!("{}.tmp", RECORD_EXT));
        let bytes = record.encode()?;

        let _guard = self.write_lock.lock();
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;

        let _guard = self.write_lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
