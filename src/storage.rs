// storage.rs

use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use crate::*;

/// Raw durable key/value backend. Anything written and synced here survives
/// deep sleep and power loss; nothing else does.
pub trait Storage {
    fn read(&mut self, key: &str) -> AppResult<Option<Vec<u8>>>;
    fn write(&mut self, key: &str, value: &[u8]) -> AppResult<()>;
    fn sync(&mut self) -> AppResult<()>;
}

/// One file per key inside a directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl Storage for FileStorage {
    fn read(&mut self, key: &str) -> AppResult<Option<Vec<u8>>> {
        match fs::read(self.path(key)) {
            Ok(b) => Ok(Some(b)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, value: &[u8]) -> AppResult<()> {
        // write-then-rename so a power cut never leaves a half written record
        let tmp = self.dir.join(format!("{key}.tmp"));
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(value)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, self.path(key))?;
        Ok(())
    }

    fn sync(&mut self) -> AppResult<()> {
        // Directory fsync is not supported by every VFS.
        if let Err(e) = fs::File::open(&self.dir).and_then(|d| d.sync_all()) {
            debug!("Directory sync of {:?} skipped: {e}", self.dir);
        }
        Ok(())
    }
}


// EOF
