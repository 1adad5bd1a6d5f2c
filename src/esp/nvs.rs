// esp/nvs.rs

use esp_idf_svc::nvs::{EspNvs, NvsDefault};

use crate::*;

/// One NVS namespace. Every key is a blob; NVS commits on each set, so
/// `sync` has nothing left to do.
pub struct NvsStorage {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStorage {
    pub fn new(nvs: EspNvs<NvsDefault>) -> Self {
        Self { nvs }
    }
}

impl Storage for NvsStorage {
    fn read(&mut self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let len = match self.nvs.blob_len(key)? {
            None => return Ok(None),
            Some(len) => len,
        };
        let mut buf = vec![0u8; len];
        Ok(self.nvs.get_raw(key, &mut buf)?.map(<[u8]>::to_vec))
    }

    fn write(&mut self, key: &str, value: &[u8]) -> AppResult<()> {
        self.nvs
            .set_raw(key, value)
            .map_err(|e| AppError::Storage(format!("Cannot save {key} to nvs: {e:?}")))?;
        Ok(())
    }

    fn sync(&mut self) -> AppResult<()> {
        Ok(())
    }
}

// EOF
