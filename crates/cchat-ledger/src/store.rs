use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use cchat_types::models::HistoryFile;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
    #[error("malformed history: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("message ids are not strictly increasing at id {0}")]
    OutOfOrder(u64),
    #[error("message id {0} leaves no room for another id")]
    IdsExhausted(u64),
}

/// JSON snapshot file holding `{next_id, messages}`.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist yet.
    pub fn load(&self) -> Result<Option<HistoryFile>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Read(e)),
        };
        let file: HistoryFile = serde_json::from_str(&raw)?;

        let mut last = 0;
        for message in &file.messages {
            if message.id <= last {
                return Err(StoreError::OutOfOrder(message.id));
            }
            last = message.id;
        }
        if last == u64::MAX || file.next_id == u64::MAX {
            return Err(StoreError::IdsExhausted(last.max(file.next_id)));
        }

        Ok(Some(file))
    }

    /// Write the full snapshot to a sibling temp file, then rename it over the target.
    pub fn save(&self, file: &HistoryFile) -> Result<(), StoreError> {
        let json = serde_json::to_vec(file)?;

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let mut out = fs::File::create(&tmp_path).map_err(StoreError::Write)?;
        out.write_all(&json).map_err(StoreError::Write)?;
        out.sync_all().map_err(StoreError::Write)?;
        drop(out);

        fs::rename(&tmp_path, &self.path).map_err(StoreError::Write)
    }
}
