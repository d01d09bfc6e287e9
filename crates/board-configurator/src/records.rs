//! The two small "what did the operator pick last" records.
//!
//! On-disk formats are kept compatible with files written by earlier
//! versions of the tool: `vendor,board` and a bare thing name, no newline.

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardIdentity {
    pub vendor: String,
    pub board: String,
}

impl BoardIdentity {
    pub fn new(vendor: impl Into<String>, board: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            board: board.into(),
        }
    }
}

impl fmt::Display for BoardIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.vendor, self.board)
    }
}

pub trait RecordStore<T> {
    /// `Ok(None)` when nothing was saved yet.
    fn load(&self) -> Result<Option<T>>;
    fn save(&self, value: &T) -> Result<()>;
    fn clear(&self) -> Result<()>;

    fn exists(&self) -> Result<bool> {
        Ok(self.load()?.is_some())
    }
}

/// Text codec for a record file.
pub trait RecordFormat: Sized {
    fn encode(&self) -> String;
    fn decode(raw: &str) -> Result<Option<Self>>;
}

impl RecordFormat for BoardIdentity {
    fn encode(&self) -> String {
        format!("{},{}", self.vendor, self.board)
    }

    fn decode(raw: &str) -> Result<Option<Self>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let Some((vendor, board)) = raw.split_once(',') else {
            return Err(Error::msg(format!(
                "malformed board record '{raw}' (expected 'vendor,board')"
            )));
        };
        let (vendor, board) = (vendor.trim(), board.trim());
        if vendor.is_empty() || board.is_empty() {
            return Err(Error::msg(format!("malformed board record '{raw}'")));
        }
        Ok(Some(Self::new(vendor, board)))
    }
}

/// The thing name alone; certificate and key text never touch this file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThingName(pub String);

impl ThingName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl RecordFormat for ThingName {
    fn encode(&self) -> String {
        self.0.clone()
    }

    fn decode(raw: &str) -> Result<Option<Self>> {
        let name = raw.lines().next().unwrap_or("").trim();
        Ok((!name.is_empty()).then(|| ThingName(name.to_string())))
    }
}

#[derive(Debug, Clone)]
pub struct FileRecord {
    path: PathBuf,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: RecordFormat> RecordStore<T> for FileRecord {
    fn load(&self) -> Result<Option<T>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| Error::msg(format!("failed to read {}: {e}", self.path.display())))?;
        T::decode(&raw)
            .map_err(|e| Error::msg(format!("{} ({})", e, self.path.display())))
    }

    fn save(&self, value: &T) -> Result<()> {
        fs::write(&self.path, value.encode())
            .map_err(|e| Error::msg(format!("failed to write {}: {e}", self.path.display())))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::msg(format!(
                "failed to remove {}: {e}",
                self.path.display()
            ))),
        }
    }
}

#[derive(Debug)]
pub struct MemoryRecord<T> {
    value: RefCell<Option<T>>,
}

impl<T> Default for MemoryRecord<T> {
    fn default() -> Self {
        Self {
            value: RefCell::new(None),
        }
    }
}

impl<T> MemoryRecord<T> {
    pub fn with(value: T) -> Self {
        Self {
            value: RefCell::new(Some(value)),
        }
    }
}

impl<T: Clone> RecordStore<T> for MemoryRecord<T> {
    fn load(&self) -> Result<Option<T>> {
        Ok(self.value.borrow().clone())
    }

    fn save(&self, value: &T) -> Result<()> {
        *self.value.borrow_mut() = Some(value.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.value.borrow_mut() = None;
        Ok(())
    }
}
