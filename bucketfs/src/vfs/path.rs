//! Object keys as filesystem paths.
//!
//! Paths are relative, "/"-separated and case-sensitive. `"."` names the
//! root and never collides with a stored key.

use crate::vfs::error::FsError;
use std::fmt;
use std::str::FromStr;

/// Root sentinel.
pub const ROOT: &str = ".";

/// Hierarchy delimiter used for listings.
pub const DELIMITER: &str = "/";

/// Whether `name` is a usable path: the root sentinel, or a non-empty
/// sequence of non-empty segments none of which is "." or "..".
pub fn is_valid_path(name: &str) -> bool {
    if name == ROOT {
        return true;
    }
    !name.is_empty()
        && name
            .split(DELIMITER)
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn parse(path: &str) -> Result<Self, FsError> {
        if is_valid_path(path) {
            Ok(Self(path.to_string()))
        } else {
            Err(FsError::Invalid)
        }
    }

    /// Like `parse`, but rejects the root: it cannot be written or moved.
    pub fn parse_object(path: &str) -> Result<Self, FsError> {
        let key = Self::parse(path)?;
        if key.is_root() {
            return Err(FsError::Invalid);
        }
        Ok(key)
    }

    pub fn root() -> Self {
        Self(ROOT.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment; `"."` for the root.
    pub fn base_name(&self) -> &str {
        self.0.rsplit(DELIMITER).next().unwrap_or(&self.0)
    }

    /// Listing prefix for the children of this path.
    pub fn dir_prefix(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!("{}{DELIMITER}", self.0)
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ObjectKey {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
