//! UID paths: machine-independent identities for files.
//!
//! A UID path is `<project name>[/<package name>]/<relative segments>`. It never
//! contains absolute or physical filesystem references, so the same file maps
//! to the same UID on every machine that loads the same project layout.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// A virtual identity for a file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct UidPath {
    segments: Vec<String>,
}

impl UidPath {
    /// Parse a UID from its `/`-joined string form.
    pub fn new(uid: &str) -> Result<Self, UidPathError> {
        let segments: Vec<String> = uid
            .trim()
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .map(|s| s.to_string())
            .collect();

        if segments.is_empty() {
            return Err(UidPathError::Empty);
        }

        for segment in &segments {
            if segment.contains('\0') {
                return Err(UidPathError::InvalidCharacter('\0'));
            }
            if segment == ".." {
                return Err(UidPathError::EscapesRoot);
            }
        }

        Ok(Self { segments })
    }

    /// Build a UID from segments.
    ///
    /// Parts containing `/` are split further, so two UIDs are equal exactly
    /// when their string forms are.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut normalized = Vec::new();
        for segment in segments {
            let segment: String = segment.into();
            normalized.extend(
                segment
                    .split('/')
                    .filter(|part| !part.is_empty())
                    .map(str::to_string),
            );
        }
        Self {
            segments: normalized,
        }
    }

    /// Get the segments of this UID.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The leading segment, which is always the owning project's name.
    pub fn project_name(&self) -> Option<&str> {
        self.segments.first().map(|s| s.as_str())
    }

    /// Get the file name (last segment), if any.
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }
}

impl fmt::Display for UidPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl From<UidPath> for String {
    fn from(uid: UidPath) -> Self {
        uid.to_string()
    }
}

impl TryFrom<String> for UidPath {
    type Error = UidPathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl std::str::FromStr for UidPath {
    type Err = UidPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Split `path` into UTF-8 segments relative to `base`.
pub fn relative_segments(base: &Path, path: &Path) -> Result<Vec<String>, UidPathError> {
    let relative = path
        .strip_prefix(base)
        .map_err(|_| UidPathError::NotRelativeTo(base.to_path_buf()))?;

    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .map(|part| {
            part.to_str()
                .map(|s| s.to_string())
                .ok_or(UidPathError::InvalidUtf8)
        })
        .collect()
}

/// Any path form a caller may hand the project manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MixedPath {
    Absolute(PathBuf),
    Uid(UidPath),
    Url(Url),
}

impl MixedPath {
    /// Classify a raw string: absolute paths first, then URLs, then UIDs.
    pub fn parse(raw: &str) -> Result<Self, UidPathError> {
        let path = Path::new(raw);
        if path.is_absolute() {
            return Ok(Self::Absolute(path.to_path_buf()));
        }
        if raw.contains("://") {
            if let Ok(url) = Url::parse(raw) {
                return Ok(Self::Url(url));
            }
        }
        UidPath::new(raw).map(Self::Uid)
    }

    pub fn as_uid(&self) -> Option<&UidPath> {
        match self {
            Self::Uid(uid) => Some(uid),
            _ => None,
        }
    }

    pub fn as_absolute(&self) -> Option<&Path> {
        match self {
            Self::Absolute(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for MixedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute(path) => write!(f, "{}", path.display()),
            Self::Uid(uid) => write!(f, "{}", uid),
            Self::Url(url) => write!(f, "{}", url),
        }
    }
}

impl From<UidPath> for MixedPath {
    fn from(uid: UidPath) -> Self {
        Self::Uid(uid)
    }
}

impl From<PathBuf> for MixedPath {
    fn from(path: PathBuf) -> Self {
        Self::Absolute(path)
    }
}

impl From<Url> for MixedPath {
    fn from(url: Url) -> Self {
        Self::Url(url)
    }
}

/// Errors that can occur when working with UID paths.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UidPathError {
    #[error("Invalid character in UID: {0:?}")]
    InvalidCharacter(char),

    #[error("Path is not relative to base: {}", .0.display())]
    NotRelativeTo(PathBuf),

    #[error("Path contains invalid UTF-8")]
    InvalidUtf8,

    #[error("UID escapes its project")]
    EscapesRoot,

    #[error("UID has no segments")]
    Empty,
}
