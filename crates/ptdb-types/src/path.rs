use std::fmt;
use std::str::FromStr;

use crate::error::{PathError, PathResult};

/// The root sentinel: addresses the whole record set.
pub const ROOT: &str = ".";

/// A resolved address into the record tree.
///
/// Paths are written as dot-separated segments (`a.b.c`), each naming a key
/// in successive nested mappings. The lone `.` addresses the record set
/// itself. There is no escaping, so a key containing `.` is unreachable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DbPath {
    /// The whole record set.
    Root,
    /// A non-empty sequence of mapping keys.
    Segments(Vec<String>),
}

impl DbPath {
    /// Parse a dotted path string.
    ///
    /// `.` (ignoring surrounding whitespace) is the root. Every other input
    /// is split on `.`, and any empty segment makes the path malformed.
    pub fn parse(path: &str) -> PathResult<Self> {
        if path.trim() == ROOT {
            return Ok(Self::Root);
        }

        let segments: Vec<String> = path.split('.').map(str::to_owned).collect();
        if let Some(index) = segments.iter().position(String::is_empty) {
            return Err(PathError::EmptySegment {
                path: path.to_owned(),
                index,
            });
        }
        Ok(Self::Segments(segments))
    }

    /// Build a path from segments that were already split by the caller.
    ///
    /// An empty iterator yields [`DbPath::Root`].
    pub fn from_segments<I, S>(segments: I) -> PathResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Ok(Self::Root);
        }

        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(PathError::EmptySegment {
                    path: segments.join("."),
                    index,
                });
            }
            if segment.contains('.') {
                return Err(PathError::DotInSegment {
                    segment: segment.clone(),
                });
            }
        }
        Ok(Self::Segments(segments))
    }

    /// Returns `true` for the root sentinel.
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }

    /// The segments of this path; empty for the root.
    pub fn segments(&self) -> &[String] {
        match self {
            Self::Root => &[],
            Self::Segments(segments) => segments,
        }
    }

    /// Split into the intermediate segments and the final key.
    ///
    /// Returns `None` for the root.
    pub fn split_last(&self) -> Option<(&String, &[String])> {
        self.segments().split_last()
    }
}

impl fmt::Display for DbPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str(ROOT),
            Self::Segments(segments) => f.write_str(&segments.join(".")),
        }
    }
}

impl FromStr for DbPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for DbPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<String> for DbPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&String> for DbPath {
    type Error = PathError;

    fn try_from(value: &String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Anything an engine operation accepts as a path: dotted strings or an
/// already-resolved [`DbPath`].
pub trait IntoDbPath {
    fn into_db_path(self) -> PathResult<DbPath>;
}

impl IntoDbPath for DbPath {
    fn into_db_path(self) -> PathResult<DbPath> {
        Ok(self)
    }
}

impl IntoDbPath for &DbPath {
    fn into_db_path(self) -> PathResult<DbPath> {
        Ok(self.clone())
    }
}

impl IntoDbPath for &str {
    fn into_db_path(self) -> PathResult<DbPath> {
        DbPath::parse(self)
    }
}

impl IntoDbPath for String {
    fn into_db_path(self) -> PathResult<DbPath> {
        DbPath::parse(&self)
    }
}

impl IntoDbPath for &String {
    fn into_db_path(self) -> PathResult<DbPath> {
        DbPath::parse(self)
    }
}
