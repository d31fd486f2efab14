//! Dotted field paths and the tree operations that read and write them.
//!
//! A [`FieldPath`] such as `vitals.heartRate` names one leaf or subtree of a
//! [`Record`]. [`get_at_path`] and [`set_at_path`] walk a record one segment
//! at a time. A missing segment is a normal condition, never an error.

use crate::error::{ConsentError, ConsentResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A holder-owned structured record.
pub type Record = Map<String, Value>;

const SEPARATOR: char = '.';

/// An ordered, non-empty sequence of non-empty segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a dotted identifier, rejecting empty input and empty segments.
    pub fn parse(path: &str) -> ConsentResult<Self> {
        let segments: Vec<String> = path.split(SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ConsentError::InvalidFieldPath {
                path: path.to_string(),
            });
        }
        Ok(Self { segments })
    }

    /// Builds a path from already-split segments.
    pub fn from_segments<I, S>(segments: I) -> ConsentResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let invalid = segments.is_empty()
            || segments
                .iter()
                .any(|s| s.is_empty() || s.contains(SEPARATOR));
        if invalid {
            return Err(ConsentError::InvalidFieldPath {
                path: segments.join("."),
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Never true for a parsed path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Canonical dotted form.
    pub fn as_dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_dotted())
    }
}

impl FromStr for FieldPath {
    type Err = ConsentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = ConsentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.as_dotted()
    }
}

/// A set of distinct field paths.
///
/// Iteration is in segment order, so two sets with the same members always
/// serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet {
    paths: BTreeSet<FieldPath>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses every dotted string, failing on the first invalid one.
    pub fn parse_all<I, S>(paths: I) -> ConsentResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        paths
            .into_iter()
            .map(|p| FieldPath::parse(p.as_ref()))
            .collect()
    }

    pub fn insert(&mut self, path: FieldPath) -> bool {
        self.paths.insert(path)
    }

    pub fn contains(&self, path: &FieldPath) -> bool {
        self.paths.contains(path)
    }

    /// Membership test by dotted string.
    pub fn contains_dotted(&self, path: &str) -> bool {
        FieldPath::parse(path)
            .map(|p| self.paths.contains(&p))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldPath> {
        self.paths.iter()
    }

    pub fn union(&self, other: &FieldSet) -> FieldSet {
        self.paths.union(&other.paths).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    /// Canonical dotted strings, in iteration order.
    pub fn to_dotted(&self) -> Vec<String> {
        self.paths.iter().map(FieldPath::as_dotted).collect()
    }
}

impl FromIterator<FieldPath> for FieldSet {
    fn from_iter<T: IntoIterator<Item = FieldPath>>(iter: T) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a FieldPath;
    type IntoIter = std::collections::btree_set::Iter<'a, FieldPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.to_dotted().join(", "))
    }
}

/// Reads the value at `path`, or `None` if any segment is missing or an
/// intermediate value is not an object.
pub fn get_at_path<'a>(record: &'a Record, path: &FieldPath) -> Option<&'a Value> {
    let (last, parents) = path.segments.split_last()?;
    let mut current = record;
    for segment in parents {
        current = current.get(segment)?.as_object()?;
    }
    current.get(last)
}

/// Writes `value` at `path`, creating an empty object for every missing
/// intermediate segment.
///
/// An intermediate that exists but is not an object is replaced by an empty
/// object. Callers accumulate into a fresh destination, so this only happens
/// when the destination was built inconsistently.
pub fn set_at_path(record: &mut Record, path: &FieldPath, value: Value) {
    let Some((last, parents)) = path.segments.split_last() else {
        return;
    };
    let mut current = record;
    for segment in parents {
        let slot = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(map) = slot else {
            return;
        };
        current = map;
    }
    current.insert(last.clone(), value);
}
