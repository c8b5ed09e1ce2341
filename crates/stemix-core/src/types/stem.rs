//! Stem sets: the named collection of stem locators for one song.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Ordered mapping from stem name to source locator.
///
/// Insertion order is preserved and defines which stem is "first". When the
/// set is read from JSON, document order is kept and entries with a missing
/// or empty locator are skipped. Locators are anything a
/// [`crate::StemSource`] can resolve to raw audio bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StemSet {
    #[serde(deserialize_with = "present_locators")]
    stems: IndexMap<String, String>,
}

impl StemSet {
    /// Create an empty stem set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a stem. An existing stem with the same name keeps its position
    /// and gets the new locator.
    pub fn insert(&mut self, name: impl Into<String>, locator: impl Into<String>) {
        self.stems.insert(name.into(), locator.into());
    }

    /// Builder-style [`StemSet::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, locator: impl Into<String>) -> Self {
        self.insert(name, locator);
        self
    }

    /// Get the locator for a stem.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.stems.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stems.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }

    /// The first stem in order, as `(name, locator)`.
    pub fn first(&self) -> Option<(&str, &str)> {
        self.stems
            .first()
            .map(|(name, locator)| (name.as_str(), locator.as_str()))
    }

    /// `(name, locator)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.stems
            .iter()
            .map(|(name, locator)| (name.as_str(), locator.as_str()))
    }

    /// Stem names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stems.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StemSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            stems: iter
                .into_iter()
                .map(|(name, locator)| (name.into(), locator.into()))
                .collect(),
        }
    }
}

/// The API reports stems it did not produce as `null` or `""`.
fn present_locators<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<IndexMap<String, String>, D::Error> {
    let raw = IndexMap::<String, Option<String>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, locator)| locator.filter(|l| !l.is_empty()).map(|l| (name, l)))
        .collect())
}
