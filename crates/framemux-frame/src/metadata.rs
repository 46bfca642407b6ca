use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metadata key carrying the operation path of a call.
pub const PATH: &str = ":path";

/// Metadata key carrying the numeric status of a reply.
pub const STATUS: &str = ":status";

/// String-keyed, string-list-valued metadata carried in HEADERS frames.
///
/// On the wire this is a UTF-8 JSON object mapping keys to arrays of
/// strings. An empty map is sent as a zero-length block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, Vec<String>>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Metadata::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// All values for `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// The value for `key` if it holds exactly one.
    pub fn scalar(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some([value]) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Replace all values for `key` with a single value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), vec![value.into()]);
    }

    /// Add a value to the end of `key`'s list.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Encode as a HEADERS block.
    pub fn encode(&self) -> Result<Bytes> {
        if self.is_empty() {
            return Ok(Bytes::new());
        }
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Decode a HEADERS block. A zero-length block is an empty map.
    pub fn decode(block: &[u8]) -> Result<Self> {
        if block.is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_json::from_slice(block)?)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut md = Self::new();
        for (key, value) in iter {
            md.append(key, value);
        }
        md
    }
}

impl From<BTreeMap<String, Vec<String>>> for Metadata {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self(map)
    }
}
