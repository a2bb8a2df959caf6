//! Entities and their structured keys

use crate::KeyError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Width of the region segment (e.g. "59")
pub const REGION_WIDTH: usize = 2;

/// Width of the type segment (e.g. "RS")
pub const KIND_WIDTH: usize = 2;

/// Minimum width of the zero-padded ordinal segment (e.g. "0001")
pub const ORDINAL_WIDTH: usize = 4;

/// A discovered entity
///
/// The key is carried as the `code` field on the wire and in snapshots. Every
/// other field is kept verbatim; the crawler never interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "code")]
    pub key: String,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Entity {
    /// Creates an entity with no attributes
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attributes: Map::new(),
        }
    }

    /// Adds an attribute, replacing any previous value under the same name
    pub fn with_attribute(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Builds an entity from the `data` object of a search suggestion
    ///
    /// Returns `None` when the suggestion carries no usable key (missing,
    /// null or empty `code`).
    pub fn from_suggestion_data(mut data: Map<String, Value>) -> Option<Self> {
        match data.remove("code") {
            Some(Value::String(code)) if !code.trim().is_empty() => Some(Self {
                key: code,
                attributes: data,
            }),
            _ => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Parses the key into its structured segments, if it has them
    pub fn structured_key(&self) -> Option<StructuredKey> {
        StructuredKey::parse(&self.key).ok()
    }
}

/// A key made of a fixed-width region, a fixed-width type and an ordinal
///
/// `59RS0001` is region `59`, type `RS`, ordinal `1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructuredKey {
    pub region: String,
    pub kind: String,
    pub ordinal: u32,
}

impl StructuredKey {
    pub fn new(region: impl Into<String>, kind: impl Into<String>, ordinal: u32) -> Self {
        Self {
            region: region.into(),
            kind: kind.into(),
            ordinal,
        }
    }

    /// Parses a key such as `59RS0001`
    ///
    /// The region must be ASCII digits and the type ASCII uppercase letters;
    /// everything after them must be a decimal ordinal.
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let chars: Vec<char> = key.chars().collect();
        if chars.len() <= REGION_WIDTH + KIND_WIDTH {
            return Err(KeyError::TooShort(key.to_string()));
        }

        let region: String = chars[..REGION_WIDTH].iter().collect();
        let kind: String = chars[REGION_WIDTH..REGION_WIDTH + KIND_WIDTH]
            .iter()
            .collect();
        let digits: String = chars[REGION_WIDTH + KIND_WIDTH..].iter().collect();

        if !region.chars().all(|c| c.is_ascii_digit())
            || !kind.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(KeyError::Malformed(key.to_string()));
        }

        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(KeyError::InvalidOrdinal(key.to_string()));
        }

        let ordinal = digits
            .parse::<u32>()
            .map_err(|_| KeyError::InvalidOrdinal(key.to_string()))?;

        Ok(Self {
            region,
            kind,
            ordinal,
        })
    }

    /// The region+type prefix shared by all keys of one series
    pub fn prefix(&self) -> String {
        format!("{}{}", self.region, self.kind)
    }

    /// Formats a key from a prefix and an ordinal, zero-padding the ordinal
    pub fn format_key(prefix: &str, ordinal: u32) -> String {
        format!("{}{:0width$}", prefix, ordinal, width = ORDINAL_WIDTH)
    }
}

impl fmt::Display for StructuredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Self::format_key(&self.prefix(), self.ordinal))
    }
}
