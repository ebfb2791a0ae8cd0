//! Comma separated ID lists stored in ACF text fields.
//!
//! WordPress custom fields cannot hold arrays through the REST API in a
//! portable way, so reactions and favorites are stored as strings like
//! `"12,40,7"`. [`IdList`] is the typed view of such a string: a set of IDs
//! that remembers first-insertion order and never holds the same ID twice.

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const SEPARATOR: char = ',';

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdList {
    ids: Vec<String>,
}

impl IdList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw ACF value. Tokens are trimmed, empty tokens and repeats are dropped.
    pub fn decode(raw: &str) -> Self {
        let mut list = Self::new();
        for token in raw.split(SEPARATOR) {
            list.insert(token);
        }
        list
    }

    /// Encode back to the stored representation.
    pub fn encode(&self) -> String {
        self.ids.join(",")
    }

    /// Adds an ID. Returns false if it was already present or is not storable.
    pub fn insert(&mut self, id: impl AsRef<str>) -> bool {
        let id = id.as_ref().trim();
        if id.is_empty() || id.contains(SEPARATOR) || self.contains(id) {
            return false;
        }
        self.ids.push(id.to_owned());
        true
    }

    /// Removes an ID. Returns false if it was not present.
    pub fn remove(&mut self, id: impl AsRef<str>) -> bool {
        let id = id.as_ref().trim();
        let before = self.ids.len();
        self.ids.retain(|existing| existing != id);
        self.ids.len() != before
    }

    pub fn contains(&self, id: impl AsRef<str>) -> bool {
        let id = id.as_ref().trim();
        self.ids.iter().any(|existing| existing == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Parses every token as `T`, skipping tokens that do not parse.
    pub fn to_ids<T: FromStr>(&self) -> Vec<T> {
        self.ids.iter().filter_map(|id| id.parse().ok()).collect()
    }
}

impl fmt::Display for IdList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl<S: AsRef<str>> FromIterator<S> for IdList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = Self::new();
        for id in iter {
            list.insert(id);
        }
        list
    }
}

impl Serialize for IdList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for IdList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(IdListVisitor)
    }
}

/// ACF hands back empty fields as `null`, `false` or `""`, single numeric
/// values as numbers, and some older records as arrays.
struct IdListVisitor;

impl<'de> Visitor<'de> for IdListVisitor {
    type Value = IdList;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a comma separated list of ids")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<IdList, E> {
        Ok(IdList::decode(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<IdList, E> {
        Ok(IdList::decode(&v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<IdList, E> {
        Ok(IdList::decode(&v.to_string()))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<IdList, E> {
        Ok(IdList::new())
    }

    fn visit_none<E: de::Error>(self) -> Result<IdList, E> {
        Ok(IdList::new())
    }

    fn visit_unit<E: de::Error>(self) -> Result<IdList, E> {
        Ok(IdList::new())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<IdList, A::Error> {
        let mut list = IdList::new();
        while let Some(value) = seq.next_element::<serde_json::Value>()? {
            match value {
                serde_json::Value::String(s) => list.insert(s),
                serde_json::Value::Number(n) => list.insert(n.to_string()),
                _ => false,
            };
        }
        Ok(list)
    }
}

/// Accepts an ACF object, or the `[]`/`false`/`null` WordPress emits when a
/// record has no field values yet.
pub fn deserialize_fields<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + serde::de::DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Object(_) => serde_json::from_value(value).map_err(de::Error::custom),
        _ => Ok(T::default()),
    }
}

/// Reads an ACF scalar that may arrive as string, number, bool or null.
/// ACF reports unset fields as `false`, so only `true` maps to a value.
pub fn deserialize_loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(true) => Some("1".to_owned()),
        _ => None,
    })
}
