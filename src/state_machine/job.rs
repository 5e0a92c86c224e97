use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::composition::Composition;

/// Fields of a fetched item that never travel into a reading.
const TRANSIENT_FIELDS: &[&str] = &["date"];

/// Keys a reading sets itself; stale copies from the item are dropped.
const READING_FIELDS: &[&str] = &[
    "tag_id",
    "declare_purity",
    "reading",
    "gold",
    "silver",
    "copper",
    "zinc",
];

/// One piece under test, as returned by the job service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobItem {
    pub tag_id: String,
    /// Karat prefix followed by fineness, e.g. `"22K916"`.
    pub declare_purity: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl JobItem {
    /// Fineness part of the declared purity (`"22K916"` → `"916"`).
    pub fn declared_fineness(&self) -> &str {
        self.declare_purity
            .char_indices()
            .nth(3)
            .map_or("", |(i, _)| &self.declare_purity[i..])
    }
}

/// One synthesized measurement of a [`JobItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub tag_id: String,
    pub declare_purity: String,
    /// Ordinal of the reading for its item, 1 or 2.
    pub reading: u8,
    #[serde(flatten)]
    pub composition: Composition,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Reading {
    pub fn new(item: &JobItem, reading: u8, composition: Composition) -> Self {
        let details = item
            .details
            .iter()
            .filter(|(k, _)| {
                !TRANSIENT_FIELDS.contains(&k.as_str()) && !READING_FIELDS.contains(&k.as_str())
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            tag_id: item.tag_id.clone(),
            declare_purity: item.declared_fineness().to_string(),
            reading,
            composition,
            details,
        }
    }
}

/// Request parameters of the job in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMeta {
    pub request_num: String,
    pub job_num: String,
    /// Machine selector as given by the caller, e.g. `"machine1"`.
    pub machine: String,
}
