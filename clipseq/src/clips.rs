use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SeqError};
use crate::time::TimeValue;

/// Importance levels map directly onto video track numbers.
pub const MIN_IMPORTANCE: u8 = 1;
pub const MAX_IMPORTANCE: u8 = 3;

/// Top-level clip list document: `{ "clips": [ ... ] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct ClipList {
    pub clips: Vec<ClipRecord>,
}

/// A single clip as supplied by the upstream clip producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct ClipRecord {
    /// Clip start, as seconds or a time string (`MM:SS`).
    #[serde(default)]
    pub start_time: Option<TimeValue>,
    /// Clip end, as seconds or a time string (`MM:SS`).
    #[serde(default)]
    pub end_time: Option<TimeValue>,
    /// Clip title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 1 = high, 2 = medium, 3 = low. Anything else is treated as 1.
    #[serde(
        default,
        deserialize_with = "lenient_importance",
        skip_serializing_if = "Option::is_none"
    )]
    #[cfg_attr(feature = "jsonschema", schemars(with = "Option<i64>"))]
    pub importance: Option<i64>,
}

impl ClipRecord {
    pub fn new(start: TimeValue, end: TimeValue, name: &str, importance: i64) -> Self {
        ClipRecord {
            start_time: Some(start),
            end_time: Some(end),
            name: Some(name.to_string()),
            importance: Some(importance),
        }
    }

    /// Importance clamped to the supported range (1 when absent or out of range).
    pub fn track_level(&self) -> u8 {
        match self.importance {
            Some(i) if (MIN_IMPORTANCE as i64..=MAX_IMPORTANCE as i64).contains(&i) => i as u8,
            _ => MIN_IMPORTANCE,
        }
    }

    /// Clip name, or `Clip_<position>` (1-based) when none was given.
    pub fn display_name(&self, position: usize) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Clip_{}", position),
        }
    }
}

/// Accept integral numbers only; strings and anything else become `None`.
fn lenient_importance<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        _ => None,
    })
}

impl ClipList {
    pub fn from_json(text: &str) -> serde_json::Result<ClipList> {
        serde_json::from_str(text)
    }

    /// Load a clip list from a JSON file.
    pub fn load(path: &Path) -> Result<ClipList> {
        let clip_list_error = |message: String| SeqError::ClipList {
            path: path.to_path_buf(),
            message,
        };
        let text = fs::read_to_string(path).map_err(|e| clip_list_error(e.to_string()))?;
        ClipList::from_json(&text).map_err(|e| clip_list_error(e.to_string()))
    }
}
