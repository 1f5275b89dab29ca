//! Pipeline catalogue entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::PipelineId;
use crate::status::PipelineStatus;

/// Kind of work a pipeline performs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineType {
    #[serde(rename = "TEXT2IMAGE")]
    Text2Image,
    /// Any type this client does not know about yet.
    #[serde(other)]
    Other,
}

impl PipelineType {
    /// Value used for the `type` query filter.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineType::Text2Image => "TEXT2IMAGE",
            PipelineType::Other => "OTHER",
        }
    }
}

impl core::fmt::Display for PipelineType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub name_en: Option<String>,
}

/// A pipeline as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDescriptor {
    pub id: PipelineId,
    pub name: String,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_en: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub version: f64,
    pub status: PipelineStatus,
    #[serde(rename = "type")]
    pub pipeline_type: PipelineType,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

impl PipelineDescriptor {
    pub fn new(id: PipelineId, name: impl Into<String>, pipeline_type: PipelineType) -> Self {
        Self {
            id,
            name: name.into(),
            name_en: None,
            description: None,
            description_en: None,
            tags: Vec::new(),
            version: 1.0,
            status: PipelineStatus::Active,
            pipeline_type,
            created_date: None,
            last_modified: None,
        }
    }

    pub fn with_status(mut self, status: PipelineStatus) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_server_listing_entry() {
        let id = PipelineId::random();
        let raw = json!({
            "id": id.to_string(),
            "name": "Kandinsky",
            "nameEn": "Kandinsky",
            "description": "",
            "descriptionEn": "",
            "tags": [{ "name": "t2i", "name_en": "t2i" }],
            "version": 3.1,
            "status": "ACTIVE",
            "type": "TEXT2IMAGE",
            "createdDate": "2024-08-01T10:00:00Z",
            "lastModified": "2024-09-01T10:00:00Z",
        });

        let parsed: PipelineDescriptor = serde_json::from_value(raw).unwrap();

        assert_eq!(parsed.id, id);
        assert_eq!(parsed.pipeline_type, PipelineType::Text2Image);
        assert_eq!(parsed.tags.len(), 1);
        assert!(parsed.created_date.is_some());
    }

    #[test]
    fn unknown_pipeline_type_maps_to_other() {
        let parsed: PipelineType = serde_json::from_value(json!("TEXT2VIDEO")).unwrap();
        assert_eq!(parsed, PipelineType::Other);
    }
}
