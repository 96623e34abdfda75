pub mod config;
pub mod db;
pub mod embedding;
pub mod logging;
pub mod normalize;
pub mod recommend;
pub mod scoring;
pub mod search;
pub mod similarity;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The three entity collections served by the recommendation core.
/// The lowercase form doubles as the table name and feeds the
/// `{collection}_vector_index` naming convention.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Candidates,
    Jobs,
    Projects,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Candidates, EntityKind::Jobs, EntityKind::Projects];

    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Candidates => "candidates",
            EntityKind::Jobs => "jobs",
            EntityKind::Projects => "projects",
        }
    }
}

// Commonly used data model for the matching and recommendation functions.
// One shape for candidates, jobs and projects; fields a given collection
// does not use stay None.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    pub display_name: Option<String>,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub skills: Vec<String>,
    pub experience_years: Option<f64>,
    pub education_level: Option<String>,
    pub location: Option<String>,
    pub region: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub embedding_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity {
    /// Text sent to the embedding service. Field order is part of the
    /// embedding contract; changing it invalidates every stored vector.
    pub fn embedding_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        for field in [&self.display_name, &self.headline, &self.description] {
            if let Some(value) = field.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                parts.push(value.to_string());
            }
        }

        if !self.skills.is_empty() {
            parts.push(format!("skills: {}", self.skills.join(", ")));
        }

        if let Some(location) = self.location.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            parts.push(format!("location: {location}"));
        }

        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_round_trips_through_strings() {
        for kind in EntityKind::ALL {
            let parsed: EntityKind = kind.collection().parse().expect("parse failed");
            assert_eq!(parsed, kind);
            assert_eq!(kind.to_string(), kind.collection());
        }
    }

    #[test]
    fn embedding_text_skips_empty_fields() {
        let entity = Entity {
            id: "c-1".into(),
            display_name: Some("Ada".into()),
            headline: Some("  ".into()),
            skills: vec!["rust".into(), "sql".into()],
            location: Some("Berlin".into()),
            ..Entity::default()
        };

        let text = entity.embedding_text();

        assert_eq!(text, "Ada\nskills: rust, sql\nlocation: Berlin");
    }

    #[test]
    fn embedding_text_is_empty_for_blank_entity() {
        assert_eq!(Entity::default().embedding_text(), "");
    }
}
