/// Film catalog
///
/// Film records, their persistence, and the create/edit/delete use cases
/// that keep each record and its poster file in step.

pub mod repository;
pub mod service;

pub use repository::{FilmRepository, SqliteFilmRepository};
pub use service::{FilmService, PosterUpload};

use crate::attachment_store::PosterExtension;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A catalog entry, owned by the user who created it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    pub id: Uuid,
    pub creator_id: String,
    pub name: String,
    pub description: Option<String>,
    pub year: Option<String>,
    pub producer: Option<String>,
    /// Public path of the stored poster, e.g. `/attachments/<hex>.png`
    pub poster_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Film {
    /// New film with a freshly generated id
    pub fn new(creator_id: &str, fields: FilmFields) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            creator_id: creator_id.to_string(),
            name: fields.name,
            description: fields.description,
            year: fields.year,
            producer: fields.producer,
            poster_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the descriptive fields
    pub fn apply(&mut self, fields: FilmFields) {
        self.name = fields.name;
        self.description = fields.description;
        self.year = fields.year;
        self.producer = fields.producer;
        self.updated_at = Utc::now();
    }

    /// Extension of the current poster, if any
    pub fn poster_extension(&self) -> Option<PosterExtension> {
        self.poster_path
            .as_deref()
            .and_then(PosterExtension::from_public_path)
    }
}

/// Caller-editable film fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
pub struct FilmFields {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub year: Option<String>,
    pub producer: Option<String>,
}

impl FilmFields {
    /// Trim input and treat blank optional fields as absent
    pub fn normalized(self) -> Self {
        fn blank_to_none(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            name: self.name.trim().to_string(),
            description: blank_to_none(self.description),
            year: blank_to_none(self.year),
            producer: blank_to_none(self.producer),
        }
    }
}

/// The owning user as shown in listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorInfo {
    pub id: String,
    pub user_name: Option<String>,
}

/// A film with its creator resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmSummary {
    #[serde(flatten)]
    pub film: Film,
    pub creator: CreatorInfo,
}

/// One page of the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmPage {
    pub items: Vec<FilmSummary>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_fields() {
        let fields = FilmFields {
            name: "  Alien ".to_string(),
            description: Some("   ".to_string()),
            year: Some(" 1979".to_string()),
            producer: None,
        }
        .normalized();

        assert_eq!(fields.name, "Alien");
        assert_eq!(fields.description, None);
        assert_eq!(fields.year.as_deref(), Some("1979"));
    }

    #[test]
    fn test_blank_name_is_invalid() {
        let fields = FilmFields {
            name: "   ".to_string(),
            ..Default::default()
        }
        .normalized();

        assert!(fields.validate().is_err());
    }

    #[test]
    fn test_poster_extension_from_path() {
        let mut film = Film::new("alice", FilmFields {
            name: "Heat".to_string(),
            ..Default::default()
        });
        assert_eq!(film.poster_extension(), None);

        film.poster_path = Some(format!("/attachments/{}.gif", film.id.simple()));
        assert_eq!(film.poster_extension().map(|e| e.as_str()), Some(".gif"));
    }

    #[test]
    fn test_new_films_get_distinct_ids() {
        let a = Film::new("alice", FilmFields::default());
        let b = Film::new("alice", FilmFields::default());
        assert_ne!(a.id, b.id);
    }
}
