/// Film persistence
use crate::{
    error::{CatalogError, CatalogResult},
    films::{CreatorInfo, Film, FilmPage, FilmSummary},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// Data access for film records. Holds no business rules.
#[async_trait]
pub trait FilmRepository: Send + Sync {
    async fn create(&self, film: &Film) -> CatalogResult<Film>;

    async fn get_by_id(&self, id: Uuid) -> CatalogResult<Option<Film>>;

    /// Films in insertion order with their creators resolved. `page` is 1-based.
    async fn get_page(&self, page: u32, page_size: u32) -> CatalogResult<FilmPage>;

    /// Fails with `NotFound` if the film does not exist
    async fn update(&self, film: &Film) -> CatalogResult<()>;

    /// Fails with `NotFound` if the film does not exist
    async fn delete(&self, id: Uuid) -> CatalogResult<()>;
}

/// SQLite-backed film repository
#[derive(Clone)]
pub struct SqliteFilmRepository {
    db: SqlitePool,
}

impl SqliteFilmRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

const FILM_COLUMNS: &str = "f.id, f.creator_id, f.name, f.description, f.year, f.producer, \
                            f.poster_path, f.created_at, f.updated_at";

fn parse_timestamp(value: &str) -> CatalogResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CatalogError::Internal(format!("Invalid timestamp {}: {}", value, e)))
}

fn film_from_row(row: &SqliteRow) -> CatalogResult<Film> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Film {
        id: Uuid::parse_str(&id)
            .map_err(|e| CatalogError::Internal(format!("Invalid film id {}: {}", id, e)))?,
        creator_id: row.try_get("creator_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        year: row.try_get("year")?,
        producer: row.try_get("producer")?,
        poster_path: row.try_get("poster_path")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait]
impl FilmRepository for SqliteFilmRepository {
    async fn create(&self, film: &Film) -> CatalogResult<Film> {
        sqlx::query(
            r#"
            INSERT INTO films (id, creator_id, name, description, year, producer, poster_path, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(film.id.to_string())
        .bind(&film.creator_id)
        .bind(&film.name)
        .bind(&film.description)
        .bind(&film.year)
        .bind(&film.producer)
        .bind(&film.poster_path)
        .bind(film.created_at.to_rfc3339())
        .bind(film.updated_at.to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(film.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> CatalogResult<Option<Film>> {
        let row = sqlx::query(&format!("SELECT {} FROM films f WHERE f.id = ?", FILM_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(film_from_row).transpose()
    }

    async fn get_page(&self, page: u32, page_size: u32) -> CatalogResult<FilmPage> {
        let total_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM films")
            .fetch_one(&self.db)
            .await?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);

        let rows = sqlx::query(&format!(
            r#"
            SELECT {}, u.user_name
            FROM films f
            LEFT JOIN users u ON u.id = f.creator_id
            ORDER BY f.rowid
            LIMIT ? OFFSET ?
            "#,
            FILM_COLUMNS
        ))
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let items = rows
            .iter()
            .map(|row| -> CatalogResult<FilmSummary> {
                let film = film_from_row(row)?;
                let creator = CreatorInfo {
                    id: film.creator_id.clone(),
                    user_name: row.try_get("user_name")?,
                };
                Ok(FilmSummary { film, creator })
            })
            .collect::<CatalogResult<Vec<_>>>()?;

        let total_count = total_count.max(0) as u64;
        let total_pages = total_count.div_ceil(u64::from(page_size.max(1))) as u32;

        Ok(FilmPage {
            items,
            page,
            page_size,
            total_count,
            total_pages,
        })
    }

    async fn update(&self, film: &Film) -> CatalogResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE films
            SET name = ?,
                description = ?,
                year = ?,
                producer = ?,
                poster_path = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&film.name)
        .bind(&film.description)
        .bind(&film.year)
        .bind(&film.producer)
        .bind(&film.poster_path)
        .bind(film.updated_at.to_rfc3339())
        .bind(film.id.to_string())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(format!("Film {} not found", film.id)));
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> CatalogResult<()> {
        let result = sqlx::query("DELETE FROM films WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(format!("Film {} not found", id)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, films::FilmFields};
    use tempfile::tempdir;

    fn film(creator: &str, name: &str) -> Film {
        Film::new(creator, FilmFields {
            name: name.to_string(),
            year: Some("1999".to_string()),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let dir = tempdir().unwrap();
        let repo = SqliteFilmRepository::new(db::test_pool(dir.path()).await);

        let mut created = film("alice", "The Matrix");
        created.poster_path = Some(format!("/attachments/{}.jpg", created.id.simple()));
        repo.create(&created).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "The Matrix");
        assert_eq!(fetched.creator_id, "alice");
        assert_eq!(fetched.poster_path, created.poster_path);
        assert_eq!(fetched.created_at.timestamp(), created.created_at.timestamp());

        assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_with_unknown_creator_fails() {
        let dir = tempdir().unwrap();
        let repo = SqliteFilmRepository::new(db::test_pool(dir.path()).await);

        let result = repo.create(&film("mallory", "Ghost")).await;
        assert!(matches!(result, Err(CatalogError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let dir = tempdir().unwrap();
        let repo = SqliteFilmRepository::new(db::test_pool(dir.path()).await);
        let missing = film("alice", "Nowhere");

        assert!(matches!(repo.update(&missing).await, Err(CatalogError::NotFound(_))));
        assert!(matches!(repo.delete(missing.id).await, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_persists_fields() {
        let dir = tempdir().unwrap();
        let repo = SqliteFilmRepository::new(db::test_pool(dir.path()).await);

        let mut f = film("alice", "Draft");
        repo.create(&f).await.unwrap();

        f.apply(FilmFields {
            name: "Final".to_string(),
            producer: Some("Studio".to_string()),
            ..Default::default()
        });
        repo.update(&f).await.unwrap();

        let fetched = repo.get_by_id(f.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Final");
        assert_eq!(fetched.producer.as_deref(), Some("Studio"));
        assert_eq!(fetched.year, None);
        assert_eq!(fetched.creator_id, "alice");
    }

    #[tokio::test]
    async fn test_paging_in_insertion_order() {
        let dir = tempdir().unwrap();
        let repo = SqliteFilmRepository::new(db::test_pool(dir.path()).await);

        let mut ids = Vec::new();
        for i in 1..=20 {
            let creator = if i % 2 == 0 { "bob" } else { "alice" };
            let f = film(creator, &format!("Film {}", i));
            ids.push(f.id);
            repo.create(&f).await.unwrap();
        }

        let first = repo.get_page(1, 15).await.unwrap();
        assert_eq!(first.items.len(), 15);
        assert_eq!(first.total_count, 20);
        assert_eq!(first.total_pages, 2);

        let second = repo.get_page(2, 15).await.unwrap();
        let names: Vec<_> = second.items.iter().map(|s| s.film.name.as_str()).collect();
        assert_eq!(names, vec!["Film 16", "Film 17", "Film 18", "Film 19", "Film 20"]);
        let second_ids: Vec<_> = second.items.iter().map(|s| s.film.id).collect();
        assert_eq!(second_ids, ids[15..].to_vec());

        // Creator resolved in the same query
        assert_eq!(second.items[0].creator.user_name.as_deref(), Some("Bob"));
        assert_eq!(second.items[1].creator.user_name.as_deref(), Some("Alice"));

        let beyond = repo.get_page(3, 15).await.unwrap();
        assert!(beyond.items.is_empty());
    }

    #[tokio::test]
    async fn test_empty_catalog_page() {
        let dir = tempdir().unwrap();
        let repo = SqliteFilmRepository::new(db::test_pool(dir.path()).await);

        let page = repo.get_page(1, 15).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 0);
        assert_eq!(page.total_pages, 0);
    }
}
