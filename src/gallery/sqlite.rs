//! SQLite gallery accessor

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::info;

use super::traits::{EnrollmentRecord, GalleryAccessor};
use crate::error::GalleryError;
use crate::verify::types::IdentityProfile;

/// Payload for enrolling or updating an identity.
#[derive(Debug, Clone, Default)]
pub struct NewEnrollment {
    pub identity_id: String,
    pub name: String,
    pub emergency_contact: Option<String>,
    pub blood_group: Option<String>,
    pub allergies: Option<String>,
    pub past_surgery: Option<String>,
    pub other_conditions: Option<String>,
    pub photo: Option<Vec<u8>>,
    pub template: Option<Vec<u8>>,
}

/// SQLite-backed gallery store.
pub struct SqliteGallery {
    pool: SqlitePool,
}

impl SqliteGallery {
    /// Open (or create) the gallery database at the given path.
    pub async fn new(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", db_path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .context("Failed to connect to SQLite gallery database")?;

        let gallery = Self { pool };
        gallery.initialize().await?;
        info!("Gallery database ready at {}", db_path);

        Ok(gallery)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS enrollments (
                identity_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                emergency_contact TEXT,
                blood_group TEXT,
                allergies TEXT,
                past_surgery TEXT,
                other_conditions TEXT,
                photo BLOB,
                template BLOB,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_enrollments_created ON enrollments(created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Insert or replace an enrollment. An updated photo or template is
    /// reflected on the very next verification call.
    pub async fn enroll(&self, enrollment: &NewEnrollment) -> Result<()> {
        let now = Self::now();
        sqlx::query(
            r#"
            INSERT INTO enrollments
                (identity_id, name, emergency_contact, blood_group, allergies,
                 past_surgery, other_conditions, photo, template, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(identity_id) DO UPDATE SET
                name = excluded.name,
                emergency_contact = excluded.emergency_contact,
                blood_group = excluded.blood_group,
                allergies = excluded.allergies,
                past_surgery = excluded.past_surgery,
                other_conditions = excluded.other_conditions,
                photo = excluded.photo,
                template = excluded.template,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&enrollment.identity_id)
        .bind(&enrollment.name)
        .bind(&enrollment.emergency_contact)
        .bind(&enrollment.blood_group)
        .bind(&enrollment.allergies)
        .bind(&enrollment.past_surgery)
        .bind(&enrollment.other_conditions)
        .bind(&enrollment.photo)
        .bind(&enrollment.template)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Total number of enrolled identities.
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM enrollments")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }
}

#[async_trait]
impl GalleryAccessor for SqliteGallery {
    async fn snapshot(&self) -> Result<Vec<EnrollmentRecord>, GalleryError> {
        // Enrollment order gives a fixed, reproducible enumeration; the
        // matcher's tie-break depends on it.
        let rows = sqlx::query(
            r#"
            SELECT identity_id, template, photo
            FROM enrollments
            WHERE (photo IS NOT NULL AND length(photo) > 0)
               OR (template IS NOT NULL AND length(template) > 0)
            ORDER BY created_at ASC, identity_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| EnrollmentRecord {
                identity_id: row.get("identity_id"),
                template: row.get("template"),
                photo: row.get("photo"),
            })
            .collect())
    }

    async fn profile(&self, identity_id: &str) -> Result<Option<IdentityProfile>, GalleryError> {
        let row = sqlx::query(
            r#"
            SELECT identity_id, name, emergency_contact, blood_group,
                   allergies, past_surgery, other_conditions
            FROM enrollments
            WHERE identity_id = ?
            "#,
        )
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| IdentityProfile {
            identity_id: row.get("identity_id"),
            name: row.get("name"),
            emergency_contact: row.get("emergency_contact"),
            blood_group: row.get("blood_group"),
            allergies: row.get("allergies"),
            past_surgery: row.get("past_surgery"),
            other_conditions: row.get("other_conditions"),
        }))
    }
}
