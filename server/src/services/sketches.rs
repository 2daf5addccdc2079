//! Saved sketch persistence.
//!
//! DESIGN
//! ======
//! A user can save named snapshots of a sketch and load them back into a
//! room later. Storage sits behind [`SketchRepository`] so the server runs
//! against Postgres in production and an in-memory map in tests or when no
//! database is configured. Every operation is scoped to the calling user:
//! another user's sketch id behaves exactly like a missing one.

#[cfg(test)]
#[path = "sketches_test.rs"]
mod sketches_test;

use async_trait::async_trait;
use serde::Deserialize;
use sketch::error::ErrorCode;
use sketch::model::{SketchSnapshot, UserSketch};
use sqlx::PgPool;
use sqlx::types::Json;
use tokio::sync::RwLock;
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SketchError {
    #[error("sketch not found: {0}")]
    NotFound(Uuid),
    #[error("sketch name must not be empty")]
    EmptyName,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for SketchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_SKETCH_NOT_FOUND",
            Self::EmptyName => "E_SKETCH_EMPTY_NAME",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Body of a create request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSketch {
    pub name: String,
    #[serde(default)]
    pub data: SketchSnapshot,
}

/// Body of an update request. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SketchPatch {
    pub name: Option<String>,
    pub data: Option<SketchSnapshot>,
}

fn validate_name(name: &str) -> Result<String, SketchError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SketchError::EmptyName);
    }
    Ok(trimmed.to_owned())
}

// =============================================================================
// REPOSITORY
// =============================================================================

/// CRUD over a user's saved sketches. Lists are newest first.
#[async_trait]
pub trait SketchRepository: Send + Sync {
    async fn list(&self, user_id: Uuid) -> Result<Vec<UserSketch>, SketchError>;
    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<UserSketch, SketchError>;
    async fn create(&self, user_id: Uuid, draft: NewSketch) -> Result<UserSketch, SketchError>;
    async fn update(&self, user_id: Uuid, id: Uuid, patch: SketchPatch) -> Result<UserSketch, SketchError>;
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), SketchError>;
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// Process-local repository. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemorySketchRepository {
    /// Oldest first; `list` reverses.
    sketches: RwLock<Vec<UserSketch>>,
}

impl MemorySketchRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SketchRepository for MemorySketchRepository {
    async fn list(&self, user_id: Uuid) -> Result<Vec<UserSketch>, SketchError> {
        let sketches = self.sketches.read().await;
        Ok(sketches.iter().rev().filter(|s| s.user_id == user_id).cloned().collect())
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<UserSketch, SketchError> {
        let sketches = self.sketches.read().await;
        sketches
            .iter()
            .find(|s| s.id == id && s.user_id == user_id)
            .cloned()
            .ok_or(SketchError::NotFound(id))
    }

    async fn create(&self, user_id: Uuid, draft: NewSketch) -> Result<UserSketch, SketchError> {
        let sketch = UserSketch { id: Uuid::new_v4(), user_id, name: validate_name(&draft.name)?, data: draft.data };
        self.sketches.write().await.push(sketch.clone());
        Ok(sketch)
    }

    async fn update(&self, user_id: Uuid, id: Uuid, patch: SketchPatch) -> Result<UserSketch, SketchError> {
        let name = patch.name.as_deref().map(validate_name).transpose()?;
        let mut sketches = self.sketches.write().await;
        let sketch = sketches
            .iter_mut()
            .find(|s| s.id == id && s.user_id == user_id)
            .ok_or(SketchError::NotFound(id))?;
        if let Some(name) = name {
            sketch.name = name;
        }
        if let Some(data) = patch.data {
            sketch.data = data;
        }
        Ok(sketch.clone())
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), SketchError> {
        let mut sketches = self.sketches.write().await;
        let before = sketches.len();
        sketches.retain(|s| !(s.id == id && s.user_id == user_id));
        if sketches.len() == before {
            return Err(SketchError::NotFound(id));
        }
        Ok(())
    }
}

// =============================================================================
// POSTGRES
// =============================================================================

type SketchRow = (Uuid, Uuid, String, Json<SketchSnapshot>);

fn from_row((id, user_id, name, Json(data)): SketchRow) -> UserSketch {
    UserSketch { id, user_id, name, data }
}

/// Repository over the `user_sketches` table.
#[derive(Debug, Clone)]
pub struct PgSketchRepository {
    pool: PgPool,
}

impl PgSketchRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SketchRepository for PgSketchRepository {
    async fn list(&self, user_id: Uuid) -> Result<Vec<UserSketch>, SketchError> {
        let rows = sqlx::query_as::<_, SketchRow>(
            "SELECT id, user_id, name, data
             FROM user_sketches
             WHERE user_id = $1
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<UserSketch, SketchError> {
        let row = sqlx::query_as::<_, SketchRow>(
            "SELECT id, user_id, name, data FROM user_sketches WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).ok_or(SketchError::NotFound(id))
    }

    async fn create(&self, user_id: Uuid, draft: NewSketch) -> Result<UserSketch, SketchError> {
        let name = validate_name(&draft.name)?;
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO user_sketches (id, user_id, name, data) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(user_id)
            .bind(&name)
            .bind(Json(&draft.data))
            .execute(&self.pool)
            .await?;

        Ok(UserSketch { id, user_id, name, data: draft.data })
    }

    async fn update(&self, user_id: Uuid, id: Uuid, patch: SketchPatch) -> Result<UserSketch, SketchError> {
        let name = patch.name.as_deref().map(validate_name).transpose()?;
        let row = sqlx::query_as::<_, SketchRow>(
            "UPDATE user_sketches
             SET name = COALESCE($3, name),
                 data = COALESCE($4, data),
                 updated_at = now()
             WHERE id = $1 AND user_id = $2
             RETURNING id, user_id, name, data",
        )
        .bind(id)
        .bind(user_id)
        .bind(name)
        .bind(patch.data.map(Json))
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).ok_or(SketchError::NotFound(id))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), SketchError> {
        let result = sqlx::query("DELETE FROM user_sketches WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SketchError::NotFound(id));
        }
        Ok(())
    }
}
