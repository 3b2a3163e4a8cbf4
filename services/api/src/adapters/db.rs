//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use classification_core::domain::{
    AuthSession, Category, Material, NewSegment, NewUser, ReorderOutcome, Segment, SegmentFilter,
    SegmentPatch, User, UserCredentials, UserPatch,
};
use classification_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> PortResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(unexpected)
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Maps `RowNotFound` to `NotFound` for the named entity.
fn lookup(kind: &'static str, id: impl std::fmt::Display) -> impl FnOnce(sqlx::Error) -> PortError {
    let what = format!("{} {} not found", kind, id);
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        other => unexpected(other),
    }
}

/// Maps constraint violations to the port's conflict/not-found variants.
fn constraint(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            PortError::NotFound(format!("Referenced row not found: {}", db.message()))
        }
        _ => unexpected(e),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CategoryRecord {
    id: Uuid,
    name: String,
    parent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl CategoryRecord {
    fn to_domain(self) -> Category {
        Category {
            id: self.id,
            name: self.name,
            parent_id: self.parent_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct MaterialRecord {
    id: Uuid,
    title: String,
    author: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl MaterialRecord {
    fn to_domain(self) -> Material {
        Material {
            id: self.id,
            title: self.title,
            author: self.author,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SegmentRecord {
    id: Uuid,
    material_id: Uuid,
    content: String,
    page_number: i32,
    category_id: Option<Uuid>,
    order_index: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl SegmentRecord {
    fn to_domain(self) -> Segment {
        Segment {
            id: self.id,
            material_id: self.material_id,
            content: self.content,
            page_number: self.page_number,
            category_id: self.category_id,
            order_index: self.order_index,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    is_admin: bool,
    can_edit_categories: bool,
    assigned_materials: Vec<Uuid>,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            username: self.username,
            is_admin: self.is_admin,
            can_edit_categories: self.can_edit_categories,
            assigned_materials: self.assigned_materials,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    username: String,
    hashed_password: String,
}

const CATEGORY_COLUMNS: &str = "id, name, parent_id, created_at, updated_at";
const MATERIAL_COLUMNS: &str = "id, title, author, created_at, updated_at";
const SEGMENT_COLUMNS: &str =
    "id, material_id, content, page_number, category_id, order_index, created_at, updated_at";
const USER_SELECT: &str = "SELECT u.id, u.username, u.is_admin, u.can_edit_categories, u.created_at, \
     COALESCE(array_agg(um.material_id) FILTER (WHERE um.material_id IS NOT NULL), '{}') AS assigned_materials \
     FROM users u LEFT JOIN user_materials um ON um.user_id = u.id";

//=========================================================================================
// Transaction Helpers
//=========================================================================================

/// Locks the material row and returns the next free `order_index` for it.
/// Holding the lock until commit serializes concurrent appends.
async fn lock_next_order_index(
    tx: &mut Transaction<'static, Postgres>,
    material_id: Uuid,
) -> PortResult<i64> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM materials WHERE id = $1 FOR UPDATE")
        .bind(material_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(lookup("Material", material_id))?;

    sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(MAX(order_index) + 1, 0) FROM segments WHERE material_id = $1",
    )
    .bind(material_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(unexpected)
}

async fn fetch_user(tx: &mut Transaction<'static, Postgres>, id: Uuid) -> PortResult<User> {
    let record = sqlx::query_as::<_, UserRecord>(&format!("{} WHERE u.id = $1 GROUP BY u.id", USER_SELECT))
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .map_err(lookup("User", id))?;
    Ok(record.to_domain())
}

async fn assign_materials(
    tx: &mut Transaction<'static, Postgres>,
    user_id: Uuid,
    materials: &[Uuid],
) -> PortResult<()> {
    sqlx::query("DELETE FROM user_materials WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await
        .map_err(unexpected)?;
    sqlx::query(
        "INSERT INTO user_materials (user_id, material_id) \
         SELECT $1, m FROM UNNEST($2::uuid[]) AS m ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(materials)
    .execute(&mut **tx)
    .await
    .map_err(constraint)?;
    Ok(())
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Categories ---
    async fn list_categories(&self) -> PortResult<Vec<Category>> {
        let records = sqlx::query_as::<_, CategoryRecord>(&format!(
            "SELECT {} FROM categories ORDER BY name ASC, id ASC",
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_category(&self, id: Uuid) -> PortResult<Category> {
        let record = sqlx::query_as::<_, CategoryRecord>(&format!(
            "SELECT {} FROM categories WHERE id = $1",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup("Category", id))?;
        Ok(record.to_domain())
    }

    async fn insert_category(&self, name: &str, parent_id: Option<Uuid>) -> PortResult<Category> {
        let record = sqlx::query_as::<_, CategoryRecord>(&format!(
            "INSERT INTO categories (id, name, parent_id) VALUES ($1, $2, $3) RETURNING {}",
            CATEGORY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(constraint)?;
        Ok(record.to_domain())
    }

    async fn update_category(
        &self,
        id: Uuid,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> PortResult<Category> {
        let record = sqlx::query_as::<_, CategoryRecord>(&format!(
            "UPDATE categories SET name = $2, parent_id = $3, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .bind(name)
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Category {} not found", id)),
            other => constraint(other),
        })?;
        Ok(record.to_domain())
    }

    async fn delete_category(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                // ON DELETE RESTRICT from a child category or a segment.
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    PortError::StillReferenced(db.message().to_string())
                }
                _ => unexpected(e),
            })?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Category {} not found", id)));
        }
        Ok(())
    }

    async fn count_child_categories(&self, id: Uuid) -> PortResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories WHERE parent_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(count as u64)
    }

    async fn count_segments_in_category(&self, id: Uuid) -> PortResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM segments WHERE category_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(count as u64)
    }

    // --- Materials ---
    async fn list_materials(&self) -> PortResult<Vec<Material>> {
        let records = sqlx::query_as::<_, MaterialRecord>(&format!(
            "SELECT {} FROM materials ORDER BY created_at DESC, id ASC",
            MATERIAL_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_material(&self, id: Uuid) -> PortResult<Material> {
        let record = sqlx::query_as::<_, MaterialRecord>(&format!(
            "SELECT {} FROM materials WHERE id = $1",
            MATERIAL_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup("Material", id))?;
        Ok(record.to_domain())
    }

    async fn insert_material(&self, title: &str, author: &str) -> PortResult<Material> {
        let record = sqlx::query_as::<_, MaterialRecord>(&format!(
            "INSERT INTO materials (id, title, author) VALUES ($1, $2, $3) RETURNING {}",
            MATERIAL_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(author)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_material(&self, id: Uuid, title: &str, author: &str) -> PortResult<Material> {
        let record = sqlx::query_as::<_, MaterialRecord>(&format!(
            "UPDATE materials SET title = $2, author = $3, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            MATERIAL_COLUMNS
        ))
        .bind(id)
        .bind(title)
        .bind(author)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup("Material", id))?;
        Ok(record.to_domain())
    }

    async fn delete_material(&self, id: Uuid) -> PortResult<u64> {
        let mut tx = self.begin().await?;
        let removed = sqlx::query("DELETE FROM segments WHERE material_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?
            .rows_affected();
        let deleted = sqlx::query("DELETE FROM materials WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?
            .rows_affected();
        if deleted == 0 {
            return Err(PortError::NotFound(format!("Material {} not found", id)));
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(removed)
    }

    // --- Segments ---
    async fn append_segment(&self, segment: NewSegment) -> PortResult<Segment> {
        let mut tx = self.begin().await?;
        let order_index = lock_next_order_index(&mut tx, segment.material_id).await?;

        let record = sqlx::query_as::<_, SegmentRecord>(&format!(
            "INSERT INTO segments (id, material_id, content, page_number, category_id, order_index) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            SEGMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(segment.material_id)
        .bind(&segment.content)
        .bind(segment.page_number)
        .bind(segment.category_id)
        .bind(order_index)
        .fetch_one(&mut *tx)
        .await
        .map_err(constraint)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_segment(&self, id: Uuid) -> PortResult<Segment> {
        let record = sqlx::query_as::<_, SegmentRecord>(&format!(
            "SELECT {} FROM segments WHERE id = $1",
            SEGMENT_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup("Segment", id))?;
        Ok(record.to_domain())
    }

    async fn update_segment(&self, id: Uuid, patch: SegmentPatch) -> PortResult<Segment> {
        let mut tx = self.begin().await?;
        let mut current = sqlx::query_as::<_, SegmentRecord>(&format!(
            "SELECT {} FROM segments WHERE id = $1 FOR UPDATE",
            SEGMENT_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(lookup("Segment", id))?;

        if let Some(target) = patch.material_id.filter(|m| *m != current.material_id) {
            current.order_index = lock_next_order_index(&mut tx, target).await?;
            current.material_id = target;
        }
        if let Some(content) = patch.content {
            current.content = content;
        }
        if let Some(page_number) = patch.page_number {
            current.page_number = page_number;
        }
        if let Some(category_id) = patch.category_id {
            current.category_id = category_id;
        }

        let record = sqlx::query_as::<_, SegmentRecord>(&format!(
            "UPDATE segments SET material_id = $2, content = $3, page_number = $4, \
             category_id = $5, order_index = $6, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            SEGMENT_COLUMNS
        ))
        .bind(id)
        .bind(current.material_id)
        .bind(&current.content)
        .bind(current.page_number)
        .bind(current.category_id)
        .bind(current.order_index)
        .fetch_one(&mut *tx)
        .await
        .map_err(constraint)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn delete_segment(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM segments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Segment {} not found", id)));
        }
        Ok(())
    }

    async fn segments_for_material(&self, material_id: Uuid) -> PortResult<Vec<Segment>> {
        let records = sqlx::query_as::<_, SegmentRecord>(&format!(
            "SELECT {} FROM segments WHERE material_id = $1",
            SEGMENT_COLUMNS
        ))
        .bind(material_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn query_segments(&self, filter: &SegmentFilter) -> PortResult<(Vec<Segment>, u64)> {
        const FILTER: &str = "WHERE ($1::uuid IS NULL OR material_id = $1) \
             AND ($2::uuid IS NULL OR category_id = $2) \
             AND ($3::uuid[] IS NULL OR material_id = ANY($3))";

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM segments {}", FILTER))
            .bind(filter.material_id)
            .bind(filter.category_id)
            .bind(&filter.material_ids)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let offset = i64::from(filter.page.saturating_sub(1)) * i64::from(filter.limit);
        let records = sqlx::query_as::<_, SegmentRecord>(&format!(
            "SELECT {} FROM segments {} ORDER BY created_at DESC, id ASC LIMIT $4 OFFSET $5",
            SEGMENT_COLUMNS, FILTER
        ))
        .bind(filter.material_id)
        .bind(filter.category_id)
        .bind(&filter.material_ids)
        .bind(i64::from(filter.limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok((records.into_iter().map(|r| r.to_domain()).collect(), total as u64))
    }

    async fn apply_segment_order(
        &self,
        material_id: Uuid,
        assignments: &[(Uuid, i64)],
    ) -> PortResult<ReorderOutcome> {
        let (ids, indices): (Vec<Uuid>, Vec<i64>) = assignments.iter().copied().unzip();

        // One statement, so the whole batch commits or none of it does.
        let (matched, modified) = sqlx::query_as::<_, (i64, i64)>(
            "WITH input AS ( \
                 SELECT * FROM UNNEST($2::uuid[], $3::bigint[]) AS t(id, order_index) \
             ), matched AS ( \
                 SELECT s.id, s.order_index AS current_index, i.order_index \
                 FROM segments s JOIN input i ON s.id = i.id \
                 WHERE s.material_id = $1 \
             ), updated AS ( \
                 UPDATE segments s SET order_index = m.order_index, updated_at = now() \
                 FROM matched m \
                 WHERE s.id = m.id AND m.current_index <> m.order_index \
                 RETURNING s.id \
             ) \
             SELECT (SELECT COUNT(*) FROM matched), (SELECT COUNT(*) FROM updated)",
        )
        .bind(material_id)
        .bind(&ids)
        .bind(&indices)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        debug!(%material_id, matched, modified, "Segment order applied");
        Ok(ReorderOutcome {
            requested: assignments.len() as u64,
            matched: matched as u64,
            modified: modified as u64,
        })
    }

    // --- Users ---
    async fn list_users(&self) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "{} GROUP BY u.id ORDER BY u.username ASC",
            USER_SELECT
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_user(&self, id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!("{} WHERE u.id = $1 GROUP BY u.id", USER_SELECT))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup("User", id))?;
        Ok(record.to_domain())
    }

    async fn get_user_credentials(&self, username: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, username, hashed_password FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup("User", username))?;
        Ok(UserCredentials {
            user_id: record.id,
            username: record.username,
            hashed_password: record.hashed_password,
        })
    }

    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        let mut tx = self.begin().await?;
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, username, hashed_password, is_admin, can_edit_categories) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(&user.username)
        .bind(&user.hashed_password)
        .bind(user.is_admin)
        .bind(user.can_edit_categories)
        .execute(&mut *tx)
        .await
        .map_err(|e| match constraint(e) {
            PortError::Conflict(_) => {
                PortError::Conflict(format!("Username {} is already taken", user.username))
            }
            other => other,
        })?;

        assign_materials(&mut tx, id, &user.assigned_materials).await?;
        let created = fetch_user(&mut tx, id).await?;
        tx.commit().await.map_err(unexpected)?;
        Ok(created)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> PortResult<User> {
        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "UPDATE users SET \
                 hashed_password = COALESCE($2, hashed_password), \
                 is_admin = COALESCE($3, is_admin), \
                 can_edit_categories = COALESCE($4, can_edit_categories) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch.hashed_password)
        .bind(patch.is_admin)
        .bind(patch.can_edit_categories)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", id)));
        }

        if let Some(assigned) = patch.assigned_materials {
            assign_materials(&mut tx, id, &assigned).await?;
        }
        let updated = fetch_user(&mut tx, id).await?;
        tx.commit().await.map_err(unexpected)?;
        Ok(updated)
    }

    async fn delete_user(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }

    // --- Auth Sessions ---
    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.id)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(constraint)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
