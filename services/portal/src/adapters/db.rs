//! services/portal/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `RemoteStore` and `AccountStore` ports from the core crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reading_portal_core::catalog::{CatalogQuery, Predicate};
use reading_portal_core::domain::{
    Bookmark, BookmarkEntry, Document, ProgressEntry, ReadingProgress, User, UserCredentials,
};
use reading_portal_core::ports::{AccountStore, PortError, PortResult, RemoteStore};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const DOCUMENT_COLUMNS: &str = "s.id, s.title, s.title_hindi, s.description, s.description_hindi, \
     s.category, s.subcategory, s.author, s.language, s.total_chapters, s.total_verses, \
     s.featured, s.pdf_url";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the store ports.
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
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Escapes `%`, `_` and `\` so user text matches literally inside an ILIKE pattern.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Converts a position to an `INTEGER` column value, rejecting values Postgres cannot hold.
fn int_column(column: &str, value: u32) -> PortResult<i32> {
    i32::try_from(value)
        .map_err(|_| PortError::Unexpected(format!("{} {} is out of range", column, value)))
}

/// Appends the catalog predicates and ordering to a `SELECT ... FROM scriptures s`.
fn push_catalog_query(builder: &mut QueryBuilder<'_, Postgres>, query: &CatalogQuery) {
    builder.push(" WHERE TRUE");
    for predicate in &query.predicates {
        match predicate {
            Predicate::CategoryEquals(category) => {
                builder.push(" AND s.category ILIKE ");
                builder.push_bind(escape_like(category.name()));
            }
            Predicate::AnyContains { fields, needle } => {
                let pattern = format!("%{}%", escape_like(needle));
                builder.push(" AND (");
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        builder.push(" OR ");
                    }
                    builder.push("s.");
                    builder.push(field.column());
                    builder.push(" ILIKE ");
                    builder.push_bind(pattern.clone());
                }
                builder.push(")");
            }
        }
    }
    builder.push(" ORDER BY s.title ASC, s.id ASC");
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    id: Uuid,
    title: String,
    title_hindi: Option<String>,
    description: Option<String>,
    description_hindi: Option<String>,
    category: String,
    subcategory: Option<String>,
    author: Option<String>,
    language: Option<String>,
    total_chapters: Option<i32>,
    total_verses: Option<i32>,
    featured: Option<bool>,
    pdf_url: Option<String>,
}
impl DocumentRecord {
    fn to_domain(self) -> Document {
        Document {
            id: self.id,
            title: self.title,
            title_localized: self.title_hindi,
            description: self.description,
            description_localized: self.description_hindi,
            category: self.category,
            subcategory: self.subcategory,
            author: self.author,
            language: self.language,
            total_chapters: self.total_chapters,
            total_verses: self.total_verses,
            featured: self.featured.unwrap_or(false),
            content_url: self.pdf_url,
        }
    }
}

#[derive(FromRow)]
struct ProgressRecord {
    user_id: Uuid,
    scripture_id: Uuid,
    current_chapter: i32,
    current_verse: i32,
    progress_percentage: i16,
    last_read_at: DateTime<Utc>,
}
impl ProgressRecord {
    fn to_domain(self) -> ReadingProgress {
        ReadingProgress {
            user_id: self.user_id,
            document_id: self.scripture_id,
            current_chapter: self.current_chapter.max(1) as u32,
            current_verse: self.current_verse.max(1) as u32,
            progress_percentage: self.progress_percentage.clamp(0, 100) as u8,
            last_read_at: self.last_read_at,
        }
    }
}

#[derive(FromRow)]
struct ProgressJoinRecord {
    #[sqlx(flatten)]
    progress: ProgressRecord,
    #[sqlx(flatten)]
    document: DocumentRecord,
}

#[derive(FromRow)]
struct BookmarkRecord {
    id: Uuid,
    user_id: Uuid,
    scripture_id: Uuid,
    created_at: DateTime<Utc>,
}
impl BookmarkRecord {
    fn to_domain(self) -> Bookmark {
        Bookmark {
            id: self.id,
            user_id: self.user_id,
            document_id: self.scripture_id,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct BookmarkJoinRecord {
    bookmark_id: Uuid,
    user_id: Uuid,
    bookmarked_at: DateTime<Utc>,
    #[sqlx(flatten)]
    document: DocumentRecord,
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

//=========================================================================================
// `RemoteStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RemoteStore for DbAdapter {
    async fn query_documents(&self, query: &CatalogQuery) -> PortResult<Vec<Document>> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {DOCUMENT_COLUMNS} FROM scriptures s"));
        push_catalog_query(&mut builder, query);

        let records = builder
            .build_query_as::<DocumentRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_document(&self, document_id: Uuid) -> PortResult<Option<Document>> {
        let record = sqlx::query_as::<_, DocumentRecord>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM scriptures s WHERE s.id = $1"
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn featured_documents(&self, limit: usize) -> PortResult<Vec<Document>> {
        let records = sqlx::query_as::<_, DocumentRecord>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM scriptures s WHERE s.featured = TRUE LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_progress(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> PortResult<Option<ReadingProgress>> {
        let record = sqlx::query_as::<_, ProgressRecord>(
            "SELECT user_id, scripture_id, current_chapter, current_verse, progress_percentage, last_read_at \
             FROM reading_progress WHERE user_id = $1 AND scripture_id = $2",
        )
        .bind(user_id)
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn upsert_progress(&self, progress: &ReadingProgress) -> PortResult<()> {
        let chapter = int_column("current_chapter", progress.current_chapter)?;
        let verse = int_column("current_verse", progress.current_verse)?;
        sqlx::query(
            "INSERT INTO reading_progress \
                 (user_id, scripture_id, current_chapter, current_verse, progress_percentage, last_read_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id, scripture_id) DO UPDATE SET \
                 current_chapter = EXCLUDED.current_chapter, \
                 current_verse = EXCLUDED.current_verse, \
                 progress_percentage = EXCLUDED.progress_percentage, \
                 last_read_at = EXCLUDED.last_read_at",
        )
        .bind(progress.user_id)
        .bind(progress.document_id)
        .bind(chapter)
        .bind(verse)
        .bind(i16::from(progress.progress_percentage))
        .bind(progress.last_read_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn progress_percentages(&self, user_id: Uuid) -> PortResult<Vec<(Uuid, u8)>> {
        let rows: Vec<(Uuid, i16)> = sqlx::query_as(
            "SELECT scripture_id, progress_percentage FROM reading_progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows
            .into_iter()
            .map(|(id, pct)| (id, pct.clamp(0, 100) as u8))
            .collect())
    }

    async fn list_progress(&self, user_id: Uuid) -> PortResult<Vec<ProgressEntry>> {
        let records = sqlx::query_as::<_, ProgressJoinRecord>(&format!(
            "SELECT p.user_id, p.scripture_id, p.current_chapter, p.current_verse, \
                    p.progress_percentage, p.last_read_at, {DOCUMENT_COLUMNS} \
             FROM reading_progress p JOIN scriptures s ON s.id = p.scripture_id \
             WHERE p.user_id = $1 ORDER BY p.last_read_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records
            .into_iter()
            .map(|r| ProgressEntry {
                progress: r.progress.to_domain(),
                document: r.document.to_domain(),
            })
            .collect())
    }

    async fn find_bookmark(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> PortResult<Option<Bookmark>> {
        let record = sqlx::query_as::<_, BookmarkRecord>(
            "SELECT id, user_id, scripture_id, created_at FROM bookmarks \
             WHERE user_id = $1 AND scripture_id = $2",
        )
        .bind(user_id)
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn insert_bookmark(&self, user_id: Uuid, document_id: Uuid) -> PortResult<Bookmark> {
        let record = sqlx::query_as::<_, BookmarkRecord>(
            "INSERT INTO bookmarks (id, user_id, scripture_id) VALUES ($1, $2, $3) \
             RETURNING id, user_id, scripture_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(document_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn delete_bookmark(&self, user_id: Uuid, document_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND scripture_id = $2")
            .bind(user_id)
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_bookmarks(&self, user_id: Uuid) -> PortResult<Vec<BookmarkEntry>> {
        let records = sqlx::query_as::<_, BookmarkJoinRecord>(&format!(
            "SELECT b.id AS bookmark_id, b.user_id, b.created_at AS bookmarked_at, {DOCUMENT_COLUMNS} \
             FROM bookmarks b JOIN scriptures s ON s.id = b.scripture_id \
             WHERE b.user_id = $1 ORDER BY b.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records
            .into_iter()
            .map(|r| {
                let document = r.document.to_domain();
                BookmarkEntry {
                    bookmark: Bookmark {
                        id: r.bookmark_id,
                        user_id: r.user_id,
                        document_id: document.id,
                        created_at: r.bookmarked_at,
                    },
                    document,
                }
            })
            .collect())
    }
}

//=========================================================================================
// `AccountStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccountStore for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email, hashed_password",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(User {
            user_id: record.user_id,
            email: Some(record.email),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let row: Option<(Uuid, DateTime<Utc>)> =
            sqlx::query_as("SELECT user_id, expires_at FROM auth_sessions WHERE id = $1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?;

        match row {
            Some((user_id, expires_at)) if expires_at > Utc::now() => Ok(user_id),
            Some(_) => Err(PortError::Unauthorized),
            None => Err(PortError::NotFound(format!("Session {} not found", session_id))),
        }
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
