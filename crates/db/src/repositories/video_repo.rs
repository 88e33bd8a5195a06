//! Repository for the `videos` table.
//!
//! Listing queries are assembled with [`sqlx::QueryBuilder`]: column names
//! come from the fixed [`column`] map and every operand is a bind
//! parameter, so client input never reaches the SQL text.

use sqlx::{PgPool, Postgres, QueryBuilder};
use vidcat_core::query::{CompareOp, Filter, FilterOp, FilterValue, Predicate, SortDirection};
use vidcat_core::types::{new_id, DbId};
use vidcat_core::video::{FieldKind, NewVideoRecord, StoreQuery, VideoChanges, VideoField};

use crate::models::video::VideoRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, media_ref, thumbnail_ref, title, description, duration_seconds, \
                       views, is_published, owner_id, version, created_at, updated_at";

/// Provides CRUD operations for videos.
pub struct VideoRepo;

impl VideoRepo {
    /// Run a resolved listing query.
    pub async fn find(pool: &PgPool, query: &StoreQuery) -> Result<Vec<VideoRow>, sqlx::Error> {
        let mut builder = build_find_query(query);
        builder.build_query_as::<VideoRow>().fetch_all(pool).await
    }

    /// Find a video by id, published or not.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<VideoRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM videos WHERE id = $1");
        sqlx::query_as::<_, VideoRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a new video, returning the created row.
    pub async fn create(pool: &PgPool, input: &NewVideoRecord) -> Result<VideoRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO videos (id, owner_id, media_ref, thumbnail_ref, duration_seconds,
                                 title, description, is_published, views)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VideoRow>(&query)
            .bind(new_id())
            .bind(input.owner_id)
            .bind(&input.media_ref)
            .bind(&input.thumbnail_ref)
            .bind(input.duration_seconds)
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.is_published)
            .bind(input.views)
            .fetch_one(pool)
            .await
    }

    /// Update a video. Only non-`None` fields in `changes` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        changes: &VideoChanges,
    ) -> Result<Option<VideoRow>, sqlx::Error> {
        let query = format!(
            "UPDATE videos SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                thumbnail_ref = COALESCE($4, thumbnail_ref),
                is_published = COALESCE($5, is_published),
                version = version + 1,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VideoRow>(&query)
            .bind(id)
            .bind(&changes.title)
            .bind(&changes.description)
            .bind(&changes.thumbnail_ref)
            .bind(changes.is_published)
            .fetch_optional(pool)
            .await
    }

    /// Delete a video. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Query building
// ---------------------------------------------------------------------------

/// Column backing each queryable field.
pub fn column(field: VideoField) -> &'static str {
    match field {
        VideoField::Id => "id",
        VideoField::Title => "title",
        VideoField::Description => "description",
        VideoField::MediaRef => "media_ref",
        VideoField::ThumbnailRef => "thumbnail_ref",
        VideoField::DurationSeconds => "duration_seconds",
        VideoField::Views => "views",
        VideoField::IsPublished => "is_published",
        VideoField::Owner => "owner_id",
        VideoField::Version => "version",
        VideoField::CreatedAt => "created_at",
        VideoField::UpdatedAt => "updated_at",
    }
}

/// Build `SELECT ... WHERE ... ORDER BY ... LIMIT ... OFFSET ...`.
pub fn build_find_query(query: &StoreQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {COLUMNS} FROM videos WHERE "));
    push_filter(&mut builder, &query.filter);

    if !query.sort.is_empty() {
        builder.push(" ORDER BY ");
        for (i, key) in query.sort.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(column(key.field));
            builder.push(match key.direction {
                SortDirection::Asc => " ASC",
                SortDirection::Desc => " DESC",
            });
        }
    }

    builder.push(" LIMIT ");
    builder.push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));
    builder.push(" OFFSET ");
    builder.push_bind(i64::try_from(query.offset).unwrap_or(i64::MAX));
    builder
}

fn push_filter(builder: &mut QueryBuilder<'static, Postgres>, filter: &Filter<VideoField>) {
    match filter {
        Filter::All(parts) if parts.is_empty() => {
            builder.push("TRUE");
        }
        Filter::All(parts) => {
            builder.push("(");
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    builder.push(" AND ");
                }
                push_filter(builder, part);
            }
            builder.push(")");
        }
        Filter::Pred(pred) => push_predicate(builder, pred),
    }
}

fn push_predicate(builder: &mut QueryBuilder<'static, Postgres>, pred: &Predicate<VideoField>) {
    let col = column(pred.field);

    match &pred.op {
        FilterOp::Contains(needle) => {
            builder.push(col);
            if pred.field.kind() != FieldKind::Text {
                builder.push("::text");
            }
            builder.push(" ILIKE ");
            builder.push_bind(format!("%{}%", escape_like(needle)));
            builder.push(" ESCAPE '\\'");
        }
        FilterOp::Compare(op, value) => {
            builder.push(col);
            builder.push(sql_operator(*op));
            match value {
                FilterValue::Text(s) => builder.push_bind(s.clone()),
                FilterValue::Number(n) => builder.push_bind(*n),
                FilterValue::Bool(b) => builder.push_bind(*b),
                FilterValue::Timestamp(t) => builder.push_bind(*t),
                FilterValue::Id(id) => builder.push_bind(*id),
            };
        }
    }
}

fn sql_operator(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => " = ",
        CompareOp::Gt => " > ",
        CompareOp::Gte => " >= ",
        CompareOp::Lt => " < ",
        CompareOp::Lte => " <= ",
    }
}

/// Escape `LIKE` metacharacters so user text matches literally.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
