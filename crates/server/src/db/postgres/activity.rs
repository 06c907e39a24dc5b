//! Activity-log repository backed by `PostgreSQL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, QueryBuilder};

use zagros_core::{ActivityLogId, UserId};

use crate::db::{ActivityStore, RepositoryError};
use crate::models::{ActivityFilter, ActivityLogEntry, NewActivityLog, Page, Pagination};

/// Repository for activity log entries.
#[derive(Clone)]
pub struct PgActivityStore {
    pool: PgPool,
}

impl PgActivityStore {
    /// Create a new activity-log repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: i64,
    user_id: i64,
    action: String,
    entity: String,
    entity_id: Option<String>,
    description: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for ActivityLogEntry {
    fn from(row: ActivityRow) -> Self {
        Self {
            id: ActivityLogId::new(row.id),
            user_id: UserId::new(row.user_id),
            action: row.action,
            entity: row.entity,
            entity_id: row.entity_id,
            description: row.description,
            metadata: row.metadata,
            created_at: row.created_at,
        }
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &ActivityFilter) {
    if let Some(user_id) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id.as_i64());
    }
    if let Some(action) = &filter.action {
        builder.push(" AND action = ").push_bind(action.clone());
    }
    if let Some(entity) = &filter.entity {
        builder.push(" AND entity = ").push_bind(entity.clone());
    }
    if let Some(from) = filter.date_from {
        builder.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        builder.push(" AND created_at <= ").push_bind(to);
    }
}

#[async_trait]
impl ActivityStore for PgActivityStore {
    async fn insert(&self, entry: NewActivityLog) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO activity_logs \
                 (user_id, action, entity, entity_id, description, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.user_id.as_i64())
        .bind(&entry.action)
        .bind(&entry.entity)
        .bind(&entry.entity_id)
        .bind(&entry.description)
        .bind(&entry.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(
        &self,
        filter: &ActivityFilter,
        pagination: Pagination,
    ) -> Result<Page<ActivityLogEntry>, RepositoryError> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM activity_logs WHERE TRUE");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::new(
            "SELECT id, user_id, action, entity, entity_id, description, metadata, created_at \
             FROM activity_logs WHERE TRUE",
        );
        push_filters(&mut query, filter);
        query.push(" ORDER BY created_at DESC");
        query.push(" LIMIT ").push_bind(i64::from(pagination.limit));
        query
            .push(" OFFSET ")
            .push_bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX));

        let rows: Vec<ActivityRow> = query.build_query_as().fetch_all(&self.pool).await?;
        let items = rows.into_iter().map(ActivityLogEntry::from).collect();

        Ok(Page::new(
            items,
            u64::try_from(total).unwrap_or(0),
            pagination,
        ))
    }
}
