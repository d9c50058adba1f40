//! PostgreSQL notification store.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use notif_core::{
    ClientEvent, ClientNotificationQuery, Error, Event, EventKind, JobEvent,
    NotificationPage, NotificationRepository, Result, StoredNotification,
    UserNotificationQuery,
};

use crate::escape_like;

const SELECT_COLUMNS: &str = "SELECT id, created_at, kind, username, job_id, job_status, job_type,
        client_id, client_name, priority, title, source
 FROM notification";

/// PostgreSQL notification repository.
#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: Pool<Postgres>,
}

impl PgNotificationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: &PgRow) -> Result<StoredNotification> {
        let id: i64 = row.try_get("id")?;
        let kind: String = row.try_get("kind")?;

        let required = |column: &str| -> Result<String> {
            row.try_get::<Option<String>, _>(column)?.ok_or_else(|| {
                Error::Internal(format!("notification {id} has no {column}"))
            })
        };

        let event = match kind.parse::<EventKind>()? {
            EventKind::Job => Event::Job(JobEvent {
                username: required("username")?,
                job_id: required("job_id")?,
                job_status: required("job_status")?.parse()?,
                job_type: required("job_type")?.parse()?,
            }),
            EventKind::Client => Event::Client(ClientEvent {
                client_id: required("client_id")?,
                client_name: required("client_name")?,
                priority: required("priority")?.parse()?,
                title: row.try_get("title")?,
                source: row.try_get("source")?,
            }),
        };

        Ok(StoredNotification {
            id,
            created_at: row.try_get("created_at")?,
            event,
        })
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert(&self, event: &Event) -> Result<i64> {
        event.validate()?;

        let query = match event {
            Event::Job(job) => sqlx::query(
                "INSERT INTO notification (kind, username, job_id, job_status, job_type)
                 VALUES ('job', $1, $2, $3, $4)
                 RETURNING id",
            )
            .bind(&job.username)
            .bind(&job.job_id)
            .bind(job.job_status.as_str())
            .bind(job.job_type.as_str()),
            Event::Client(client) => sqlx::query(
                "INSERT INTO notification (kind, client_id, client_name, priority, title, source)
                 VALUES ('client', $1, $2, $3, $4, $5)
                 RETURNING id",
            )
            .bind(&client.client_id)
            .bind(&client.client_name)
            .bind(client.priority.as_str())
            .bind(&client.title)
            .bind(&client.source),
        };

        let row = query.fetch_one(&self.pool).await?;
        let id: i64 = row.try_get("id")?;

        debug!(
            subsystem = "db",
            component = "notifications",
            op = "insert",
            event_kind = %event.kind(),
            notification_id = id,
            "Notification persisted"
        );
        Ok(id)
    }

    async fn query_user(&self, query: &UserNotificationQuery) -> Result<NotificationPage> {
        let status = query.status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification
             WHERE kind = 'job' AND username = $1
               AND ($2::text IS NULL OR job_status = $2)",
        )
        .bind(&query.username)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS}
             WHERE kind = 'job' AND username = $1
               AND ($2::text IS NULL OR job_status = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(&query.username)
        .bind(status)
        .bind(query.page.limit())
        .bind(query.page.offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(Self::parse_row)
            .collect::<Result<Vec<_>>>()?;

        debug!(
            subsystem = "db",
            component = "notifications",
            op = "query_user",
            username = %query.username,
            result_count = items.len(),
            total,
            "User notifications fetched"
        );
        Ok(NotificationPage { items, total })
    }

    async fn query_clients(&self, query: &ClientNotificationQuery) -> Result<NotificationPage> {
        let pattern = query
            .name
            .as_deref()
            .map(|name| format!("%{}%", escape_like(name)));
        let priority = query.priority.map(|p| p.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification
             WHERE kind = 'client'
               AND ($1::text IS NULL OR client_name ILIKE $1 ESCAPE '\\')
               AND ($2::text IS NULL OR priority = $2)",
        )
        .bind(&pattern)
        .bind(priority)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS}
             WHERE kind = 'client'
               AND ($1::text IS NULL OR client_name ILIKE $1 ESCAPE '\\')
               AND ($2::text IS NULL OR priority = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(&pattern)
        .bind(priority)
        .bind(query.page.limit())
        .bind(query.page.offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(Self::parse_row)
            .collect::<Result<Vec<_>>>()?;

        debug!(
            subsystem = "db",
            component = "notifications",
            op = "query_clients",
            result_count = items.len(),
            total,
            "Client notifications fetched"
        );
        Ok(NotificationPage { items, total })
    }
}
