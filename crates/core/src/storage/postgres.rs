use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgExecutor, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::PublisherStore;
use crate::document::model::ReleaseDocument;
use crate::error::{PublisherError, PublisherResult};
use crate::release::model::{ContentRelease, ReleaseStatus, VersionType};
use crate::release::version::Version;

const RELEASE_COLUMNS: &str = "uuid, site_code, title, version, version_type, status, \
     publish_datetime, base_release, use_current_live_as_base_release, restored, \
     author, publisher, created_at, updated_at";

const DOCUMENT_COLUMNS: &str =
    "release_uuid, content_type, document_key, document_json, deleted, parameters, updated_at";

/// PostgreSQL store over the `content_releases` and `release_documents` tables.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn corrupt(column: &str, detail: impl std::fmt::Display) -> PublisherError {
    PublisherError::Dependency(format!("corrupt {column} column: {detail}"))
}

fn release_from_row(row: &PgRow) -> PublisherResult<ContentRelease> {
    let version = row
        .try_get::<Option<String>, _>("version")?
        .map(|raw| raw.parse::<Version>())
        .transpose()
        .map_err(|e| corrupt("version", e))?;
    let version_type = row.try_get::<i16, _>("version_type")?;
    let status = row.try_get::<i16, _>("status")?;

    Ok(ContentRelease {
        uuid: row.try_get("uuid")?,
        site_code: row.try_get("site_code")?,
        title: row.try_get("title")?,
        version,
        version_type: VersionType::from_i16(version_type)
            .ok_or_else(|| corrupt("version_type", version_type))?,
        status: ReleaseStatus::from_i16(status).ok_or_else(|| corrupt("status", status))?,
        publish_datetime: row.try_get::<Option<DateTime<Utc>>, _>("publish_datetime")?,
        base_release: row.try_get::<Option<Uuid>, _>("base_release")?,
        use_current_live_as_base_release: row.try_get("use_current_live_as_base_release")?,
        restored: row.try_get("restored")?,
        author: row.try_get("author")?,
        publisher: row.try_get("publisher")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn document_from_row(row: &PgRow) -> PublisherResult<ReleaseDocument> {
    let parameters = match row.try_get::<Value, _>("parameters")? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return Err(corrupt("parameters", other)),
    };

    Ok(ReleaseDocument {
        release_uuid: row.try_get("release_uuid")?,
        content_type: row.try_get("content_type")?,
        document_key: row.try_get("document_key")?,
        document_json: row.try_get("document_json")?,
        deleted: row.try_get("deleted")?,
        parameters,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn update_release_row<'e, E: PgExecutor<'e>>(
    executor: E,
    release: &ContentRelease,
) -> PublisherResult<()> {
    let result = sqlx::query(
        "UPDATE content_releases SET \
            title = $2, version = $3, version_type = $4, status = $5, \
            publish_datetime = $6, base_release = $7, \
            use_current_live_as_base_release = $8, restored = $9, \
            author = $10, publisher = $11, updated_at = $12 \
         WHERE uuid = $1",
    )
    .bind(release.uuid)
    .bind(&release.title)
    .bind(release.version.map(|v| v.to_string()))
    .bind(release.version_type as i16)
    .bind(release.status.as_i16())
    .bind(release.publish_datetime)
    .bind(release.base_release)
    .bind(release.use_current_live_as_base_release)
    .bind(release.restored)
    .bind(&release.author)
    .bind(&release.publisher)
    .bind(release.updated_at)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(PublisherError::release_not_found(release.uuid));
    }
    Ok(())
}

impl PublisherStore for PgStore {
    async fn insert_release(&self, release: &ContentRelease) -> PublisherResult<()> {
        let sql = format!(
            "INSERT INTO content_releases ({RELEASE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        );
        sqlx::query(&sql)
            .bind(release.uuid)
            .bind(&release.site_code)
            .bind(&release.title)
            .bind(release.version.map(|v| v.to_string()))
            .bind(release.version_type as i16)
            .bind(release.status.as_i16())
            .bind(release.publish_datetime)
            .bind(release.base_release)
            .bind(release.use_current_live_as_base_release)
            .bind(release.restored)
            .bind(&release.author)
            .bind(&release.publisher)
            .bind(release.created_at)
            .bind(release.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_release(&self, release: &ContentRelease) -> PublisherResult<()> {
        update_release_row(&self.pool, release).await
    }

    async fn swap_live_release(
        &self,
        live: &ContentRelease,
        archived: &[ContentRelease],
    ) -> PublisherResult<()> {
        let mut tx = self.pool.begin().await?;
        for release in archived.iter().chain(std::iter::once(live)) {
            update_release_row(&mut *tx, release).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_release(&self, uuid: Uuid) -> PublisherResult<Option<ContentRelease>> {
        let sql = format!("SELECT {RELEASE_COLUMNS} FROM content_releases WHERE uuid = $1");
        let row = sqlx::query(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(release_from_row).transpose()
    }

    async fn list_releases(&self, site_code: &str) -> PublisherResult<Vec<ContentRelease>> {
        let sql = format!(
            "SELECT {RELEASE_COLUMNS} FROM content_releases \
             WHERE site_code = $1 ORDER BY created_at, uuid"
        );
        let rows = sqlx::query(&sql)
            .bind(site_code)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(release_from_row).collect()
    }

    async fn list_site_codes(&self) -> PublisherResult<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT site_code FROM content_releases ORDER BY site_code")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("site_code").map_err(Into::into))
            .collect()
    }

    async fn upsert_document(&self, document: &ReleaseDocument) -> PublisherResult<()> {
        let sql = format!(
            "INSERT INTO release_documents ({DOCUMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (release_uuid, content_type, document_key) DO UPDATE SET \
                document_json = EXCLUDED.document_json, \
                deleted = EXCLUDED.deleted, \
                parameters = EXCLUDED.parameters, \
                updated_at = EXCLUDED.updated_at"
        );
        sqlx::query(&sql)
            .bind(document.release_uuid)
            .bind(&document.content_type)
            .bind(&document.document_key)
            .bind(&document.document_json)
            .bind(document.deleted)
            .bind(Value::Object(document.parameters.clone()))
            .bind(document.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_document(
        &self,
        release_uuid: Uuid,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<Option<ReleaseDocument>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM release_documents \
             WHERE release_uuid = $1 AND content_type = $2 AND document_key = $3"
        );
        let row = sqlx::query(&sql)
            .bind(release_uuid)
            .bind(content_type)
            .bind(document_key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn delete_document(
        &self,
        release_uuid: Uuid,
        content_type: &str,
        document_key: &str,
    ) -> PublisherResult<bool> {
        let result = sqlx::query(
            "DELETE FROM release_documents \
             WHERE release_uuid = $1 AND content_type = $2 AND document_key = $3",
        )
        .bind(release_uuid)
        .bind(content_type)
        .bind(document_key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_documents(&self, release_uuid: Uuid) -> PublisherResult<Vec<ReleaseDocument>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM release_documents \
             WHERE release_uuid = $1 ORDER BY content_type, document_key"
        );
        let rows = sqlx::query(&sql)
            .bind(release_uuid)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(document_from_row).collect()
    }
}
