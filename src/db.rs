use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::ProjectSnapshot;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query("CREATE SCHEMA IF NOT EXISTS engagement_health")
        .execute(pool)
        .await?;

    // Dates are TEXT on purpose: the upstream store contains mixed formats
    // and interpretation belongs to the temporal normalizer, not the schema.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS engagement_health.projects (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'active',
            start_date TEXT,
            end_date TEXT,
            progress_pct INT NOT NULL DEFAULT 0,
            last_updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            source_key TEXT UNIQUE NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    let projects = vec![
        (
            Uuid::parse_str("6f1f0b3a-58c2-4b8e-9f0e-0a4f5f2d9a11")?,
            "Meridian brand refresh",
            "Full identity and website overhaul",
            "active",
            Some((now - Duration::days(30)).to_rfc3339()),
            Some((now + Duration::days(10)).to_rfc3339()),
            10,
            now - Duration::days(1),
            "seed-001",
        ),
        (
            Uuid::parse_str("b2c96c52-7a44-4e0a-bb0d-2f4f3d8c7e02")?,
            "Halcyon onboarding portal",
            "Client portal build-out, phase two",
            "active",
            Some("2026-01-15".to_string()),
            Some("2026-06-30".to_string()),
            45,
            now - Duration::days(3),
            "seed-002",
        ),
        (
            Uuid::parse_str("9a7d21e4-3f6b-4c59-8e17-c05d1b6aa3f3")?,
            "Quarterly copy retainer",
            "Ongoing copywriting engagement",
            "paused",
            None,
            None,
            60,
            now - Duration::days(21),
            "seed-003",
        ),
    ];

    for (id, name, description, status, start_date, end_date, progress, updated, source_key) in
        projects
    {
        sqlx::query(
            r#"
            INSERT INTO engagement_health.projects
            (id, name, description, status, start_date, end_date, progress_pct, last_updated_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_key) DO UPDATE
            SET name = EXCLUDED.name,
                status = EXCLUDED.status,
                progress_pct = EXCLUDED.progress_pct,
                last_updated_at = EXCLUDED.last_updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(status)
        .bind(start_date)
        .bind(end_date)
        .bind(progress)
        .bind(updated)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_projects(
    pool: &PgPool,
    status: Option<&str>,
    name: Option<&str>,
) -> anyhow::Result<Vec<ProjectSnapshot>> {
    let mut query = String::from(
        "SELECT id, name, description, status, start_date, end_date, \
         progress_pct, last_updated_at \
         FROM engagement_health.projects",
    );

    if status.is_some() {
        query.push_str(" WHERE status = $1");
    } else if name.is_some() {
        query.push_str(" WHERE name = $1");
    }
    query.push_str(" ORDER BY name");

    let mut rows = sqlx::query(&query);
    if let Some(value) = status {
        rows = rows.bind(value);
    } else if let Some(value) = name {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut snapshots = Vec::new();

    for row in records {
        snapshots.push(ProjectSnapshot {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            status: row.get("status"),
            start_date: row.get("start_date"),
            end_date: row.get("end_date"),
            progress_pct: row.get("progress_pct"),
            last_updated_at: row.get("last_updated_at"),
        });
    }

    Ok(snapshots)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        name: String,
        #[serde(default)]
        description: String,
        status: String,
        start_date: Option<String>,
        end_date: Option<String>,
        progress_pct: i32,
        last_updated_at: Option<DateTime<Utc>>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        let last_updated_at = row.last_updated_at.unwrap_or_else(Utc::now);

        let outcome = sqlx::query(
            r#"
            INSERT INTO engagement_health.projects
            (id, name, description, status, start_date, end_date, progress_pct, last_updated_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.name)
        .bind(&row.description)
        .bind(&row.status)
        .bind(&row.start_date)
        .bind(&row.end_date)
        .bind(row.progress_pct)
        .bind(last_updated_at)
        .bind(source_key)
        .execute(pool)
        .await?;

        if outcome.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
