use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row};

use crate::config::PASSING_GRADE;
use crate::error::StoreError;
use crate::models::{GradeRecord, HistoricalDataset, LiveTotals, PeriodStatistic, Provenance};
use crate::store::{RecordStore, StoreResult};

async fn insert_rows(conn: &mut PgConnection, records: &[GradeRecord]) -> StoreResult<u64> {
    let mut inserted = 0u64;

    for record in records {
        let result = sqlx::query(
            r#"
            INSERT INTO grade_statistics.grades
            (identity, module, grade, period, is_repeat, institution)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (identity, module, period, is_repeat, institution) DO NOTHING
            "#,
        )
        .bind(&record.identity)
        .bind(&record.module)
        .bind(record.grade as f32)
        .bind(&record.period)
        .bind(record.is_repeat)
        .bind(&record.institution)
        .execute(&mut *conn)
        .await?;

        inserted += result.rows_affected();
    }

    Ok(inserted)
}

async fn delete_rows(conn: &mut PgConnection, identity: &str, institution: &str) -> StoreResult<u64> {
    let result = sqlx::query(
        "DELETE FROM grade_statistics.grades WHERE identity = $1 AND institution = $2",
    )
    .bind(identity)
    .bind(institution)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Historical counts are stored as `integer`.
fn to_db_count(value: i64, field: &str) -> StoreResult<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::InvalidRecord(format!("{field} count {value} does not fit the schema")))
}

pub async fn init_db(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed record store.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn read_live_period_stats(
        &self,
        module: &str,
        institution: &str,
    ) -> StoreResult<Vec<PeriodStatistic>> {
        let rows = sqlx::query(
            r#"
            SELECT g.period,
                   round(avg(g.grade)::numeric, 2)::float8 AS average,
                   count(*) FILTER (WHERE g.grade >= $3)::bigint AS passed,
                   count(*) FILTER (WHERE g.grade < $3)::bigint AS failed,
                   count(g.grade)::bigint AS count
            FROM grade_statistics.grades g
            WHERE g.module = $1
              AND g.institution = $2
              AND g.period NOT IN (
                  SELECT s.period FROM grade_statistics.statistics s
                  WHERE s.module = $1 AND s.institution = $2
              )
            GROUP BY g.period
            "#,
        )
        .bind(module)
        .bind(institution)
        .bind(PASSING_GRADE as f32)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = Vec::with_capacity(rows.len());
        for row in rows {
            stats.push(PeriodStatistic {
                period: row.try_get("period")?,
                average: row.try_get("average")?,
                passed: row.try_get("passed")?,
                failed: row.try_get("failed")?,
                count: row.try_get("count")?,
                stddev: None,
                provenance: None,
            });
        }

        Ok(stats)
    }

    async fn read_live_totals(&self, module: &str, institution: &str) -> StoreResult<LiveTotals> {
        let row = sqlx::query(
            r#"
            SELECT round(avg(g.grade)::numeric, 2)::float8 AS average,
                   round((percentile_cont(0.5) WITHIN GROUP (ORDER BY g.grade))::numeric, 2)::float8 AS median,
                   round(stddev_samp(g.grade)::numeric, 2)::float8 AS stddev,
                   count(*) FILTER (WHERE g.grade >= $3)::bigint AS passed,
                   count(*) FILTER (WHERE g.grade < $3)::bigint AS failed,
                   count(g.grade)::bigint AS count
            FROM grade_statistics.grades g
            WHERE g.module = $1
              AND g.institution = $2
              AND g.period NOT IN (
                  SELECT s.period FROM grade_statistics.statistics s
                  WHERE s.module = $1 AND s.institution = $2
              )
            "#,
        )
        .bind(module)
        .bind(institution)
        .bind(PASSING_GRADE as f32)
        .fetch_one(&self.pool)
        .await?;

        Ok(LiveTotals {
            average: row.try_get("average")?,
            median: row.try_get("median")?,
            stddev: row.try_get("stddev")?,
            passed: row.try_get("passed")?,
            failed: row.try_get("failed")?,
            count: row.try_get("count")?,
        })
    }

    async fn read_historical_datasets(
        &self,
        module: &str,
        institution: &str,
    ) -> StoreResult<Vec<HistoricalDataset>> {
        let rows = sqlx::query(
            r#"
            SELECT source, module, period, institution, average::float8 AS average,
                   passed::bigint AS passed, failed::bigint AS failed,
                   stddev::float8 AS stddev, source_link, comment
            FROM grade_statistics.statistics
            WHERE module = $1 AND institution = $2
            "#,
        )
        .bind(module)
        .bind(institution)
        .fetch_all(&self.pool)
        .await?;

        let mut datasets = Vec::with_capacity(rows.len());
        for row in rows {
            datasets.push(HistoricalDataset {
                module: row.try_get("module")?,
                period: row.try_get("period")?,
                institution: row.try_get("institution")?,
                average: row.try_get("average")?,
                passed: row.try_get("passed")?,
                failed: row.try_get("failed")?,
                stddev: row.try_get("stddev")?,
                provenance: Provenance {
                    source: row.try_get("source")?,
                    source_link: row.try_get("source_link")?,
                    comment: row.try_get("comment")?,
                },
            });
        }

        Ok(datasets)
    }

    async fn read_raw_grades(&self, module: &str, institution: &str) -> StoreResult<Vec<f64>> {
        let grades = sqlx::query_scalar::<_, f64>(
            r#"
            SELECT grade::float8
            FROM grade_statistics.grades
            WHERE module = $1 AND institution = $2
            "#,
        )
        .bind(module)
        .bind(institution)
        .fetch_all(&self.pool)
        .await?;

        Ok(grades)
    }

    async fn insert_grades(&self, records: &[GradeRecord]) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        let inserted = insert_rows(&mut tx, records).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn delete_identity(&self, identity: &str, institution: &str) -> StoreResult<u64> {
        let mut conn = self.pool.acquire().await?;
        delete_rows(&mut conn, identity, institution).await
    }

    async fn replace_identity(
        &self,
        identity: &str,
        institution: &str,
        records: &[GradeRecord],
    ) -> StoreResult<(u64, u64)> {
        let mut tx = self.pool.begin().await?;
        let deleted = delete_rows(&mut tx, identity, institution).await?;
        let inserted = insert_rows(&mut tx, records).await?;
        tx.commit().await?;
        Ok((deleted, inserted))
    }

    async fn is_opted_in(&self, identity: &str, institution: &str) -> StoreResult<bool> {
        let found = sqlx::query(
            "SELECT 1 FROM grade_statistics.grades WHERE identity = $1 AND institution = $2 LIMIT 1",
        )
        .bind(identity)
        .bind(institution)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    async fn opt_out_count(&self, identity: &str, institution: &str) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT count(*) FROM grade_statistics.opt_outs WHERE identity = $1 AND institution = $2",
        )
        .bind(identity)
        .bind(institution)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn record_opt_out(&self, identity: &str, institution: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO grade_statistics.opt_outs (identity, recorded_at, institution)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(identity)
        .bind(chrono::Utc::now())
        .bind(institution)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_dataset(&self, dataset: &HistoricalDataset) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO grade_statistics.statistics
            (source, module, average, period, passed, failed, institution, stddev, source_link, comment)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (module, period, institution) DO NOTHING
            "#,
        )
        .bind(&dataset.provenance.source)
        .bind(&dataset.module)
        .bind(dataset.average as f32)
        .bind(&dataset.period)
        .bind(to_db_count(dataset.passed, "passed")?)
        .bind(to_db_count(dataset.failed, "failed")?)
        .bind(&dataset.institution)
        .bind(dataset.stddev.map(|s| s as f32))
        .bind(&dataset.provenance.source_link)
        .bind(&dataset.provenance.comment)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
