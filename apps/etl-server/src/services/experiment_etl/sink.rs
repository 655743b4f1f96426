use std::fmt;
use std::str::FromStr;

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::error::EtlError;
use super::types::DerivedSummary;

pub const SINK_TABLE: &str = "derived_exp_data";

// Six binds per row keeps each statement well under the 65535 parameter limit.
const INSERT_CHUNK_ROWS: usize = 1_000;

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS derived_exp_data (
        user_id BIGINT NOT NULL,
        total_exp_per_user BIGINT NOT NULL,
        avg_experiment_count DOUBLE PRECISION NOT NULL,
        avg_exp_time_per_user DOUBLE PRECISION NOT NULL,
        most_consumed_compound_id BIGINT,
        most_consumed_compound_name TEXT
    )
"#;

const CREATE_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS derived_exp_data_user_id_idx ON derived_exp_data (user_id)";

/// Transaction-scoped advisory lock key serialising every write to `derived_exp_data`.
const SINK_LOCK_KEY: i64 = 0x6574_6c5f_7369_6e6b;

/// How a run lands in `derived_exp_data`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SinkMode {
    /// Replace existing rows for every incoming user.
    #[default]
    Upsert,
    /// Insert unconditionally; re-runs add another copy of each row.
    Append,
}

impl SinkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkMode::Upsert => "upsert",
            SinkMode::Append => "append",
        }
    }
}

impl fmt::Display for SinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinkMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "upsert" | "replace" => Ok(SinkMode::Upsert),
            "append" | "insert" => Ok(SinkMode::Append),
            other => Err(format!(
                "unknown sink mode {other:?} (expected upsert or append)"
            )),
        }
    }
}

/// Creates the output table if it is missing. Never drops or alters existing data.
pub async fn ensure_table(pool: &PgPool) -> Result<(), EtlError> {
    let mut tx = pool.begin().await?;
    lock_sink(&mut tx).await?;
    create_table(&mut tx).await?;
    tx.commit().await?;
    Ok(())
}

async fn lock_sink(tx: &mut Transaction<'_, Postgres>) -> Result<(), EtlError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SINK_LOCK_KEY)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn create_table(tx: &mut Transaction<'_, Postgres>) -> Result<(), EtlError> {
    sqlx::query(CREATE_TABLE_SQL).execute(&mut **tx).await?;
    sqlx::query(CREATE_INDEX_SQL).execute(&mut **tx).await?;
    Ok(())
}

/// Persists `rows` in a single transaction and returns the number of inserted rows.
///
/// Concurrent writers queue on an advisory lock taken first in the transaction, so
/// in upsert mode the last committed run wins per user.
///
/// Any error drops the transaction, which rolls it back and hands the connection
/// back to the pool.
pub async fn write_summary(
    pool: &PgPool,
    rows: &[DerivedSummary],
    mode: SinkMode,
) -> Result<u64, EtlError> {
    let mut tx = pool.begin().await?;
    lock_sink(&mut tx).await?;
    create_table(&mut tx).await?;

    if mode == SinkMode::Upsert && !rows.is_empty() {
        let user_ids: Vec<i64> = rows.iter().map(|row| row.user_id).collect();
        let replaced = sqlx::query("DELETE FROM derived_exp_data WHERE user_id = ANY($1)")
            .bind(&user_ids)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if replaced > 0 {
            tracing::debug!(replaced, "replacing existing derived summary rows");
        }
    }

    let mut inserted = 0u64;
    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO derived_exp_data (user_id, total_exp_per_user, avg_experiment_count, \
             avg_exp_time_per_user, most_consumed_compound_id, most_consumed_compound_name) ",
        );
        builder.push_values(chunk.iter(), |mut b, row| {
            b.push_bind(row.user_id)
                .push_bind(row.total_exp_per_user)
                .push_bind(row.avg_experiment_count)
                .push_bind(row.avg_exp_time_per_user)
                .push_bind(row.most_consumed_compound_id)
                .push_bind(row.most_consumed_compound_name.clone());
        });
        inserted += builder.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Reads the whole output table back, ordered by user.
pub async fn fetch_summary(pool: &PgPool) -> Result<Vec<DerivedSummary>, EtlError> {
    let rows = sqlx::query_as::<_, DerivedSummary>(
        r#"
        SELECT user_id, total_exp_per_user, avg_experiment_count, avg_exp_time_per_user,
               most_consumed_compound_id, most_consumed_compound_name
        FROM derived_exp_data
        ORDER BY user_id
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sink_modes() {
        assert_eq!("upsert".parse::<SinkMode>(), Ok(SinkMode::Upsert));
        assert_eq!(" Append ".parse::<SinkMode>(), Ok(SinkMode::Append));
        assert_eq!("replace".parse::<SinkMode>(), Ok(SinkMode::Upsert));
        assert!("truncate".parse::<SinkMode>().is_err());
    }

    #[test]
    fn default_mode_is_upsert() {
        assert_eq!(SinkMode::default(), SinkMode::Upsert);
        assert_eq!(SinkMode::default().to_string(), "upsert");
    }
}
