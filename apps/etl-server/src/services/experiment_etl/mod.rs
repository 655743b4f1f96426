//! Derives per-user experiment summaries from the users, experiments and compounds
//! CSV relations and persists them to `derived_exp_data`.
//!
//! The flow is loader → transform → sink. Only the sink touches the database; the
//! loader and transform run on the blocking pool.

pub mod compounds;
pub mod error;
pub mod loader;
pub mod sink;
pub mod transform;
pub mod types;


use std::path::{Path, PathBuf};
use std::time::Instant;

use sqlx::PgPool;
use tracing::Instrument;

use crate::config::EtlConfig;

pub use error::EtlError;
pub use sink::SinkMode;
pub use transform::{transform, transform_with_stats};
pub use types::{
    CompoundRecord, DerivedSummary, ExperimentRecord, InputRelations, TransformStats, UserRecord,
};

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub rows_written: u64,
    pub users: usize,
    pub experiments: usize,
    pub sink_mode: SinkMode,
}

/// Resolves, loads and transforms one data directory. Blocking.
pub fn derive_summary(
    data_root: Option<&Path>,
    path_to_data: &str,
) -> Result<(Vec<DerivedSummary>, TransformStats), EtlError> {
    let dir = loader::resolve_data_dir(data_root, path_to_data)?;
    let relations = loader::load_relations(&dir)?;
    transform_with_stats(
        &relations.users,
        &relations.experiments,
        &relations.compounds,
    )
}

/// Loader and transform only, for `--dry-run`; nothing is written.
pub async fn run_dry(
    config: &EtlConfig,
    path_to_data: &str,
) -> Result<Vec<DerivedSummary>, EtlError> {
    let data_root = config.data_root.clone();
    let requested = path_to_data.to_string();
    let (rows, stats) = tokio::task::spawn_blocking(move || {
        derive_summary(data_root.as_deref(), &requested)
    })
    .await??;
    tracing::info!(
        users = stats.users,
        experiments = stats.experiments,
        orphan_experiments = stats.orphan_experiments,
        "derived experiment summary (dry run)"
    );
    Ok(rows)
}

/// Full batch run: derive the summary and write it to the sink.
pub async fn run_pipeline(
    pool: &PgPool,
    config: &EtlConfig,
    path_to_data: &str,
) -> Result<PipelineReport, EtlError> {
    let span = tracing::info_span!(
        "experiment_etl",
        path = %path_to_data,
        sink_mode = %config.sink_mode,
    );
    run_pipeline_inner(pool, config, path_to_data)
        .instrument(span)
        .await
}

async fn run_pipeline_inner(
    pool: &PgPool,
    config: &EtlConfig,
    path_to_data: &str,
) -> Result<PipelineReport, EtlError> {
    let started = Instant::now();
    let data_root: Option<PathBuf> = config.data_root.clone();
    let requested = path_to_data.to_string();
    let (rows, stats) = tokio::task::spawn_blocking(move || {
        derive_summary(data_root.as_deref(), &requested)
    })
    .await??;

    if stats.orphan_experiments > 0 {
        tracing::warn!(
            orphan_experiments = stats.orphan_experiments,
            "experiment rows reference users missing from users.csv"
        );
    }
    tracing::info!(
        users = stats.users,
        experiments = stats.experiments,
        "derived experiment summary"
    );

    let rows_written = sink::write_summary(pool, &rows, config.sink_mode).await?;
    tracing::info!(
        rows_written,
        table = sink::SINK_TABLE,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "experiment ETL run complete"
    );

    Ok(PipelineReport {
        rows_written,
        users: stats.users,
        experiments: stats.experiments,
        sink_mode: config.sink_mode,
    })
}
