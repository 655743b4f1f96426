use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: i64,
}

/// One row of `user_experiments.csv`.
///
/// `experiment_compound_ids` keeps the raw `;`-delimited token list; the transform
/// parses it so that a malformed token fails the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentRecord {
    pub user_id: i64,
    pub experiment_run_time: f64,
    pub experiment_compound_ids: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundRecord {
    pub compound_id: i64,
    pub compound_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct InputRelations {
    pub users: Vec<UserRecord>,
    pub experiments: Vec<ExperimentRecord>,
    pub compounds: Vec<CompoundRecord>,
}

/// One output row per user, as persisted to `derived_exp_data`.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema,
)]
pub struct DerivedSummary {
    pub user_id: i64,
    pub total_exp_per_user: i64,
    pub avg_experiment_count: f64,
    pub avg_exp_time_per_user: f64,
    pub most_consumed_compound_id: Option<i64>,
    pub most_consumed_compound_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransformStats {
    pub users: usize,
    pub experiments: usize,
    /// Experiment rows whose user is not present in the users relation.
    pub orphan_experiments: usize,
}
