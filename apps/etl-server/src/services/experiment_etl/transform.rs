use std::collections::{HashMap, HashSet};

use super::compounds::{compound_names, parse_compound_ids, CompoundTally};
use super::error::EtlError;
use super::types::{
    CompoundRecord, DerivedSummary, ExperimentRecord, TransformStats, UserRecord,
};

/// Rounds to two decimal places, halves away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Default, Clone, Copy)]
struct RunTimeTotals {
    count: i64,
    sum: f64,
}

/// Derives one summary row per distinct user.
///
/// Pure function of its inputs. Any malformed compound token aborts the whole call.
pub fn transform(
    users: &[UserRecord],
    experiments: &[ExperimentRecord],
    compounds: &[CompoundRecord],
) -> Result<Vec<DerivedSummary>, EtlError> {
    transform_with_stats(users, experiments, compounds).map(|(rows, _)| rows)
}

pub fn transform_with_stats(
    users: &[UserRecord],
    experiments: &[ExperimentRecord],
    compounds: &[CompoundRecord],
) -> Result<(Vec<DerivedSummary>, TransformStats), EtlError> {
    let user_ids = canonical_user_ids(users);
    if user_ids.is_empty() {
        return Err(EtlError::EmptyInput);
    }
    let known: HashSet<i64> = user_ids.iter().copied().collect();

    let mut totals: HashMap<i64, RunTimeTotals> = HashMap::new();
    let mut tally = CompoundTally::new();
    let mut orphan_experiments = 0usize;

    for (idx, experiment) in experiments.iter().enumerate() {
        // Parse before the membership check so orphan rows still fail fast.
        let compound_ids = parse_compound_ids(&experiment.experiment_compound_ids, idx + 1)?;
        if !known.contains(&experiment.user_id) {
            orphan_experiments += 1;
            continue;
        }
        let entry = totals.entry(experiment.user_id).or_default();
        entry.count += 1;
        entry.sum += experiment.experiment_run_time;
        tally.record(experiment.user_id, &compound_ids);
    }

    let avg_experiment_count = round2(experiments.len() as f64 / user_ids.len() as f64);
    let names = compound_names(compounds);

    let rows = user_ids
        .iter()
        .map(|&user_id| {
            let RunTimeTotals { count, sum } = totals.get(&user_id).copied().unwrap_or_default();
            let avg_exp_time_per_user = if count > 0 {
                round2(sum / count as f64)
            } else {
                0.0
            };
            let most_consumed_compound_id = tally.most_consumed(user_id);
            let most_consumed_compound_name = most_consumed_compound_id
                .and_then(|id| names.get(&id))
                .map(|name| name.to_string());
            DerivedSummary {
                user_id,
                total_exp_per_user: count,
                avg_experiment_count,
                avg_exp_time_per_user,
                most_consumed_compound_id,
                most_consumed_compound_name,
            }
        })
        .collect();

    let stats = TransformStats {
        users: user_ids.len(),
        experiments: experiments.len(),
        orphan_experiments,
    };
    Ok((rows, stats))
}

fn canonical_user_ids(users: &[UserRecord]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(users.len());
    users
        .iter()
        .map(|user| user.user_id)
        .filter(|user_id| seen.insert(*user_id))
        .collect()
}
