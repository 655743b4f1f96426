use std::collections::{BTreeMap, HashMap};

use super::error::EtlError;
use super::types::CompoundRecord;

pub const COMPOUND_ID_DELIMITER: char = ';';

/// Splits a `;`-delimited compound id list and parses every token.
///
/// `row` is the 1-based data row used in the error. Empty tokens are rejected.
pub fn parse_compound_ids(raw: &str, row: usize) -> Result<Vec<i64>, EtlError> {
    raw.split(COMPOUND_ID_DELIMITER)
        .map(|token| {
            let token = token.trim();
            token
                .parse::<i64>()
                .map_err(|_| EtlError::parse("experiment_compound_ids", row, token))
        })
        .collect()
}

/// Per-user compound occurrence counts, built fresh for each transform call.
///
/// Counts live in a `BTreeMap` so iteration is ordered by compound id, which is what
/// makes the tie-break in [`CompoundTally::most_consumed`] deterministic.
#[derive(Debug, Default)]
pub struct CompoundTally {
    counts: HashMap<i64, BTreeMap<i64, u64>>,
}

impl CompoundTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, user_id: i64, compound_ids: &[i64]) {
        let per_user = self.counts.entry(user_id).or_default();
        for compound_id in compound_ids {
            *per_user.entry(*compound_id).or_insert(0) += 1;
        }
    }

    pub fn counts_for(&self, user_id: i64) -> Option<&BTreeMap<i64, u64>> {
        self.counts.get(&user_id)
    }

    /// Highest-count compound for the user. Ties go to the lowest compound id.
    pub fn most_consumed(&self, user_id: i64) -> Option<i64> {
        let per_user = self.counts.get(&user_id)?;
        let mut best: Option<(i64, u64)> = None;
        for (&compound_id, &count) in per_user {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((compound_id, count)),
            }
        }
        best.map(|(compound_id, _)| compound_id)
    }
}

/// Compound id → name lookup. The first row for a repeated id wins.
pub fn compound_names(compounds: &[CompoundRecord]) -> HashMap<i64, &str> {
    let mut names = HashMap::with_capacity(compounds.len());
    for compound in compounds {
        names
            .entry(compound.compound_id)
            .or_insert(compound.compound_name.as_str());
    }
    names
}
