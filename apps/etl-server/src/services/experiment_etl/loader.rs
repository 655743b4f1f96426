use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use super::error::EtlError;
use super::types::{CompoundRecord, ExperimentRecord, InputRelations, UserRecord};

pub const USERS_FILE: &str = "users.csv";
pub const EXPERIMENTS_FILE: &str = "user_experiments.csv";
pub const COMPOUNDS_FILE: &str = "compounds.csv";

/// Resolves the locator from a trigger request into a data directory.
///
/// Relative locators are joined to `data_root` (or the working directory when no
/// root is configured). With a root configured, the resolved directory must stay
/// under it after symlinks are followed.
pub fn resolve_data_dir(data_root: Option<&Path>, requested: &str) -> Result<PathBuf, EtlError> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Err(EtlError::PathNotAllowed(
            "path_to_data must not be empty".to_string(),
        ));
    }
    let requested = Path::new(trimmed);
    if requested
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(EtlError::PathNotAllowed(format!(
            "{trimmed} must not contain '..' segments"
        )));
    }

    let Some(root) = data_root else {
        if !requested.is_dir() {
            return Err(EtlError::NotFound(requested.to_path_buf()));
        }
        return Ok(requested.to_path_buf());
    };

    let candidate = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        root.join(requested)
    };
    if !candidate.starts_with(root) {
        return Err(EtlError::PathNotAllowed(format!(
            "{trimmed} must reside under {}",
            root.display()
        )));
    }
    if !candidate.is_dir() {
        return Err(EtlError::NotFound(candidate));
    }
    let canonical = candidate
        .canonicalize()
        .map_err(|_| EtlError::NotFound(candidate.clone()))?;
    if !canonical.starts_with(root) {
        return Err(EtlError::PathNotAllowed(format!(
            "{trimmed} must reside under {}",
            root.display()
        )));
    }
    Ok(canonical)
}

/// Reads the three input relations from `dir`.
pub fn load_relations(dir: &Path) -> Result<InputRelations, EtlError> {
    if !dir.is_dir() {
        return Err(EtlError::NotFound(dir.to_path_buf()));
    }
    let users_path = dir.join(USERS_FILE);
    let experiments_path = dir.join(EXPERIMENTS_FILE);
    let compounds_path = dir.join(COMPOUNDS_FILE);

    let users = read_users(open(&users_path)?, &users_path)?;
    let experiments = read_experiments(open(&experiments_path)?, &experiments_path)?;
    let compounds = read_compounds(open(&compounds_path)?, &compounds_path)?;

    tracing::debug!(
        dir = %dir.display(),
        users = users.len(),
        experiments = experiments.len(),
        compounds = compounds.len(),
        "loaded input relations"
    );

    Ok(InputRelations {
        users,
        experiments,
        compounds,
    })
}

pub fn read_users<R: Read>(reader: R, source: &Path) -> Result<Vec<UserRecord>, EtlError> {
    let mut csv_reader = csv_reader(reader);
    let columns = Columns::from_reader(&mut csv_reader, source)?;
    let user_id_idx = columns.require("user_id")?;

    let mut users = Vec::new();
    for (idx, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|err| csv_error(source, err))?;
        let row = idx + 1;
        users.push(UserRecord {
            user_id: parse_i64(&record, user_id_idx, "user_id", row)?,
        });
    }
    Ok(users)
}

pub fn read_experiments<R: Read>(
    reader: R,
    source: &Path,
) -> Result<Vec<ExperimentRecord>, EtlError> {
    let mut csv_reader = csv_reader(reader);
    let columns = Columns::from_reader(&mut csv_reader, source)?;
    let user_id_idx = columns.require("user_id")?;
    let compounds_idx = columns.require("experiment_compound_ids")?;
    let run_time_idx = columns.require("experiment_run_time")?;

    let mut experiments = Vec::new();
    for (idx, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|err| csv_error(source, err))?;
        let row = idx + 1;
        let run_time_raw = cell(&record, run_time_idx);
        let experiment_run_time = run_time_raw
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| EtlError::parse("experiment_run_time", row, run_time_raw))?;
        experiments.push(ExperimentRecord {
            user_id: parse_i64(&record, user_id_idx, "user_id", row)?,
            experiment_run_time,
            experiment_compound_ids: cell(&record, compounds_idx).to_string(),
        });
    }
    Ok(experiments)
}

pub fn read_compounds<R: Read>(reader: R, source: &Path) -> Result<Vec<CompoundRecord>, EtlError> {
    let mut csv_reader = csv_reader(reader);
    let columns = Columns::from_reader(&mut csv_reader, source)?;
    let id_idx = columns.require("compound_id")?;
    let name_idx = columns.require("compound_name")?;

    let mut compounds = Vec::new();
    for (idx, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|err| csv_error(source, err))?;
        let row = idx + 1;
        compounds.push(CompoundRecord {
            compound_id: parse_i64(&record, id_idx, "compound_id", row)?,
            compound_name: cell(&record, name_idx).to_string(),
        });
    }
    Ok(compounds)
}

fn open(path: &Path) -> Result<File, EtlError> {
    File::open(path).map_err(|err| {
        tracing::debug!(path = %path.display(), error = %err, "input file not readable");
        EtlError::NotFound(path.to_path_buf())
    })
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn csv_error(source: &Path, err: csv::Error) -> EtlError {
    EtlError::Csv {
        path: source.to_path_buf(),
        source: err,
    }
}

fn cell<'a>(record: &'a csv::StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or("").trim()
}

fn parse_i64(
    record: &csv::StringRecord,
    idx: usize,
    field: &'static str,
    row: usize,
) -> Result<i64, EtlError> {
    let raw = cell(record, idx);
    raw.parse::<i64>()
        .map_err(|_| EtlError::parse(field, row, raw))
}

/// Header name → column index, matched case-insensitively.
struct Columns {
    file: String,
    index: HashMap<String, usize>,
}

impl Columns {
    fn from_reader<R: Read>(reader: &mut csv::Reader<R>, source: &Path) -> Result<Self, EtlError> {
        let headers = reader.headers().map_err(|err| csv_error(source, err))?;
        let mut index = HashMap::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            let key = header.trim().trim_start_matches('\u{feff}').to_lowercase();
            index.entry(key).or_insert(idx);
        }
        let file = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());
        Ok(Self { file, index })
    }

    fn require(&self, column: &str) -> Result<usize, EtlError> {
        self.index
            .get(column)
            .copied()
            .ok_or_else(|| EtlError::Schema {
                file: self.file.clone(),
                column: column.to_string(),
            })
    }
}
