use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Component, PathBuf};

use crate::services::experiment_etl::SinkMode;

const DEFAULT_DB_HOST: &str = "127.0.0.1";
const DEFAULT_DB_PORT: u16 = 5432;

fn config_file_path() -> Option<PathBuf> {
    env_optional_string("ETL_CONFIG_PATH").map(PathBuf::from)
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFileOverrides {
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    data_root: Option<String>,
    #[serde(default)]
    sink_mode: Option<String>,
    #[serde(default)]
    db_max_connections: Option<u32>,
}

fn load_config_file_overrides() -> Option<ConfigFileOverrides> {
    let path = config_file_path()?;
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to read ETL config file; using env defaults"
            );
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse ETL config file; using env defaults"
            );
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct EtlConfig {
    /// Unset only matters when the sink is used; `--dry-run` works without it.
    pub database_url: Option<String>,
    /// Directory that request locators are resolved against and confined to.
    pub data_root: Option<PathBuf>,
    pub sink_mode: SinkMode,
    pub db_max_connections: u32,
}

impl EtlConfig {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let overrides = load_config_file_overrides().unwrap_or_default();

        let database_url = env_optional_string("ETL_DATABASE_URL")
            .or_else(|| env_optional_string("DATABASE_URL"))
            .or_else(|| trimmed(overrides.database_url.as_deref()))
            .or_else(database_url_from_parts)
            .map(normalize_database_url);

        let data_root = env_optional_string("ETL_DATA_ROOT")
            .or_else(|| trimmed(overrides.data_root.as_deref()))
            .map(|raw| validate_data_root(PathBuf::from(raw)))
            .transpose()?;

        let sink_mode = match env_optional_string("ETL_SINK_MODE")
            .or_else(|| trimmed(overrides.sink_mode.as_deref()))
        {
            Some(raw) => raw
                .parse::<SinkMode>()
                .map_err(|err| anyhow::anyhow!("invalid ETL_SINK_MODE: {err}"))?,
            None => SinkMode::default(),
        };

        let db_max_connections = parse_u32_setting(
            "ETL_DB_MAX_CONNECTIONS",
            env_optional_string("ETL_DB_MAX_CONNECTIONS"),
        )?
        .or(overrides.db_max_connections)
            .unwrap_or(5)
            .clamp(1, 64);

        Ok(Self {
            database_url,
            data_root,
            sink_mode,
            db_max_connections,
        })
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().context(
            "ETL_DATABASE_URL must be set (or DATABASE_URL, database_url in ETL_CONFIG_PATH, or DB_NAME/DB_USER)",
        )
    }
}

/// Builds a URL from the discrete `DB_*` variables.
fn database_url_from_parts() -> Option<String> {
    let name = env_optional_string("DB_NAME")?;
    let user = env_optional_string("DB_USER")?;
    let host = env_optional_string("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string());
    let port = env_optional_string("DB_PORT")
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_DB_PORT);
    Some(match env_optional_string("DB_PASSWORD") {
        Some(password) => format!("postgresql://{user}:{password}@{host}:{port}/{name}"),
        None => format!("postgresql://{user}@{host}:{port}/{name}"),
    })
}

fn validate_data_root(path: PathBuf) -> Result<PathBuf> {
    if !path.is_absolute() {
        anyhow::bail!("ETL_DATA_ROOT must be an absolute path");
    }
    if path
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        anyhow::bail!("ETL_DATA_ROOT must not contain '..' segments");
    }
    path.canonicalize()
        .with_context(|| format!("failed to canonicalize ETL_DATA_ROOT ({})", path.display()))
}

fn normalize_database_url(url: String) -> String {
    if let Some(stripped) = url.strip_prefix("postgresql+psycopg2://") {
        return format!("postgresql://{stripped}");
    }
    if let Some(stripped) = url.strip_prefix("postgresql+psycopg://") {
        return format!("postgresql://{stripped}");
    }
    url
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn env_optional_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_u32_setting(key: &str, raw: Option<String>) -> Result<Option<u32>> {
    raw.map(|value| {
        value
            .parse::<u32>()
            .with_context(|| format!("invalid {key}: {value:?} is not a non-negative integer"))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_driver_prefixed_urls() {
        assert_eq!(
            normalize_database_url("postgresql+psycopg2://u:p@db/etl".to_string()),
            "postgresql://u:p@db/etl"
        );
        assert_eq!(
            normalize_database_url("postgres://u@db/etl".to_string()),
            "postgres://u@db/etl"
        );
    }

    #[test]
    fn missing_database_url_is_reported() {
        let config = EtlConfig {
            database_url: None,
            data_root: None,
            sink_mode: SinkMode::Upsert,
            db_max_connections: 5,
        };
        let err = config.require_database_url().unwrap_err();
        assert!(err.to_string().contains("ETL_DATABASE_URL"));
    }

    #[test]
    fn malformed_max_connections_is_rejected() -> Result<()> {
        let err = parse_u32_setting("ETL_DB_MAX_CONNECTIONS", Some("ten".to_string())).unwrap_err();
        assert!(err.to_string().contains("ETL_DB_MAX_CONNECTIONS"));
        assert!(err.to_string().contains("ten"));
        assert_eq!(
            parse_u32_setting("ETL_DB_MAX_CONNECTIONS", Some("12".to_string()))?,
            Some(12)
        );
        assert_eq!(parse_u32_setting("ETL_DB_MAX_CONNECTIONS", None)?, None);
        Ok(())
    }

    #[test]
    fn rejects_relative_or_parent_data_roots() {
        assert!(validate_data_root(PathBuf::from("data")).is_err());
        assert!(validate_data_root(PathBuf::from("/tmp/../etc")).is_err());
    }

    #[test]
    fn canonicalizes_existing_data_root() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = validate_data_root(temp.path().to_path_buf())?;
        assert_eq!(root, temp.path().canonicalize()?);
        Ok(())
    }

    #[test]
    fn parses_config_file_overrides() -> Result<()> {
        let overrides: ConfigFileOverrides = serde_json::from_str(
            r#"{"database_url": " postgresql://etl@db/etl ", "sink_mode": "append"}"#,
        )?;
        assert_eq!(
            trimmed(overrides.database_url.as_deref()).as_deref(),
            Some("postgresql://etl@db/etl")
        );
        assert_eq!(overrides.sink_mode.as_deref(), Some("append"));
        assert!(overrides.data_root.is_none());
        Ok(())
    }
}
