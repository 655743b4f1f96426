use anyhow::{bail, Result};
use std::env;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn resolve_api_url(override_url: Option<String>) -> String {
    resolve_api_url_with(override_url, env_lookup)
}

fn resolve_api_url_with(
    override_url: Option<String>,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    non_empty(override_url)
        .or_else(|| non_empty(lookup("ETL_API_URL")))
        .map(|url| url.trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

pub fn resolve_database_url(database_url: Option<String>) -> Result<String> {
    resolve_database_url_with(database_url, env_lookup)
}

fn resolve_database_url_with(
    database_url: Option<String>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    let url = non_empty(database_url)
        .or_else(|| non_empty(lookup("ETL_DATABASE_URL")))
        .or_else(|| non_empty(lookup("DATABASE_URL")))
        .or_else(|| database_url_from_parts(&lookup));
    match url {
        Some(url) => Ok(postgres_connection_string(&url)),
        None => bail!(
            "database_url not provided (set ETL_DATABASE_URL/DATABASE_URL, DB_NAME and DB_USER, or pass --database-url)"
        ),
    }
}

fn database_url_from_parts(lookup: &impl Fn(&str) -> Option<String>) -> Option<String> {
    let name = non_empty(lookup("DB_NAME"))?;
    let user = non_empty(lookup("DB_USER"))?;
    let host = non_empty(lookup("DB_HOST")).unwrap_or_else(|| "127.0.0.1".to_string());
    let port = non_empty(lookup("DB_PORT"))
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(5432);
    Some(match non_empty(lookup("DB_PASSWORD")) {
        Some(password) => format!("postgresql://{user}:{password}@{host}:{port}/{name}"),
        None => format!("postgresql://{user}@{host}:{port}/{name}"),
    })
}

/// Strips a `+driver` suffix from the scheme so libpq-style clients accept the URL.
pub fn postgres_connection_string(database_url: &str) -> String {
    let (scheme, rest) = match database_url.split_once("://") {
        Some(parts) => parts,
        None => return database_url.to_string(),
    };
    let (base, _driver) = match scheme.split_once('+') {
        Some(parts) => parts,
        None => return database_url.to_string(),
    };
    if base != "postgresql" {
        return database_url.to_string();
    }
    format!("postgresql://{rest}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn api_url_prefers_flag_then_env_then_default() {
        let env = lookup_from(&[("ETL_API_URL", "http://etl:9000/")]);
        assert_eq!(
            resolve_api_url_with(Some("http://flag:1/".to_string()), &env),
            "http://flag:1"
        );
        assert_eq!(resolve_api_url_with(None, &env), "http://etl:9000");
        assert_eq!(
            resolve_api_url_with(Some("  ".to_string()), lookup_from(&[])),
            DEFAULT_API_URL
        );
    }

    #[test]
    fn database_url_falls_back_to_discrete_parts() -> Result<()> {
        let env = lookup_from(&[
            ("DB_NAME", "experiments"),
            ("DB_USER", "etl"),
            ("DB_PASSWORD", "secret"),
            ("DB_HOST", "db"),
        ]);
        assert_eq!(
            resolve_database_url_with(None, env)?,
            "postgresql://etl:secret@db:5432/experiments"
        );
        Ok(())
    }

    #[test]
    fn database_url_env_beats_parts_and_flag_beats_env() -> Result<()> {
        let env = lookup_from(&[
            ("DATABASE_URL", "postgresql+psycopg2://a@h/db"),
            ("DB_NAME", "ignored"),
            ("DB_USER", "ignored"),
        ]);
        assert_eq!(resolve_database_url_with(None, &env)?, "postgresql://a@h/db");
        assert_eq!(
            resolve_database_url_with(Some("postgresql://flag@h/db".to_string()), &env)?,
            "postgresql://flag@h/db"
        );
        Ok(())
    }

    #[test]
    fn database_url_missing_is_an_error() {
        let err = resolve_database_url_with(None, lookup_from(&[("DB_NAME", "x")])).unwrap_err();
        assert!(err.to_string().contains("--database-url"));
    }

    #[test]
    fn keeps_plain_urls_untouched() {
        assert_eq!(
            postgres_connection_string("postgres://u@h/db"),
            "postgres://u@h/db"
        );
        assert_eq!(postgres_connection_string("host=h user=u"), "host=h user=u");
    }
}
