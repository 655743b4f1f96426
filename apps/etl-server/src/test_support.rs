use crate::config::EtlConfig;
use crate::db;
use crate::services::experiment_etl::SinkMode;
use crate::state::AppState;

pub fn test_config() -> EtlConfig {
    EtlConfig {
        database_url: Some("postgresql://postgres@localhost/postgres".to_string()),
        data_root: None,
        sink_mode: SinkMode::Upsert,
        db_max_connections: 1,
    }
}

pub fn test_state() -> AppState {
    let config = test_config();
    let database_url = config.require_database_url().expect("database url");
    let pool = db::connect_lazy(database_url, config.db_max_connections).expect("connect_lazy");
    AppState { config, db: pool }
}
