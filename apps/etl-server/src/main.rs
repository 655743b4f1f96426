use anyhow::{Context, Result};
use clap::Parser;
use etl_server::services::experiment_etl;
use etl_server::{cli, config, db, openapi, routes, state};
use tokio::net::TcpListener;

async fn bind_listener(addr: &str) -> Result<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Failed to bind etl-server listener on {addr}: port already in use. Stop the other service using this port or re-run with --port to choose another port.",
            );
        }
        Err(err) => Err(err).with_context(|| format!("failed to bind etl-server listener on {addr}")),
    }
}

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,etl_server=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    if args.print_openapi {
        println!(
            "{}",
            serde_json::to_string_pretty(&openapi::openapi_json())?
        );
        return Ok(());
    }

    init_tracing()?;
    let config = config::EtlConfig::from_env()?;

    if let Some(path) = args.dry_run.as_deref() {
        let rows = experiment_etl::run_dry(&config, path)
            .await
            .with_context(|| format!("dry run failed for {path}"))?;
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let pool = db::connect_lazy(config.require_database_url()?, config.db_max_connections)?;
    if let Err(err) = experiment_etl::sink::ensure_table(&pool).await {
        tracing::warn!("failed to ensure derived_exp_data exists: {err:#}");
    }

    tracing::info!(
        sink_mode = %config.sink_mode,
        data_root = ?config.data_root,
        "experiment ETL configured"
    );
    let app = routes::router(state::AppState { config, db: pool });
    let addr = format!("{}:{}", args.host, args.port);
    let listener = bind_listener(&addr).await?;
    tracing::info!(bind = %addr, "etl-server HTTP listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("etl-server exited with an error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::bind_listener;
    use anyhow::Result;

    #[tokio::test]
    async fn reports_port_in_use_with_actionable_message() -> Result<()> {
        let listener = match std::net::TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => listener,
            Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                // Sandbox environments can block binding attempts.
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let addr = listener.local_addr()?;

        let err = bind_listener(&addr.to_string()).await.unwrap_err();
        let message = err.to_string().to_lowercase();
        if message.contains("operation not permitted") {
            return Ok(());
        }

        assert!(message.contains(&addr.to_string()));
        assert!(message.contains("port already in use"));
        assert!(message.contains("--port"));

        drop(listener);
        Ok(())
    }
}
