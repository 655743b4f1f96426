use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cli::TriggerArgs;

#[derive(Debug, Clone, Serialize)]
struct RunExperimentsRequest<'a> {
    path_to_data: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct RunExperimentsResponse {
    #[serde(rename = "Success")]
    success: bool,
    #[serde(default)]
    rows_written: Option<u64>,
    #[serde(default)]
    users: Option<u64>,
    #[serde(default)]
    experiments: Option<u64>,
}

fn summarize(response: &RunExperimentsResponse) -> String {
    if !response.success {
        return "experiment ETL: server reported failure".to_string();
    }
    match (response.rows_written, response.users, response.experiments) {
        (Some(rows), Some(users), Some(experiments)) => format!(
            "experiment ETL: wrote {rows} rows ({users} users, {experiments} experiments)"
        ),
        _ => "experiment ETL: ok".to_string(),
    }
}

pub fn handle(args: TriggerArgs) -> Result<()> {
    let base = crate::config::resolve_api_url(args.api_url);
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(args.timeout_secs.max(1)))
        .build()?;
    let response = client
        .post(format!("{base}/experiments"))
        .json(&RunExperimentsRequest {
            path_to_data: &args.path_to_data,
        })
        .send()
        .with_context(|| format!("failed to call {base}/experiments"))?;

    let http_status = response.status();
    let text = response.text().unwrap_or_default();
    if !http_status.is_success() {
        anyhow::bail!("experiment ETL failed: {} {}", http_status, text);
    }

    if args.json {
        let value: serde_json::Value =
            serde_json::from_str(&text).context("failed to parse response JSON")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
        );
        return Ok(());
    }

    let parsed: RunExperimentsResponse =
        serde_json::from_str(&text).context("failed to parse experiment ETL response")?;
    println!("{}", summarize(&parsed));
    if !parsed.success {
        anyhow::bail!("experiment ETL did not report success");
    }
    Ok(())
}
