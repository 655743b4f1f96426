use anyhow::{Context, Result};
use postgres::{Client, NoTls};
use serde::Serialize;

use crate::cli::ValidateArgs;

const SELECT_SUMMARY_SQL: &str = "SELECT user_id, total_exp_per_user, avg_experiment_count, \
     avg_exp_time_per_user, most_consumed_compound_id, most_consumed_compound_name \
     FROM derived_exp_data ORDER BY user_id";

const HEADERS: [&str; 6] = [
    "user_id",
    "total_exp_per_user",
    "avg_experiment_count",
    "avg_exp_time_per_user",
    "most_consumed_compound_id",
    "most_consumed_compound_name",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
struct SummaryRow {
    user_id: i64,
    total_exp_per_user: i64,
    avg_experiment_count: f64,
    avg_exp_time_per_user: f64,
    most_consumed_compound_id: Option<i64>,
    most_consumed_compound_name: Option<String>,
}

impl SummaryRow {
    fn cells(&self) -> [String; 6] {
        [
            self.user_id.to_string(),
            self.total_exp_per_user.to_string(),
            format!("{:.2}", self.avg_experiment_count),
            format!("{:.2}", self.avg_exp_time_per_user),
            self.most_consumed_compound_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.most_consumed_compound_name
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        ]
    }
}

fn fetch_rows(client: &mut Client) -> Result<Vec<SummaryRow>> {
    let rows = client
        .query(SELECT_SUMMARY_SQL, &[])
        .context("failed to query derived_exp_data (has the pipeline run yet?)")?;
    rows.iter()
        .map(|row| -> Result<SummaryRow> {
            Ok(SummaryRow {
                user_id: row.try_get(0)?,
                total_exp_per_user: row.try_get(1)?,
                avg_experiment_count: row.try_get(2)?,
                avg_exp_time_per_user: row.try_get(3)?,
                most_consumed_compound_id: row.try_get(4)?,
                most_consumed_compound_name: row.try_get(5)?,
            })
        })
        .collect()
}

fn format_line<S: AsRef<str>>(values: &[S], widths: &[usize]) -> String {
    values
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{:<width$}", value.as_ref(), width = *width))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn render_table(rows: &[SummaryRow]) -> String {
    let cells: Vec<[String; 6]> = rows.iter().map(SummaryRow::cells).collect();
    let mut widths = HEADERS.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let rule = widths.map(|width| "-".repeat(width));
    let mut lines = vec![format_line(&HEADERS, &widths), format_line(&rule, &widths)];
    lines.extend(cells.iter().map(|row| format_line(row, &widths)));
    lines.join("\n")
}

pub fn handle(args: ValidateArgs) -> Result<()> {
    let database_url = crate::config::resolve_database_url(args.database_url)?;
    let mut client =
        Client::connect(&database_url, NoTls).context("failed to connect to database")?;
    let rows = fetch_rows(&mut client)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("derived_exp_data: no rows");
        return Ok(());
    }
    println!("{}", render_table(&rows));
    println!("({} rows)", rows.len());
    Ok(())
}
