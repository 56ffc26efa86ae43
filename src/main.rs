use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pmayg_insights::catalog::Catalog;
use pmayg_insights::execution::{QueryResult, Record, RowSet};
use pmayg_insights::narrator::OverviewNarrator;
use pmayg_insights::{validate, AppConfig, CompletionOracle, Executor, LlmClient, Pipeline};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pmayg-insights")]
#[command(about = "Ask questions about PMAY-G fund allocation in plain language")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a question: generated SQL, result, chart choice and insights
    Ask {
        question: String,

        /// How to print the query result
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
    /// Summarize the whole programme from fixed aggregate queries
    Overview,
    /// Check a SQL statement against the safety rules without running it
    Validate { sql: String },
    /// Print the schema, hierarchy rules and few-shot examples
    Schema,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Validate { sql } => match validate(&sql) {
            Ok(query) => println!("{}", query),
            Err(e) => {
                eprintln!("cannot run this query: {}", e);
                std::process::exit(1);
            }
        },
        Command::Schema => {
            let catalog = Catalog::pmayg();
            println!("{}\nHierarchy rules:\n{}\n\n{}", catalog.schema, Catalog::hierarchy_rules(), catalog.few_shot_block());
        }
        Command::Ask { question, format } => {
            let (oracle, executor) = connect()?;
            let pipeline = Pipeline::new(oracle, executor, Catalog::pmayg());
            let outcome = pipeline.run(&question).await?;

            if let Format::Json = format {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                return Ok(());
            }

            println!("=== SQL ===\n{}\n", outcome.sql.as_deref().unwrap_or("N/A"));
            println!("=== Result ===");
            print_result(&outcome.result, format)?;
            if let Some(chart) = &outcome.chart {
                println!("\n=== Chart ===\n{}", serde_json::to_string_pretty(chart)?);
            }
            println!("\n=== Insights ===\n{}", outcome.insights);
        }
        Command::Overview => {
            let (oracle, executor) = connect()?;
            let summary = OverviewNarrator::new(oracle, executor).summarize().await?;
            println!("{}", summary);
        }
    }

    Ok(())
}

fn connect() -> Result<(Arc<dyn CompletionOracle>, Executor)> {
    let config = AppConfig::from_env()?;
    info!(database = ?config.database, llm = ?config.llm, "loaded configuration");

    let oracle: Arc<dyn CompletionOracle> = Arc::new(LlmClient::new(&config.llm)?);
    let executor = Executor::from_config(&config.database).context("configuring database store")?;
    Ok((oracle, executor))
}

fn print_result(result: &QueryResult, format: Format) -> Result<()> {
    match result {
        QueryResult::Rows(rows) if rows.is_empty() => println!("No data returned."),
        QueryResult::Rows(rows) => match format {
            Format::Csv => print_csv(rows)?,
            _ => print_table(rows),
        },
        other => println!("{}", serde_json::to_string(other)?),
    }
    Ok(())
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Cells of one record in declared column order.
fn row_cells(rows: &RowSet, record: &Record) -> Vec<String> {
    rows.columns()
        .iter()
        .map(|column| cell(record.get(column).unwrap_or(&Value::Null)))
        .collect()
}

fn print_csv(rows: &RowSet) -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record(rows.columns())?;
    for record in rows.records() {
        writer.write_record(row_cells(rows, record))?;
    }
    writer.flush()?;
    Ok(())
}

fn print_table(rows: &RowSet) {
    let cells: Vec<Vec<String>> = rows
        .records()
        .iter()
        .map(|record| row_cells(rows, record))
        .collect();
    let widths: Vec<usize> = rows
        .columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            cells
                .iter()
                .map(|row| row.get(i).map_or(0, |c| c.chars().count()))
                .chain(std::iter::once(col.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: Vec<&str>| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    println!("{}", line(rows.columns().iter().map(String::as_str).collect()));
    println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    for row in &cells {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
}
