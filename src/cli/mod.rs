//! Ames price predictor CLI
//!
//! Command-line interface for training, batch prediction and serving.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::features::{RawRecord, ScalerType};
use crate::inference::Predictor;
use crate::training::{TrainEngine, TrainingConfig};
use crate::utils::{dataframe_to_records, DataLoader, DataSaver};

/// Column written by `predict --save`
pub const PREDICTION_COLUMN: &str = "Predicted Sale Price";

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ames-predictor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ames housing sale price prediction")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the prediction server
    Serve {
        /// Host to bind to [env: API_HOST]
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on [env: API_PORT]
        #[arg(short, long)]
        port: Option<u16>,

        /// Model artifact [env: MODEL_PATH]
        #[arg(long)]
        model: Option<PathBuf>,

        /// Feature schema [env: SCHEMA_PATH]
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Predict sale prices from JSON, CSV or an inline row
    Predict {
        #[command(flatten)]
        input: PredictInput,

        /// Model artifact [env: MODEL_PATH]
        #[arg(long)]
        model: Option<PathBuf>,

        /// Feature schema [env: SCHEMA_PATH]
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Write predictions to this CSV instead of printing them
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Train a model and write serving artifacts
    Train {
        /// Labelled CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long, default_value = "SalePrice")]
        target: String,

        /// Directory for model.json, feature_schema.json and training_report.json
        #[arg(short, long, default_value = "models")]
        out_dir: PathBuf,

        /// Comma-separated feature list (default: base fields plus TotalSF and HouseAge)
        #[arg(long, value_delimiter = ',')]
        features: Vec<String>,

        /// Scaler (standard, minmax, robust, none)
        #[arg(long, default_value = "standard")]
        scaler: ScalerType,

        /// Number of cross-validation folds
        #[arg(long, default_value = "5")]
        cv_folds: usize,

        /// Held-out fraction for the final evaluation
        #[arg(long, default_value = "0.2")]
        test_size: f64,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

/// Exactly one input source for `predict`
#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
pub struct PredictInput {
    /// JSON file holding a list of rows or a single object
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// CSV file with a header row
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Inline JSON object for a single row
    #[arg(long)]
    pub row: Option<String>,
}

// ─── Helpers ───────────────────────────────────────────────────────────────────

/// Two decimals with thousands separators, e.g. `123,456.78`
pub fn format_price(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

/// Records from a JSON document: a list of rows or a single object
pub fn records_from_json(value: serde_json::Value) -> anyhow::Result<Vec<RawRecord>> {
    match value {
        serde_json::Value::Array(_) => Ok(serde_json::from_value(value)?),
        serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        _ => anyhow::bail!("expected a JSON object or a list of objects"),
    }
}

fn load_records(input: &PredictInput) -> anyhow::Result<Vec<RawRecord>> {
    if let Some(path) = &input.json {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
        records_from_json(serde_json::from_str(&text)?)
    } else if let Some(path) = &input.csv {
        let df = DataLoader::new().load_csv(path)?;
        Ok(dataframe_to_records(&df)?)
    } else if let Some(row) = &input.row {
        Ok(vec![serde_json::from_str(row)?])
    } else {
        anyhow::bail!("one of --json, --csv or --row is required")
    }
}

fn resolve_paths(model: Option<&Path>, schema: Option<&Path>) -> (PathBuf, PathBuf) {
    let defaults = crate::server::ServerConfig::default();
    (
        model.map(Path::to_path_buf).unwrap_or(defaults.model_path),
        schema.map(Path::to_path_buf).unwrap_or(defaults.schema_path),
    )
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Load artifacts, predict every input row, then print or save.
pub fn cmd_predict(
    input: &PredictInput,
    model: Option<&Path>,
    schema: Option<&Path>,
    save: Option<&Path>,
) -> anyhow::Result<()> {
    let (model_path, schema_path) = resolve_paths(model, schema);
    let predictor = Predictor::load(&schema_path, &model_path)?;

    let records = load_records(input)?;
    let predictions = predictor.predict_records(&records)?;

    match save {
        Some(path) => {
            let mut df = DataFrame::new(vec![Column::new(PREDICTION_COLUMN.into(), predictions)])?;
            DataSaver::save_csv(&mut df, path)?;
            println!("Saved predictions -> {}", path.display());
        }
        None => {
            for (i, value) in predictions.iter().enumerate() {
                println!("Row {}: ${}", i, format_price(*value));
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    data_path: &Path,
    target: &str,
    out_dir: &Path,
    features: &[String],
    scaler: ScalerType,
    cv_folds: usize,
    test_size: f64,
    seed: u64,
) -> anyhow::Result<()> {
    section("Train");

    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_csv(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let mut config = TrainingConfig::new(target)
        .with_scaler(scaler)
        .with_cv_folds(cv_folds)
        .with_test_size(test_size)
        .with_seed(seed)
        .with_output_dir(out_dir);
    if !features.is_empty() {
        config = config.with_features(features.to_vec());
    }
    let n_candidates = config.candidates.len();

    step_run(&format!("Cross-validating {} candidates", n_candidates));
    let start = Instant::now();
    let engine = TrainEngine::new(config);
    let outcome = engine.fit(&df)?;
    step_done(&format!("{:?}", start.elapsed()));

    step_run("Writing artifacts");
    engine.save(&outcome)?;
    step_done(&out_dir.display().to_string());

    let report = &outcome.report;
    println!();
    for (i, candidate) in report.candidates.iter().enumerate() {
        let marker = if i == report.selected_index { ok("●") } else { dim("○") };
        println!(
            "  {} {:<44} {}",
            marker,
            candidate.label,
            format!("{:.2}", candidate.cv.mean_rmse).white()
        );
    }
    println!();
    println!("  {:<16} {}", muted("Selected"), report.selected.cyan().bold());
    if let Some(m) = &report.test_metrics {
        println!("  {:<16} {}", muted("Test RMSE"), format!("${}", format_price(m.rmse)).white().bold());
        println!("  {:<16} {}", muted("Test R²"), format!("{:.4}", m.r2).white());
    }
    println!(
        "  {:<16} {}",
        muted("Rows"),
        format!("{} used, {} dropped", report.n_train + report.n_test, report.n_rows_dropped).white()
    );
    println!("  {:<16} {}", muted("Time"), format!("{:.3}s", report.duration_secs).white());
    println!();

    Ok(())
}

pub async fn cmd_serve(
    host: Option<String>,
    port: Option<u16>,
    model: Option<PathBuf>,
    schema: Option<PathBuf>,
) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    let defaults = ServerConfig::default();
    let config = ServerConfig {
        host: host.unwrap_or(defaults.host),
        port: port.unwrap_or(defaults.port),
        model_path: model.unwrap_or(defaults.model_path),
        schema_path: schema.unwrap_or(defaults.schema_path),
        ..defaults
    };

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Ames Price Predictor".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Health ", &format!("GET  http://{}:{}/health", config.host, config.port)));
    line_box(&kv("Predict", &format!("POST http://{}:{}/predict", config.host, config.port)));
    line_box(&kv("Model  ", &config.model_path.display().to_string()));
    line_box(&kv("Schema ", &config.schema_path.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(123456.784), "123,456.78");
        assert_eq!(format_price(999.5), "999.50");
        assert_eq!(format_price(1000.0), "1,000.00");
        assert_eq!(format_price(1234567.0), "1,234,567.00");
        assert_eq!(format_price(-2500.0), "-2,500.00");
        assert_eq!(format_price(0.0), "0.00");
    }

    #[test]
    fn test_records_from_json() {
        let single = serde_json::json!({"Gr Liv Area": 1800});
        assert_eq!(records_from_json(single).unwrap().len(), 1);

        let list = serde_json::json!([{"Gr Liv Area": 1800}, {"Gr Liv Area": 900}]);
        assert_eq!(records_from_json(list).unwrap().len(), 2);

        assert!(records_from_json(serde_json::json!(42)).is_err());
        assert!(records_from_json(serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_cli_parses_predict_row() {
        let cli = Cli::try_parse_from([
            "ames-predictor",
            "predict",
            "--row",
            r#"{"Gr Liv Area": 1800}"#,
        ])
        .unwrap();
        match cli.command {
            Commands::Predict { input, save, .. } => {
                assert!(input.row.is_some());
                assert!(save.is_none());
            }
            _ => panic!("expected predict"),
        }
    }

    #[test]
    fn test_cli_requires_single_input() {
        assert!(Cli::try_parse_from(["ames-predictor", "predict"]).is_err());
        assert!(Cli::try_parse_from([
            "ames-predictor",
            "predict",
            "--row",
            "{}",
            "--csv",
            "a.csv",
        ])
        .is_err());
    }

    #[test]
    fn test_cli_train_features() {
        let cli = Cli::try_parse_from([
            "ames-predictor",
            "train",
            "--data",
            "ames.csv",
            "--features",
            "Gr Liv Area,TotalSF",
            "--scaler",
            "robust",
        ])
        .unwrap();
        match cli.command {
            Commands::Train { features, scaler, target, .. } => {
                assert_eq!(features, vec!["Gr Liv Area".to_string(), "TotalSF".to_string()]);
                assert_eq!(scaler, ScalerType::Robust);
                assert_eq!(target, "SalePrice");
            }
            _ => panic!("expected train"),
        }
    }
}
