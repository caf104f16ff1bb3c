//! # Command Line Interface
//!
//! CLI for tracking events and querying analytics data from a local data directory.

use crate::config::AnalyticsConfig;
use crate::export::{AnalyticsExport, ExportFormat};
use crate::metric::{AggregationType, Metadata, MetricType};
use crate::range::DateRange;
use crate::summary::Period;
use crate::{init_analytics, AnalyticsEngine};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Analytics CLI for the farm supply marketplace
#[derive(Parser, Debug)]
#[command(name = "analytics-cli")]
#[command(about = "Analytics CLI for the farm supply marketplace admin")]
pub struct Cli {
    /// Path to analytics data storage (overrides the config file)
    #[arg(short, long)]
    pub data_path: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Log format: text, json or pretty
    #[arg(long, default_value = "text")]
    pub log_format: String,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the dashboard summary
    Summary {
        /// Days to look back
        #[arg(long, default_value = "30")]
        days: i64,
    },
    /// Show one metric in time buckets
    Aggregate {
        /// Metric type, e.g. revenue or orders_count
        metric_type: MetricType,
        /// daily, weekly, monthly, yearly or real_time
        #[arg(long, default_value = "daily")]
        aggregation: AggregationType,
        /// Days to look back
        #[arg(long, default_value = "30")]
        days: i64,
    },
    /// Show growth of one metric against the previous period
    Growth {
        metric_type: MetricType,
        /// day, week or month
        #[arg(long, default_value = "week")]
        period: Period,
    },
    /// Export records as JSON or CSV
    Export {
        #[arg(long, default_value = "json")]
        format: ExportFormat,
        /// Only records from the last N days
        #[arg(long)]
        days: Option<i64>,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import a JSON export
    Import {
        input: PathBuf,
    },
    /// Record one event and flush it
    Track {
        metric_type: MetricType,
        #[arg(long, default_value = "1")]
        value: f64,
        /// Metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Show system status
    Status,
}

impl Cli {
    /// Resolve configuration: file, then environment, then command-line flags
    pub fn load_config(&self) -> Result<AnalyticsConfig> {
        let config = match &self.config {
            Some(path) => {
                let path = path.to_string_lossy();
                AnalyticsConfig::load_from_file(&path)
                    .with_context(|| format!("Failed to load config from {path}"))?
            }
            None => AnalyticsConfig::default(),
        };

        let mut config = config.with_env_overrides()?;
        if let Some(data_path) = &self.data_path {
            config.storage.base_path = data_path.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

/// CLI handler
pub struct CliHandler {
    engine: AnalyticsEngine,
}

impl CliHandler {
    /// Create new CLI handler
    pub async fn new(config: AnalyticsConfig) -> Result<Self> {
        let engine = init_analytics(config).await?;
        Ok(Self { engine })
    }

    pub fn engine(&self) -> &AnalyticsEngine {
        &self.engine
    }

    /// Handle CLI commands
    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Summary { days } => self.show_summary(days).await,
            Commands::Aggregate { metric_type, aggregation, days } => {
                self.show_aggregate(metric_type, aggregation, days).await
            }
            Commands::Growth { metric_type, period } => self.show_growth(metric_type, period).await,
            Commands::Export { format, days, output } => self.export(format, days, output).await,
            Commands::Import { input } => self.import(input).await,
            Commands::Track { metric_type, value, metadata } => {
                self.track(metric_type, value, metadata.as_deref()).await
            }
            Commands::Status => self.show_status().await,
        }
    }

    async fn show_summary(&self, days: i64) -> Result<()> {
        let range = DateRange::last_days(days, Utc::now())?;
        let summary = self.engine.query_engine().get_dashboard_summary(&range).await?;

        println!("📊 Dashboard Summary (Last {} days)", days);
        println!("{}", "=".repeat(50));
        println!("New registrations:    {}", summary.new_registrations);
        println!("Active users (peak):  {}", summary.active_users);
        println!("Total revenue:        {:.2}", summary.total_revenue);
        println!("Total orders:         {}", summary.total_orders);
        println!("Uploads:              {} ({} approved)", summary.total_uploads, summary.approved_uploads);
        println!("Materials sold:       {} ({:.2} revenue)", summary.materials_sold, summary.materials_revenue);
        println!(
            "Payments:             {} submitted, {} approved",
            summary.payment_submissions, summary.payment_approvals
        );
        println!("Conversion rate:      {:.2}%", summary.conversion_rate);
        println!("Average order value:  {:.2}", summary.average_order_value);

        Ok(())
    }

    async fn show_aggregate(&self, metric_type: MetricType, aggregation: AggregationType, days: i64) -> Result<()> {
        let range = DateRange::last_days(days, Utc::now())?;
        let points = self
            .engine
            .query_engine()
            .get_aggregated_metrics(metric_type, aggregation, Some(&range))
            .await?;

        println!("📈 {} by {} (Last {} days)", metric_type, aggregation, days);
        println!("{}", "=".repeat(50));

        if points.is_empty() {
            println!("No data found");
        }
        for point in points {
            println!("{:<26} {:>12.2}  ({} records)", point.bucket, point.value, point.count);
        }

        Ok(())
    }

    async fn show_growth(&self, metric_type: MetricType, period: Period) -> Result<()> {
        let growth = self.engine.query_engine().get_growth_metrics(metric_type, period).await?;

        println!("📈 {} growth over the last {}", metric_type, period);
        println!("{}", "=".repeat(50));
        println!("Current:  {}", growth.current);
        println!("Previous: {}", growth.previous);
        println!("Growth:   {:.2}%", growth.growth_rate);

        Ok(())
    }

    async fn export(&self, format: ExportFormat, days: Option<i64>, output: Option<PathBuf>) -> Result<()> {
        let range = days.map(|d| DateRange::last_days(d, Utc::now())).transpose()?;
        let export = self.engine.query_engine().export_analytics(format, range.as_ref()).await?;
        let rendered = export.render()?;

        match output {
            Some(path) => {
                tokio::fs::write(&path, rendered)
                    .await
                    .with_context(|| format!("Failed to write export to {}", path.display()))?;
                println!("✅ Exported {} records to {}", export.total_records, path.display());
            }
            None => print!("{}", rendered),
        }

        Ok(())
    }

    async fn import(&self, input: PathBuf) -> Result<()> {
        let content = tokio::fs::read_to_string(&input)
            .await
            .with_context(|| format!("Failed to read {}", input.display()))?;
        let export = AnalyticsExport::from_json(&content)
            .with_context(|| format!("{} is not a JSON export", input.display()))?;

        let total = export.total_records;
        let imported = self.engine.query_engine().import_analytics(export).await?;
        println!("✅ Imported {} of {} records", imported, total);

        Ok(())
    }

    async fn track(&self, metric_type: MetricType, value: f64, metadata: Option<&str>) -> Result<()> {
        let metadata: Metadata = match metadata {
            Some(raw) => serde_json::from_str(raw).context("--metadata must be a JSON object")?,
            None => Metadata::new(),
        };

        self.engine.tracker().track_event(metric_type, value, metadata)?;
        self.engine.shutdown().await?;
        println!("✅ Tracked {} = {}", metric_type, value);

        Ok(())
    }

    async fn show_status(&self) -> Result<()> {
        let config = self.engine.config();
        let records = self.engine.store().count().await;
        let range = DateRange::last_days(30, Utc::now())?;
        let totals = self.engine.query_engine().aggregator().totals_by_category(&range).await?;

        println!("📈 Analytics System Status");
        println!("{}", "=".repeat(50));
        println!("Data directory: {}", config.storage_path().display());
        println!("Stored records: {}", records);
        println!("Tracker:        {:?} ({} pending)", self.engine.tracker().state(), self.engine.tracker().pending());

        if !totals.is_empty() {
            println!("\nLast 30 days by category:");
            for (category, total) in totals {
                println!("  {:<12} {:>12.2}", category, total);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> AnalyticsConfig {
        let mut config = AnalyticsConfig::default();
        config.storage.base_path = dir.path().to_path_buf();
        config.seed.enabled = false;
        config
    }

    #[test]
    fn test_parse_aggregate_args() {
        let cli = Cli::try_parse_from([
            "analytics-cli",
            "--data-path",
            "/tmp/farm",
            "aggregate",
            "orders-count",
            "--aggregation",
            "weekly",
        ])
        .unwrap();

        match cli.command {
            Commands::Aggregate { metric_type, aggregation, days } => {
                assert_eq!(metric_type, MetricType::OrdersCount);
                assert_eq!(aggregation, AggregationType::Weekly);
                assert_eq!(days, 30);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_metric_rejected() {
        assert!(Cli::try_parse_from(["analytics-cli", "growth", "tractors"]).is_err());
    }

    #[test]
    fn test_data_path_overrides_config_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("analytics.toml");
        config_in(&dir).save_to_file(file.to_str().unwrap()).unwrap();

        let cli = Cli::try_parse_from([
            "analytics-cli",
            "--config",
            file.to_str().unwrap(),
            "--data-path",
            "/srv/analytics",
            "status",
        ])
        .unwrap();

        let config = cli.load_config().unwrap();
        assert_eq!(config.storage.base_path, PathBuf::from("/srv/analytics"));
        assert!(!config.seed.enabled);
    }

    #[tokio::test]
    async fn test_track_then_export_and_import() {
        let dir = TempDir::new().unwrap();
        let handler = CliHandler::new(config_in(&dir)).await.unwrap();

        handler
            .handle_command(Commands::Track {
                metric_type: MetricType::Revenue,
                value: 42.0,
                metadata: Some(r#"{"source":"cli"}"#.to_string()),
            })
            .await
            .unwrap();
        assert_eq!(handler.engine().store().count().await, 1);

        let out = dir.path().join("export.json");
        handler
            .handle_command(Commands::Export { format: ExportFormat::Json, days: None, output: Some(out.clone()) })
            .await
            .unwrap();

        let other = TempDir::new().unwrap();
        let target = CliHandler::new(config_in(&other)).await.unwrap();
        target.handle_command(Commands::Import { input: out }).await.unwrap();

        let records = target.engine().store().get_all().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, 42.0);
        assert_eq!(records[0].metadata["source"], "cli");
    }

    #[tokio::test]
    async fn test_track_rejects_non_object_metadata() {
        let dir = TempDir::new().unwrap();
        let handler = CliHandler::new(config_in(&dir)).await.unwrap();

        let result = handler
            .handle_command(Commands::Track {
                metric_type: MetricType::Revenue,
                value: 1.0,
                metadata: Some("[1, 2]".to_string()),
            })
            .await;
        assert!(result.is_err());
        assert_eq!(handler.engine().tracker().pending(), 0);
    }
}
