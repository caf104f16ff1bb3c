//! # Analytics Demo
//!
//! Tracks a morning of marketplace activity and prints the resulting dashboard.

use farm_analytics::{init_analytics, AggregationType, AnalyticsConfig, DateRange, MetricType, Period};
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("🚜 Starting farm analytics demo");

    let mut config = AnalyticsConfig::default();
    config.storage.base_path = std::env::temp_dir().join("farm_analytics_demo");
    config.ingestion.batch_size = 5;
    config.ingestion.flush_interval_ms = 200;

    let analytics = init_analytics(config).await?;
    let tracker = analytics.tracker();

    for i in 0..8 {
        tracker.track_page_view("/materials", Some(&format!("user-{i}")))?;
    }
    tracker.track_user_registration("user-3", "farmer")?;
    tracker.track_user_registration("user-7", "supplier")?;
    tracker.track_order_created("order-100", 320.0)?;
    tracker.track_material_purchase("fertilizer-20kg", 4.0, 320.0)?;
    tracker.track_payment_submission("pay-100", 320.0)?;
    tracker.track_payment_approval("pay-100", 320.0)?;
    tracker.track_upload_submission("upload-9")?;

    // Let the size and timer triggers do their work
    sleep(Duration::from_millis(500)).await;
    println!("Tracker stats: {:?}", tracker.stats());

    analytics.shutdown().await?;

    let queries = analytics.query_engine();
    let range = DateRange::last_days(30, chrono::Utc::now())?;
    let summary = queries.get_dashboard_summary(&range).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    let revenue = queries
        .get_aggregated_metrics(MetricType::Revenue, AggregationType::Weekly, Some(&range))
        .await?;
    for point in revenue {
        println!("revenue week of {}: {:.2}", point.bucket, point.value);
    }

    let growth = queries.get_growth_metrics(MetricType::Registrations, Period::Week).await?;
    println!("registrations growth: {:.2}%", growth.growth_rate);

    println!("✅ Demo completed successfully!");
    Ok(())
}
