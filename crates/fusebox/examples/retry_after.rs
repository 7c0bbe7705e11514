// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Simulates an outage of a flaky dependency behind a breaker.
//!
//! The circuit opens once half of the recent calls fail, rejected calls report how long the
//! caller should wait before retrying, and the circuit closes again after the dependency
//! recovers. State changes are logged to the console and counted as metrics.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use fusebox::{Breaker, Circuit, CircuitOptions, ExecError, WindowKind};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_stdout::MetricExporter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let meter_provider = configure_telemetry();

    let circuit = Arc::new(
        Circuit::builder()
            .name("inventory_api")
            // Shrink these values to see the circuit trip and recover faster
            .options(
                CircuitOptions::new()
                    .window_kind(WindowKind::Sliding)
                    .window_size(Duration::from_secs(2))
                    .error_threshold(0.5)
                    .volume_threshold(5)
                    .reset_timeout(Duration::from_millis(500)),
            )
            .on_state_change(|state| println!("circuit is now {state}"))
            .enable_logs()
            .enable_metrics(&meter_provider)
            .build(),
    );

    let breaker = Breaker::new(Arc::clone(&circuit)).timeout(Duration::from_millis(200));

    for attempt in 0..60 {
        tokio::time::sleep(Duration::from_millis(50)).await;

        match breaker.exec(|_token| fetch_stock(attempt)).await {
            Ok(stock) => println!("{attempt}: {stock}"),
            Err(ExecError::Circuit(e)) if e.is_broken() || e.is_rate_limited() => {
                println!("{attempt}: {e}, Retry-After: {}", e.retry_after_secs());
            }
            Err(e) => println!("{attempt}: {e}"),
        }
    }

    println!("final stats: {:?}", circuit.stats());

    // Flush metrics to stdout before exiting
    meter_provider.force_flush()?;

    Ok(())
}

// The dependency fails about half of the time until attempt 30, then recovers
async fn fetch_stock(attempt: u32) -> Result<String, String> {
    if attempt < 30 && fastrand::bool() {
        return Err(format!("inventory lookup {attempt} failed"));
    }

    Ok(format!("{} items in stock", fastrand::u32(0..100)))
}

fn configure_telemetry() -> SdkMeterProvider {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    SdkMeterProvider::builder()
        .with_periodic_exporter(MetricExporter::default())
        .build()
}
