//! Per-check run counters
//!
//! Every run that reaches the executor increments `processed`. Runs that get
//! as far as resolving their algorithmer then increment exactly one of
//! `succeeded` / `failed`.

use prometheus::{IntCounterVec, Opts, Registry, TextEncoder};

const NAMESPACE: &str = "algowatch";

#[derive(Clone)]
pub struct CheckMetrics {
    registry: Registry,
    processed: IntCounterVec,
    succeeded: IntCounterVec,
    failed: IntCounterVec,
}

impl CheckMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let processed = counter("checks_processed_total", "Check runs started")?;
        let succeeded = counter("checks_succeeded_total", "Check runs that passed")?;
        let failed = counter("checks_failed_total", "Check runs that failed or errored")?;

        registry.register(Box::new(processed.clone()))?;
        registry.register(Box::new(succeeded.clone()))?;
        registry.register(Box::new(failed.clone()))?;

        Ok(Self {
            registry,
            processed,
            succeeded,
            failed,
        })
    }

    pub fn processed(&self, check: &str) {
        self.processed.with_label_values(&[check]).inc();
    }

    pub fn succeeded(&self, check: &str) {
        self.succeeded.with_label_values(&[check]).inc();
    }

    pub fn failed(&self, check: &str) {
        self.failed.with_label_values(&[check]).inc();
    }

    /// Current `(processed, succeeded, failed)` for one check
    ///
    /// Reads the gathered samples, so asking about a check that never ran
    /// does not add a zero series to the exposition.
    pub fn counts(&self, check: &str) -> (u64, u64, u64) {
        let families = self.registry.gather();
        let value = |name: &str| {
            let full_name = format!("{NAMESPACE}_{name}");
            families
                .iter()
                .filter(|family| family.get_name() == full_name)
                .flat_map(|family| family.get_metric())
                .find(|metric| {
                    metric
                        .get_label()
                        .iter()
                        .any(|label| label.get_name() == "check" && label.get_value() == check)
                })
                .map_or(0, |metric| metric.get_counter().get_value() as u64)
        };

        (
            value("checks_processed_total"),
            value("checks_succeeded_total"),
            value("checks_failed_total"),
        )
    }

    /// Prometheus text exposition of every counter
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = String::new();
        TextEncoder::new().encode_utf8(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

fn counter(name: &str, help: &str) -> prometheus::Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help).namespace(NAMESPACE), &["check"])
}
