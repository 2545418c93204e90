use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub status_transitions_total: IntCounterVec,
    pub assignments_total: IntCounterVec,
    pub ledger_entries_total: IntCounterVec,
    pub verification_attempts_total: IntCounterVec,
    pub notifications_total: IntCounterVec,
    pub job_runs_total: IntCounterVec,
}

fn counter(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    IntCounterVec::new(Opts::new(name, help), labels)
        .unwrap_or_else(|err| panic!("invalid metric {name}: {err}"))
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let status_transitions_total = counter(
            "status_transitions_total",
            "Shipment status transitions by target status",
            &["status"],
        );
        let assignments_total = counter(
            "assignments_total",
            "Courier assignments by mode",
            &["mode"],
        );
        let ledger_entries_total = counter(
            "ledger_entries_total",
            "Ledger entries written by ledger and kind",
            &["ledger", "kind"],
        );
        let verification_attempts_total = counter(
            "verification_attempts_total",
            "Delivery verification attempts by outcome",
            &["outcome"],
        );
        let notifications_total = counter(
            "notifications_total",
            "Dispatched notifications by channel and outcome",
            &["channel", "outcome"],
        );
        let job_runs_total = counter(
            "job_runs_total",
            "Scheduled job runs by job and outcome",
            &["job", "outcome"],
        );

        for collector in [
            &status_transitions_total,
            &assignments_total,
            &ledger_entries_total,
            &verification_attempts_total,
            &notifications_total,
            &job_runs_total,
        ] {
            registry
                .register(Box::new(collector.clone()))
                .expect("register metric");
        }

        Self {
            registry,
            status_transitions_total,
            assignments_total,
            ledger_entries_total,
            verification_attempts_total,
            notifications_total,
            job_runs_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
