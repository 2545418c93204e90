use std::sync::Arc;

use tokio::sync::broadcast;

use crate::clock::{Clock, SystemClock};
use crate::engine::verification::{CodeSource, RandomCodeSource};
use crate::evidence::{EvidenceStore, LocalEvidenceStore};
use crate::models::notification::Notification;
use crate::notify::Notifier;
use crate::observability::metrics::Metrics;
use crate::store::Store;

pub struct AppState {
    pub store: Store,
    pub clock: Arc<dyn Clock>,
    pub codes: Arc<dyn CodeSource>,
    pub sms: Option<Arc<dyn Notifier>>,
    pub evidence: Arc<dyn EvidenceStore>,
    pub notification_tx: broadcast::Sender<Notification>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(event_buffer_size: usize) -> Self {
        let (notification_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            store: Store::new(),
            clock: Arc::new(SystemClock),
            codes: Arc::new(RandomCodeSource),
            sms: None,
            evidence: Arc::new(LocalEvidenceStore::new("uploads")),
            notification_tx,
            metrics: Metrics::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_code_source(mut self, codes: Arc<dyn CodeSource>) -> Self {
        self.codes = codes;
        self
    }

    pub fn with_sms_transport(mut self, sms: Arc<dyn Notifier>) -> Self {
        self.sms = Some(sms);
        self
    }

    pub fn with_evidence_store(mut self, evidence: Arc<dyn EvidenceStore>) -> Self {
        self.evidence = evidence;
        self
    }
}
