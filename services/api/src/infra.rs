use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use leadflow::config::EngineConfig;
use leadflow::workflows::nurture::{
    ContactChannel, ContactError, DispatchReceipt, EmailDispatch, LeadAutomationService,
    MemoryRecordStore, Notification, NotificationSink, NotifyError, ScoringEngine,
    TaskQueueProcessor,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Delivery stand-in for local runs: logs the dispatch instead of talking to
/// an email provider.
#[derive(Default)]
pub(crate) struct LoggingContactChannel;

impl ContactChannel for LoggingContactChannel {
    fn send_email(&self, dispatch: EmailDispatch) -> Result<DispatchReceipt, ContactError> {
        info!(
            to = %dispatch.to,
            sequence = %dispatch.sequence_id,
            step = dispatch.step_number,
            subject = %dispatch.subject,
            "email dispatched"
        );
        Ok(DispatchReceipt {
            message_id: format!("local-{}-{}", dispatch.sequence_id, dispatch.step_number),
        })
    }
}

/// Keeps delivered notifications in memory and mirrors them to the log.
#[derive(Default)]
pub(crate) struct InMemoryNotificationSink {
    events: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationSink {
    #[allow(dead_code)]
    pub(crate) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            owner = %notification.owner,
            title = %notification.title,
            "notification raised"
        );
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(crate) type ApiProcessor =
    TaskQueueProcessor<MemoryRecordStore, LoggingContactChannel, InMemoryNotificationSink>;

pub(crate) fn build_processor(engine: EngineConfig) -> (Arc<ApiProcessor>, Arc<MemoryRecordStore>) {
    let store = Arc::new(MemoryRecordStore::default());
    let channel = Arc::new(LoggingContactChannel);
    let notifications = Arc::new(InMemoryNotificationSink::default());
    let service = Arc::new(LeadAutomationService::new(
        store.clone(),
        channel,
        notifications,
        ScoringEngine::default(),
    ));
    let processor = Arc::new(TaskQueueProcessor::new(store.clone(), service, engine));
    (processor, store)
}
