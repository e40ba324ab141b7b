use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "snake_case")]
pub enum InvestorEvent {
    MessageReceived { message: String },
    SearchStarted { sectors: Vec<String>, location: String },
    SearchCompleted { investors: usize, search_results: usize, cached: bool },
    SearchFailed { error: String },
    EnrichmentCompleted { attempted: usize, enriched: usize },
    ResponseGenerated { processing_time_ms: u64, investors_in_memory: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationEvent {
    pub conversation_id: Option<String>,
    pub event: InvestorEvent,
}

pub struct EventBus {
    tx: broadcast::Sender<ConversationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, conversation_id: Option<&str>, event: InvestorEvent) {
        let conversation_event = ConversationEvent {
            conversation_id: conversation_id.map(str::to_string),
            event,
        };
        if self.tx.receiver_count() == 0 {
            debug!("No event subscribers, dropping {:?}", conversation_event.event);
            return;
        }
        if let Err(e) = self.tx.send(conversation_event) {
            warn!("Failed to publish event: {}", e);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
