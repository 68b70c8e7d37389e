//! Writes every core event to the log at its own severity.

use core_runtime::events::{CoreEvent, EventBus, EventSeverity, Receiver, RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub fn spawn_event_logger(event_bus: &EventBus) -> JoinHandle<()> {
    let receiver = event_bus.subscribe();
    tokio::spawn(log_events(receiver))
}

async fn log_events(mut receiver: Receiver<CoreEvent>) {
    loop {
        match receiver.recv().await {
            Ok(event) => log_event(&event),
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "Event logger fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn log_event(event: &CoreEvent) {
    let payload = serde_json::to_string(event).unwrap_or_default();
    match event.severity() {
        EventSeverity::Debug => debug!(event = %payload, "{}", event.description()),
        EventSeverity::Info => info!(event = %payload, "{}", event.description()),
        EventSeverity::Warning => warn!(event = %payload, "{}", event.description()),
        EventSeverity::Error => error!(event = %payload, "{}", event.description()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runtime::events::DriveEvent;

    #[tokio::test]
    async fn test_logger_stops_when_bus_is_dropped() {
        let bus = EventBus::new(4);
        let handle = spawn_event_logger(&bus);

        bus.emit(CoreEvent::Drive(DriveEvent::Deleted {
            file_id: "abc".to_string(),
            parent_id: "root".to_string(),
        }))
        .unwrap();
        drop(bus);

        handle.await.unwrap();
    }
}
