//! Update Channel
//!
//! Fan-out of canonical updates to observers, at most one live connection
//! per query. A send is a silent no-op unless exactly one live connection is
//! registered, evaluated per send. Closed connections are marked and never
//! retried; transient push failures retry a few times with a fixed delay
//! before the update is dropped with a log line. Delivery never fails the
//! query that emitted the update.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use switchboard_core::{CanonicalUpdate, UpdateSink};

use crate::config::DeliveryConfig;

struct Connection {
    sink: Arc<dyn UpdateSink>,
    closed: bool,
}

pub struct UpdateChannel {
    connections: Mutex<HashMap<String, Vec<Connection>>>,
    config: DeliveryConfig,
}

impl UpdateChannel {
    pub fn new(config: DeliveryConfig) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn register_observer(&self, query_id: &str, sink: Arc<dyn UpdateSink>) {
        let mut map = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(query_id.to_string())
            .or_default()
            .push(Connection {
                sink,
                closed: false,
            });
    }

    pub fn unregister_observer(&self, query_id: &str) {
        let mut map = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(query_id);
    }

    /// Delivers one update to the query's observer. The single-live-connection
    /// rule is checked here, on every send, not at registration time.
    pub async fn send(&self, update: &CanonicalUpdate) {
        let sink = {
            let map = self.connections.lock().unwrap_or_else(|e| e.into_inner());
            let Some(connections) = map.get(&update.query_id) else {
                debug!(query_id = %update.query_id, "no observer registered, dropping update");
                return;
            };
            let live: Vec<&Connection> =
                connections.iter().filter(|c| !c.closed).collect();
            if live.len() != 1 {
                debug!(
                    query_id = %update.query_id,
                    live = live.len(),
                    "not exactly one live observer, dropping update"
                );
                return;
            }
            live[0].sink.clone()
        };

        for attempt in 0..=self.config.max_retries {
            match sink.push(&update.query_id, update).await {
                Ok(()) => return,
                Err(err) if err.is_closed() => {
                    info!(query_id = %update.query_id, "observer connection closed");
                    self.mark_closed(&update.query_id, &sink);
                    return;
                }
                Err(err) => {
                    if attempt == self.config.max_retries {
                        warn!(
                            query_id = %update.query_id,
                            error = %err,
                            attempts = attempt + 1,
                            "delivery failed, giving up"
                        );
                        return;
                    }
                    debug!(
                        query_id = %update.query_id,
                        attempt = attempt + 1,
                        "transient delivery failure, retrying"
                    );
                    sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
            }
        }
    }

    fn mark_closed(&self, query_id: &str, sink: &Arc<dyn UpdateSink>) {
        let mut map = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(connections) = map.get_mut(query_id) {
            for connection in connections.iter_mut() {
                if Arc::ptr_eq(&connection.sink, sink) {
                    connection.closed = true;
                }
            }
        }
    }
}
