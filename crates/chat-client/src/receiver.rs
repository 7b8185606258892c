//! Update receiver with polling.

use crate::client::ChatClient;
use crate::types::ChatEvent;
use std::time::Duration;
use tokio::time::sleep;
use tokio_stream::Stream;
use tracing::{debug, error};

/// Polls the bot gateway for updates and yields parsed events.
pub struct UpdateReceiver {
    client: ChatClient,
    poll_interval: Duration,
}

impl UpdateReceiver {
    /// Create a new update receiver.
    pub fn new(client: ChatClient, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
        }
    }

    /// Start receiving events as an async stream.
    pub fn stream(self) -> impl Stream<Item = ChatEvent> {
        async_stream::stream! {
            let mut last_update: u64 = 0;
            loop {
                match self.client.updates_after(last_update).await {
                    Ok(updates) => {
                        for update in updates {
                            last_update = last_update.max(update.update_id);
                            if let Some(event) = ChatEvent::from_update(&update) {
                                debug!("Received event from {}", event.sender());
                                yield event;
                            }
                        }
                    }
                    Err(e) => {
                        error!("Update poll error: {}", e);
                        // Back off on error
                        sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                }

                sleep(self.poll_interval).await;
            }
        }
    }
}
