//! Directory event watcher with polling.

use crate::client::HttpDirectory;
use crate::types::DirectoryEvent;
use std::time::Duration;
use tokio::time::sleep;
use tokio_stream::Stream;
use tracing::{debug, error};

/// Polls the admin daemon's event feed and yields account-change events.
pub struct EventWatcher {
    directory: HttpDirectory,
    poll_interval: Duration,
}

impl EventWatcher {
    pub fn new(directory: HttpDirectory, poll_interval: Duration) -> Self {
        Self {
            directory,
            poll_interval,
        }
    }

    /// Start watching as an async stream of events.
    pub fn stream(self) -> impl Stream<Item = DirectoryEvent> {
        async_stream::stream! {
            let mut last_seq: u64 = 0;
            loop {
                match self.directory.events_after(last_seq).await {
                    Ok(records) => {
                        for record in records {
                            last_seq = last_seq.max(record.seq);
                            let event = record.into_event();
                            debug!("Directory event: {:?}", event);
                            yield event;
                        }
                    }
                    Err(e) => {
                        error!("Directory event poll error: {}", e);
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
