//! Long-poll loop feeding Telegram updates into the router.

use crate::telegram::{Allowlist, TelegramApi, Update, to_inbound};
use chatdeck_bot::{EventRouter, InboundEvent};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// First delay after a failed poll.
const MIN_BACKOFF: Duration = Duration::from_secs(1);

/// Longest delay between failed polls.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Receives updates and dispatches each admitted event on its own task.
pub struct Poller {
    api: TelegramApi,
    router: EventRouter,
    allowlist: Allowlist,
    poll_timeout: Duration,
}

impl Poller {
    /// Creates a poller.
    pub fn new(
        api: TelegramApi,
        router: EventRouter,
        allowlist: Allowlist,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            api,
            router,
            allowlist,
            poll_timeout,
        }
    }

    /// Polls until `cancel` fires, then waits for in-flight events.
    pub async fn run(self, cancel: CancellationToken) {
        let tracker = TaskTracker::new();
        let mut offset: Option<i64> = None;
        let mut backoff = MIN_BACKOFF;

        info!(timeout_secs = self.poll_timeout.as_secs(), "polling for updates");

        loop {
            let polled = tokio::select! {
                () = cancel.cancelled() => break,
                polled = self.api.get_updates(offset, self.poll_timeout) => polled,
            };

            match polled {
                Ok(updates) => {
                    backoff = MIN_BACKOFF;
                    for update in updates {
                        offset = Some(next_offset(offset, update.update_id));
                        let Some(event) = admit(update, &self.allowlist) else {
                            continue;
                        };
                        let router = self.router.clone();
                        tracker.spawn(async move {
                            if let Err(e) = router.dispatch(event).await {
                                error!(error = %e, "failed to deliver reply");
                            }
                        });
                    }
                }
                Err(e) => {
                    warn!(error = %e, delay_ms = backoff.as_millis() as u64, "getUpdates failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        tracker.close();
        info!(in_flight = tracker.len(), "poller stopping");
        tracker.wait().await;
    }
}

/// Offset that acknowledges `update_id`.
fn next_offset(current: Option<i64>, update_id: i64) -> i64 {
    current.map_or(update_id + 1, |offset| offset.max(update_id + 1))
}

/// Logs an update and returns its event if the sender is allowed.
fn admit(update: Update, allowlist: &Allowlist) -> Option<InboundEvent> {
    let update_id = update.update_id;
    let Some(event) = to_inbound(update) else {
        debug!(update_id, "ignoring unsupported update");
        return None;
    };

    let source = *event.source();
    match &event {
        InboundEvent::Command { command, args, .. } => info!(
            update_id,
            chat_id = source.chat_id,
            user_id = source.user_id,
            thread_id = ?source.thread_id,
            command = ?command,
            args = %args,
            "inbound command"
        ),
        InboundEvent::Text { text, .. } => info!(
            update_id,
            chat_id = source.chat_id,
            user_id = source.user_id,
            thread_id = ?source.thread_id,
            text = %text,
            "inbound message"
        ),
        InboundEvent::Callback { data, .. } => info!(
            update_id,
            chat_id = source.chat_id,
            user_id = source.user_id,
            thread_id = ?source.thread_id,
            data = %data,
            "inbound callback"
        ),
    }

    if allowlist.permits(&source) {
        Some(event)
    } else {
        warn!(
            chat_id = source.chat_id,
            user_id = source.user_id,
            "dropping event from unauthorized sender"
        );
        None
    }
}
