//! Background title generation.
//!
//! After the first exchange of a conversation a title job is scheduled on the
//! [`TitleWorker`]. Jobs run detached from the event that scheduled them,
//! bounded in number and duration, and cancelled on shutdown. A failed job
//! leaves the placeholder title in place; failures are only logged.

use crate::error::TitleError;
use crate::store::ConversationStore;
use chatdeck_ai::{ChatProvider, prompt};
use chatdeck_core::ConversationId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Limits applied to title jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleSettings {
    /// Time budget of a single job.
    pub timeout: Duration,
    /// Jobs allowed to run at once.
    pub max_concurrent: usize,
}

impl Default for TitleSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_concurrent: 4,
        }
    }
}

/// Input of one title job.
#[derive(Clone)]
pub struct TitleJob {
    /// Conversation to retitle.
    pub conversation_id: ConversationId,
    /// Provider of the conversation.
    pub provider: Arc<dyn ChatProvider>,
    /// Model used for the title completion.
    pub summary_model: String,
    /// First user message.
    pub user_text: String,
    /// First assistant response.
    pub response_text: String,
}

/// Runs title jobs in the background.
#[derive(Clone)]
pub struct TitleWorker {
    store: ConversationStore,
    settings: TitleSettings,
    tracker: TaskTracker,
    cancel: CancellationToken,
    permits: Arc<Semaphore>,
}

impl TitleWorker {
    /// Creates a worker whose jobs stop when `cancel` fires.
    #[must_use]
    pub fn new(store: ConversationStore, settings: TitleSettings, cancel: CancellationToken) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
        Self {
            store,
            settings,
            tracker: TaskTracker::new(),
            cancel,
            permits,
        }
    }

    /// Schedules a job and returns immediately.
    pub fn schedule(&self, job: TitleJob) {
        let store = self.store.clone();
        let settings = self.settings;
        let cancel = self.cancel.clone();
        let permits = Arc::clone(&self.permits);
        let conversation_id = job.conversation_id;

        self.tracker.spawn(async move {
            let run = async {
                match permits.acquire_owned().await {
                    Ok(_permit) => generate(&store, &job, settings.timeout).await,
                    Err(_) => Err(TitleError::WorkerClosed),
                }
            };

            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(conversation_id = %conversation_id, "title job cancelled");
                }
                result = run => match result {
                    Ok(title) => info!(conversation_id = %conversation_id, title = %title, "conversation titled"),
                    Err(e) => warn!(conversation_id = %conversation_id, error = %e, "title generation failed"),
                },
            }
        });
    }

    /// Waits for every scheduled job to finish. New jobs may be scheduled
    /// afterwards.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Cancels running jobs and waits for them to stop.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("title worker stopped");
    }

    /// Jobs currently scheduled or running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }
}

async fn generate(
    store: &ConversationStore,
    job: &TitleJob,
    timeout: Duration,
) -> Result<String, TitleError> {
    let work = async {
        let request = prompt::title_request(&job.summary_model, &job.user_text, &job.response_text);
        let response = job
            .provider
            .create_chat_completion(&request)
            .await
            .map_err(TitleError::Completion)?;
        let title = prompt::clean_title(response.content()).ok_or(TitleError::EmptyTitle)?;
        store
            .update_title(job.conversation_id, &title)
            .await
            .map_err(TitleError::Store)?;
        Ok::<_, TitleError>(title)
    };

    tokio::time::timeout(timeout, work)
        .await
        .map_err(|_| TitleError::TimedOut {
            secs: timeout.as_secs(),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::PLACEHOLDER_TITLE;
    use crate::memory::MemoryConversationRepository;
    use crate::store::ConversationSettings;
    use async_trait::async_trait;
    use chatdeck_ai::{
        ChatCompletionRequest, ChatCompletionResponse, ChatMessage, LlmError, ProviderKind,
    };
    use std::sync::Mutex;

    struct TitleProvider {
        reply: Result<String, LlmError>,
        delay: Duration,
        requests: Mutex<Vec<ChatCompletionRequest>>,
    }

    impl TitleProvider {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: Duration::ZERO,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for TitleProvider {
        async fn create_chat_completion(
            &self,
            request: &ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse, LlmError> {
            self.requests.lock().expect("lock").push(request.clone());
            tokio::time::sleep(self.delay).await;
            self.reply.clone().map(|content| ChatCompletionResponse {
                message: ChatMessage::assistant(content),
            })
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }
    }

    async fn setup(settings: TitleSettings) -> (ConversationStore, TitleWorker, ConversationId) {
        let repo = Arc::new(MemoryConversationRepository::new());
        let store = ConversationStore::new(
            repo,
            ConversationSettings::new("owner", "User", "chatdeck", "gpt-4o"),
        );
        let convo = store
            .create_conversation(ProviderKind::OpenAi)
            .await
            .expect("create");
        let worker = TitleWorker::new(store.clone(), settings, CancellationToken::new());
        (store, worker, convo.id)
    }

    fn job(id: ConversationId, provider: Arc<dyn ChatProvider>) -> TitleJob {
        TitleJob {
            conversation_id: id,
            provider,
            summary_model: "gpt-4o-mini".to_string(),
            user_text: "Hello".to_string(),
            response_text: "Hi! How can I help?".to_string(),
        }
    }

    #[tokio::test]
    async fn job_updates_title_with_summary_model() {
        let (store, worker, id) = setup(TitleSettings::default()).await;
        let provider = Arc::new(TitleProvider::replying("\"Friendly Greeting\""));

        worker.schedule(job(id, provider.clone()));
        worker.drain().await;

        let convo = store.get_conversation(id).await.expect("get");
        assert_eq!(convo.title, "Friendly Greeting");
        let requests = provider.requests.lock().expect("lock");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn failure_keeps_placeholder() {
        let (store, worker, id) = setup(TitleSettings::default()).await;
        let provider = Arc::new(TitleProvider {
            reply: Err(LlmError::Timeout),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        });

        worker.schedule(job(id, provider));
        worker.drain().await;

        let convo = store.get_conversation(id).await.expect("get");
        assert_eq!(convo.title, PLACEHOLDER_TITLE);
    }

    #[tokio::test]
    async fn slow_job_times_out() {
        let settings = TitleSettings {
            timeout: Duration::from_millis(10),
            max_concurrent: 1,
        };
        let (store, worker, id) = setup(settings).await;
        let provider = Arc::new(TitleProvider {
            reply: Ok("Too Late".to_string()),
            delay: Duration::from_secs(5),
            requests: Mutex::new(Vec::new()),
        });

        worker.schedule(job(id, provider));
        worker.drain().await;

        let convo = store.get_conversation(id).await.expect("get");
        assert_eq!(convo.title, PLACEHOLDER_TITLE);
    }

    #[tokio::test]
    async fn shutdown_cancels_running_jobs() {
        let (store, worker, id) = setup(TitleSettings::default()).await;
        let provider = Arc::new(TitleProvider {
            reply: Ok("Never Stored".to_string()),
            delay: Duration::from_secs(5),
            requests: Mutex::new(Vec::new()),
        });

        worker.schedule(job(id, provider));
        tokio::time::timeout(Duration::from_secs(1), worker.shutdown())
            .await
            .expect("shutdown should not wait for the provider");

        assert_eq!(worker.pending(), 0);
        let convo = store.get_conversation(id).await.expect("get");
        assert_eq!(convo.title, PLACEHOLDER_TITLE);
    }
}
