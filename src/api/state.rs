use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::dictionary::DictionaryStore;
use crate::email::{DisabledMailer, Mailer, SmtpMailer};
use crate::feedback::FeedbackStore;
use crate::rewrite::{DemoRewriter, OpenAiRewriter, Rewriter};
use crate::settings::EmailSettingsStore;
use crate::store::{FallbackStore, KvStore};
use crate::transcription::{DemoTranscriber, Transcriber, WhisperTranscriber};
use crate::upload::ChunkAssembler;
use crate::users::UserManager;

/// Everything a handler can reach. Cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn KvStore>,
    pub clock: Arc<dyn Clock>,
    pub users: Arc<UserManager>,
    pub dictionaries: Arc<DictionaryStore>,
    pub chunks: Arc<ChunkAssembler>,
    pub transcriber: Arc<dyn Transcriber>,
    pub rewriter: Arc<dyn Rewriter>,
    pub mailer: Arc<dyn Mailer>,
    pub email_settings: Arc<EmailSettingsStore>,
    pub feedback: Arc<FeedbackStore>,
}

impl AppState {
    /// Assemble state around explicit backends. File-backed stores live
    /// under `config.data_dir`.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        transcriber: Arc<dyn Transcriber>,
        rewriter: Arc<dyn Rewriter>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            users: Arc::new(UserManager::new(store.clone(), clock.clone())),
            dictionaries: Arc::new(DictionaryStore::new(store.clone(), clock.clone())),
            chunks: Arc::new(ChunkAssembler::new()),
            email_settings: Arc::new(EmailSettingsStore::new(&config.data_dir)),
            feedback: Arc::new(FeedbackStore::new(&config.data_dir)),
            config: Arc::new(config),
            store,
            clock,
            transcriber,
            rewriter,
            mailer,
        }
    }

    /// Production wiring: Redis (or memory), OpenAI (or demo), SMTP (or disabled).
    pub async fn from_config(config: AppConfig) -> Self {
        let store: Arc<dyn KvStore> =
            Arc::new(FallbackStore::connect(config.redis_url.as_deref()).await);

        let (transcriber, rewriter): (Arc<dyn Transcriber>, Arc<dyn Rewriter>) =
            match config.openai_api_key.as_deref() {
                Some(key) => (
                    Arc::new(WhisperTranscriber::new(key)),
                    Arc::new(OpenAiRewriter::new(key)),
                ),
                None => {
                    log::warn!("OPENAI_API_KEY not set, transcription and rewrite run in demo mode");
                    (Arc::new(DemoTranscriber), Arc::new(DemoRewriter))
                }
            };

        let mailer: Arc<dyn Mailer> = match (&config.smtp_user, &config.smtp_pass) {
            (Some(user), Some(pass)) => match SmtpMailer::new(&config.smtp_host, user, pass) {
                Ok(mailer) => Arc::new(mailer),
                Err(e) => {
                    log::error!("SMTP setup for {} failed: {}", config.smtp_host, e);
                    Arc::new(DisabledMailer)
                }
            },
            _ => {
                log::warn!("SMTP_USER/SMTP_PASS not set, email reports are disabled");
                Arc::new(DisabledMailer)
            }
        };

        Self::new(
            config,
            store,
            Arc::new(SystemClock),
            transcriber,
            rewriter,
            mailer,
        )
    }
}
