use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiError, HttpClient, HttpConfig};
use crate::application::{
    CallbackQuery, PendingRegistry, RelaySettings, TransferCoordinator, TransportRouter, Uploader,
};
use crate::chat::{FsThumbnailStore, Transport};
use crate::config::Config;
use crate::domain::{ChatId, Identity, MessageId, UserId};
use crate::ui::{ConsoleChat, LocalOutbox};
use crate::video::YtDlpExtractor;

/// The console is a single conversation with a single user.
const CONSOLE_CHAT: ChatId = 1;
const CONSOLE_USER: UserId = 1;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] ApiError),

    #[error("failed to prepare directories: {0}")]
    Io(#[from] std::io::Error),
}

/// One line of console input.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    /// `/press <message> <data>`
    Press { message_id: MessageId, data: String },
}

impl Message {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        match line.strip_prefix("/press ") {
            Some(rest) => {
                let (id, data) = rest.trim().split_once(' ')?;
                Some(Message::Press {
                    message_id: id.parse().ok()?,
                    data: data.trim().to_string(),
                })
            }
            None => Some(Message::Text(line.to_string())),
        }
    }
}

/// Hand a message to the coordinator on its own task.
pub fn update(coordinator: &TransferCoordinator, tasks: &mut JoinSet<()>, message: Message) {
    let coordinator = coordinator.clone();
    match message {
        Message::Text(text) => {
            tasks.spawn(async move {
                coordinator.on_text(CONSOLE_CHAT, CONSOLE_USER, &text).await;
            });
        }
        Message::Press { message_id, data } => {
            tasks.spawn(async move {
                coordinator
                    .on_callback(CallbackQuery {
                        id: uuid::Uuid::new_v4().to_string(),
                        chat: CONSOLE_CHAT,
                        user: CONSOLE_USER,
                        message_id,
                        data,
                    })
                    .await;
            });
        }
    }
}

pub fn build(config: &Config) -> Result<TransferCoordinator, StartupError> {
    let http = HttpClient::new(&HttpConfig {
        timeout: config.http_timeout,
        ..HttpConfig::default()
    })?;

    let standard: Arc<dyn Transport> = Arc::new(LocalOutbox::new(
        Identity::Standard,
        false,
        &config.outbox_dir,
    ));
    let elevated = config.elevated_enabled.then(|| {
        Arc::new(LocalOutbox::new(
            Identity::Elevated,
            config.elevated_premium,
            &config.outbox_dir,
        )) as Arc<dyn Transport>
    });

    let router = TransportRouter::new(config.standard_upload_limit, standard, elevated);
    let uploader = Uploader::new(Arc::new(FsThumbnailStore::new(&config.thumb_location)));
    let extractor = Arc::new(YtDlpExtractor::new(
        config.ytdlp_bin.clone(),
        config.http_proxy.clone(),
        config.http_timeout,
    ));

    Ok(TransferCoordinator::new(
        Arc::new(ConsoleChat::new()),
        Arc::new(PendingRegistry::new(config.pending_ttl)),
        http,
        router,
        uploader,
        extractor,
        RelaySettings {
            max_file_size: config.max_file_size,
            chunk_size: config.chunk_size,
            scratch_dir: config.download_location.clone(),
            progress_interval: config.progress_interval,
        },
    ))
}

/// Evict expired tokens and prompts once per TTL until shut down.
fn spawn_sweeper(registry: Arc<PendingRegistry>, shutdown: CancellationToken) {
    let Some(ttl) = registry.ttl() else {
        return;
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ttl);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    registry.sweep_expired();
                }
            }
        }
    });
}

pub async fn run(config: Config) -> Result<(), StartupError> {
    tokio::fs::create_dir_all(&config.download_location).await?;
    tokio::fs::create_dir_all(&config.thumb_location).await?;

    let coordinator = build(&config)?;
    let shutdown = CancellationToken::new();
    spawn_sweeper(Arc::clone(coordinator.registry()), shutdown.clone());

    info!(
        max_file_size = config.max_file_size,
        standard_limit = config.standard_upload_limit,
        elevated = config.elevated_enabled,
        "relay ready, send a link or /help"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, aborting running transfers");
                tasks.abort_all();
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => match Message::parse(&line) {
                    Some(message) => update(&coordinator, &mut tasks, message),
                    None => debug!("blank or malformed input ignored"),
                },
                Ok(None) => {
                    info!("input closed, waiting for running transfers");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read input");
                    break;
                }
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "event task ended abnormally");
                }
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            if !e.is_cancelled() {
                warn!(error = %e, "event task ended abnormally");
            }
        }
    }
    shutdown.cancel();
    Ok(())
}
