use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::chat::{with_flood_retry, ChatClient, Keyboard, ProgressSink};
use crate::domain::{ChatId, MessageId, TransferPhase};
use crate::utils::{format_eta, format_speed, human_bytes};

const BAR_WIDTH: usize = 20;
const BAR_FILLED: char = '█';
const BAR_EMPTY: char = '░';

/// Counters for one phase of one transfer.
#[derive(Debug, Clone, Copy)]
pub struct TransferProgress {
    pub bytes_done: u64,
    /// 0 until known, then fixed.
    pub bytes_total: u64,
    pub started_at: Instant,
    pub last_reported_at: Option<Instant>,
}

impl TransferProgress {
    fn new() -> Self {
        Self {
            bytes_done: 0,
            bytes_total: 0,
            started_at: Instant::now(),
            last_reported_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressStats {
    pub percentage: f64,
    pub speed: f64,
    pub eta: Duration,
}

pub fn compute_stats(done: u64, total: u64, elapsed: Duration) -> ProgressStats {
    let secs = elapsed.as_secs_f64();
    let speed = if secs > 0.0 { done as f64 / secs } else { 0.0 };
    let percentage = if total > 0 {
        (done as f64 * 100.0 / total as f64).min(100.0)
    } else {
        0.0
    };
    let eta = if speed > 0.0 && total > done {
        Duration::from_secs_f64((total - done) as f64 / speed)
    } else {
        Duration::ZERO
    };

    ProgressStats {
        percentage,
        speed,
        eta,
    }
}

pub fn render_bar(done: u64, total: u64) -> String {
    let filled = if total > 0 {
        ((BAR_WIDTH as u128 * done as u128 / total as u128) as usize).min(BAR_WIDTH)
    } else {
        0
    };
    let mut bar = String::with_capacity(BAR_WIDTH * 3);
    bar.extend(std::iter::repeat(BAR_FILLED).take(filled));
    bar.extend(std::iter::repeat(BAR_EMPTY).take(BAR_WIDTH - filled));
    bar
}

pub fn render_status(
    phase: TransferPhase,
    file_name: &str,
    done: u64,
    total: u64,
    elapsed: Duration,
) -> String {
    let stats = compute_stats(done, total, elapsed);
    let total_text = if total > 0 {
        human_bytes(total)
    } else {
        "Unknown".to_string()
    };

    format!(
        "**{}**\n📁 **File**: `{}`\n🔢 **Progress**: [{}] {:.2}%\n📊 **Size**: {} / {}\n🚀 **Speed**: {}\n⏳ **ETA**: {}",
        phase.title(),
        file_name,
        render_bar(done, total),
        stats.percentage,
        human_bytes(done),
        total_text,
        format_speed(stats.speed),
        format_eta(stats.eta),
    )
}

/// Edits the transfer's status message, at most once per `interval`.
///
/// The sample that reaches the known total is always written. Edit failures
/// are logged and dropped so a misbehaving chat never fails the transfer.
pub struct ProgressReporter {
    chat: Arc<dyn ChatClient>,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    file_name: String,
    phase: TransferPhase,
    interval: Duration,
    keyboard: Option<Keyboard>,
    state: Mutex<TransferProgress>,
    final_written: Mutex<bool>,
}

impl ProgressReporter {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        file_name: impl Into<String>,
        phase: TransferPhase,
        interval: Duration,
    ) -> Self {
        Self {
            chat,
            chat_id,
            message_id,
            file_name: file_name.into(),
            phase,
            interval,
            keyboard: None,
            state: Mutex::new(TransferProgress::new()),
            final_written: Mutex::new(false),
        }
    }

    /// Buttons kept under every progress edit.
    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> TransferProgress {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Record a sample; returns the text to write if this sample is due.
    fn record(&self, bytes_done: u64, bytes_total: u64) -> Option<String> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        if bytes_done < state.bytes_done {
            debug!(
                bytes_done,
                previous = state.bytes_done,
                "out-of-order progress sample ignored"
            );
            return None;
        }
        state.bytes_done = bytes_done;
        if state.bytes_total == 0 {
            state.bytes_total = bytes_total;
        }

        let now = Instant::now();
        let is_final = state.bytes_total > 0 && state.bytes_done >= state.bytes_total;
        let due = state
            .last_reported_at
            .map_or(true, |last| now.duration_since(last) >= self.interval);

        if is_final {
            let mut final_written = self.final_written.lock().unwrap_or_else(|p| p.into_inner());
            if *final_written {
                return None;
            }
            *final_written = true;
        } else if !due {
            return None;
        }

        state.last_reported_at = Some(now);
        Some(render_status(
            self.phase,
            &self.file_name,
            state.bytes_done,
            state.bytes_total,
            now.duration_since(state.started_at),
        ))
    }
}

#[async_trait]
impl ProgressSink for ProgressReporter {
    async fn update(&self, bytes_done: u64, bytes_total: u64) {
        let Some(message_id) = self.message_id else {
            return;
        };
        let Some(text) = self.record(bytes_done, bytes_total) else {
            return;
        };

        let chat = &self.chat;
        let keyboard = self.keyboard.as_ref();
        let text = text.as_str();
        let chat_id = self.chat_id;
        let result = with_flood_retry("progress edit", move || {
            chat.edit_message(chat_id, message_id, text, keyboard)
        })
        .await;

        if let Err(e) = result {
            warn!(chat = chat_id, message = message_id, error = %e, "progress update dropped");
        }
    }
}
