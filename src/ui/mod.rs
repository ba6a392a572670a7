//! Console front end: chat messages are printed, uploads land in a folder.

pub mod outbox;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::chat::{ChatClient, ChatError, Keyboard};
use crate::domain::{ChatId, MessageId};

pub use outbox::LocalOutbox;

/// Prints every message and edit to stdout.
///
/// Buttons are shown with the `/press` line that triggers them.
#[derive(Default)]
pub struct ConsoleChat {
    next_id: AtomicI32,
    messages: Mutex<HashMap<MessageId, ChatId>>,
}

impl ConsoleChat {
    pub fn new() -> Self {
        Self::default()
    }

    fn render(id: MessageId, edited: bool, text: &str, keyboard: Option<&Keyboard>) -> String {
        let marker = if edited { " (edited)" } else { "" };
        let mut out = format!("── #{id}{marker}\n{text}\n");
        for row in keyboard.into_iter().flatten() {
            let line: Vec<String> = row
                .iter()
                .map(|b| format!("[{}] /press {id} {}", b.label, b.data))
                .collect();
            out.push_str("  ");
            out.push_str(&line.join("   "));
            out.push('\n');
        }
        out
    }
}

#[async_trait]
impl ChatClient for ConsoleChat {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, ChatError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.messages
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(id, chat);
        println!("{}", Self::render(id, false, text, keyboard));
        Ok(id)
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChatError> {
        let known = self
            .messages
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&message)
            .is_some_and(|owner| *owner == chat);
        if !known {
            return Err(ChatError::MessageNotFound);
        }
        println!("{}", Self::render(message, true, text, keyboard));
        Ok(())
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), ChatError> {
        let mut messages = self.messages.lock().unwrap_or_else(|p| p.into_inner());
        if messages.get(&message) != Some(&chat) {
            return Err(ChatError::MessageNotFound);
        }
        messages.remove(&message);
        println!("── #{message} deleted\n");
        Ok(())
    }

    async fn answer_callback(
        &self,
        _callback_id: &str,
        text: &str,
        alert: bool,
    ) -> Result<(), ChatError> {
        if alert {
            println!("(!) {text}\n");
        } else {
            println!("({text})\n");
        }
        Ok(())
    }
}
