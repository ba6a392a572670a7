//! In-memory state shared between chat events.
//!
//! Holds the single-use tokens behind selection buttons, the per-chat rename
//! prompts, and the cancellation handles of transfers that are running.
//! Every operation takes the lock once, so create/consume/discard are atomic
//! per key.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::{ChatId, RelayError, RenamePrompt, SourceKind, Token, TransferRequest};

struct Entry<T> {
    value: T,
    created_at: Instant,
}

impl<T> Entry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.created_at.elapsed() >= ttl)
    }
}

#[derive(Default)]
struct Inner {
    pending: HashMap<Token, Entry<TransferRequest>>,
    prompts: HashMap<ChatId, Entry<RenamePrompt>>,
    active: HashMap<Token, CancellationToken>,
}

impl Inner {
    fn live_prompt(&mut self, chat: ChatId, ttl: Option<Duration>) -> Option<&RenamePrompt> {
        if self.prompts.get(&chat).is_some_and(|e| e.is_expired(ttl)) {
            self.prompts.remove(&chat);
        }
        self.prompts.get(&chat).map(|e| &e.value)
    }
}

pub struct PendingRegistry {
    inner: Mutex<Inner>,
    ttl: Option<Duration>,
}

impl PendingRegistry {
    /// `ttl` of `None` keeps entries until they are used.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create(
        &self,
        url: String,
        suggested_filename: Option<String>,
        known_size: Option<u64>,
    ) -> Token {
        let token = Token::new();
        let request = TransferRequest {
            token,
            url,
            suggested_filename,
            known_size,
        };
        self.lock().pending.insert(token, Entry::new(request));
        debug!(%token, "pending transfer registered");
        token
    }

    /// Remove and return the request behind `token`. Succeeds at most once.
    pub fn consume(&self, token: Token) -> Result<TransferRequest, RelayError> {
        let entry = self
            .lock()
            .pending
            .remove(&token)
            .ok_or(RelayError::TokenNotFound)?;

        if entry.is_expired(self.ttl) {
            return Err(RelayError::TokenExpired);
        }
        Ok(entry.value)
    }

    pub fn discard(&self, token: Token) -> bool {
        self.lock().pending.remove(&token).is_some()
    }

    #[cfg(test)]
    pub fn contains(&self, token: Token) -> bool {
        self.lock().pending.contains_key(&token)
    }

    /// Turn a pending token into the chat's rename prompt.
    ///
    /// A chat holds one prompt at a time; while one is open the token is
    /// left untouched and `PromptActive` is returned.
    pub fn begin_rename(&self, token: Token, chat: ChatId) -> Result<RenamePrompt, RelayError> {
        let mut inner = self.lock();
        if inner.live_prompt(chat, self.ttl).is_some() {
            return Err(RelayError::PromptActive);
        }

        let entry = inner
            .pending
            .remove(&token)
            .ok_or(RelayError::TokenNotFound)?;
        if entry.is_expired(self.ttl) {
            return Err(RelayError::TokenExpired);
        }

        let prompt = RenamePrompt {
            conversation_id: chat,
            url: entry.value.url,
            source_kind: SourceKind::Direct,
            original_name: entry.value.suggested_filename,
            known_size: entry.value.known_size,
        };
        inner.prompts.insert(chat, Entry::new(prompt.clone()));
        Ok(prompt)
    }

    pub fn open_prompt(&self, prompt: RenamePrompt) -> Result<(), RelayError> {
        let mut inner = self.lock();
        let chat = prompt.conversation_id;
        if inner.live_prompt(chat, self.ttl).is_some() {
            return Err(RelayError::PromptActive);
        }
        inner.prompts.insert(chat, Entry::new(prompt));
        Ok(())
    }

    pub fn has_prompt(&self, chat: ChatId) -> bool {
        self.lock().live_prompt(chat, self.ttl).is_some()
    }

    pub fn take_prompt(&self, chat: ChatId) -> Result<RenamePrompt, RelayError> {
        let entry = self
            .lock()
            .prompts
            .remove(&chat)
            .ok_or(RelayError::TokenNotFound)?;

        if entry.is_expired(self.ttl) {
            return Err(RelayError::TokenExpired);
        }
        Ok(entry.value)
    }

    pub fn discard_prompt(&self, chat: ChatId) -> bool {
        self.lock().prompts.remove(&chat).is_some()
    }

    /// Register a running transfer and hand out its cancellation token.
    pub fn track(&self, token: Token) -> CancellationToken {
        let cancel = CancellationToken::new();
        self.lock().active.insert(token, cancel.clone());
        cancel
    }

    /// Trip the cancellation token of a running transfer.
    pub fn cancel_active(&self, token: Token) -> bool {
        match self.lock().active.get(&token) {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Forget everything held for `token`. Called once per finished transfer.
    pub fn release(&self, token: Token) {
        let mut inner = self.lock();
        inner.pending.remove(&token);
        inner.active.remove(&token);
    }

    /// Evict expired tokens and prompts. Returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };

        let mut inner = self.lock();
        let before = inner.pending.len() + inner.prompts.len();
        inner.pending.retain(|_, e| !e.is_expired(Some(ttl)));
        inner.prompts.retain(|_, e| !e.is_expired(Some(ttl)));
        let evicted = before - (inner.pending.len() + inner.prompts.len());

        if evicted > 0 {
            debug!(evicted, "expired registry entries swept");
        }
        evicted
    }

    /// True when nothing is pending, prompted or running.
    pub fn is_idle(&self) -> bool {
        let inner = self.lock();
        inner.pending.is_empty() && inner.prompts.is_empty() && inner.active.is_empty()
    }
}
