//! Chat synchronizer.
//!
//! Optimistic local echo with rollback: a message is appended locally as
//! soon as it is composed, and removed again — with its text handed back
//! for retry — if the persistence write fails, so a ghost message that
//! other clients never receive cannot linger. Edits and deletes are
//! author-only and enforced locally before any publish.
//!
//! Broadcast is for live propagation only; the store is authoritative
//! history. Mutations for unknown message ids are resolved by backfill,
//! never reconstructed from broadcast alone.

use std::sync::Arc;

use tokio::sync::Mutex;

use yoriai_shared::protocol::{ChatMessageRecord, SessionEvent};
use yoriai_shared::time::Clock;

use crate::domain::entity::ChatEntry;
use crate::domain::replica::SessionReplica;
use crate::domain::value_object::{ItemId, MessageId, MessageText, SessionId};
use crate::port::bus::EventBus;
use crate::port::store::EstimationStore;

use super::error::ChatError;
use super::{publish_lossy, Identity};

/// How much history a mount/backfill pull reads
pub const HISTORY_LIMIT: usize = 100;

pub struct ChatSynchronizer {
    replica: Arc<Mutex<SessionReplica>>,
    store: Arc<dyn EstimationStore>,
    bus: Arc<dyn EventBus>,
    identity: Arc<Identity>,
    clock: Arc<dyn Clock>,
    session_id: SessionId,
}

impl ChatSynchronizer {
    pub fn new(
        replica: Arc<Mutex<SessionReplica>>,
        store: Arc<dyn EstimationStore>,
        bus: Arc<dyn EventBus>,
        identity: Arc<Identity>,
        clock: Arc<dyn Clock>,
        session_id: SessionId,
    ) -> Self {
        Self {
            replica,
            store,
            bus,
            identity,
            clock,
            session_id,
        }
    }

    /// Send a message: append optimistically, persist, then publish.
    ///
    /// On persistence failure the optimistic entry is rolled back and the
    /// composed text is returned inside the error so the caller can
    /// restore it for retry.
    pub async fn send(
        &self,
        text: String,
        item_id: Option<ItemId>,
    ) -> Result<MessageId, ChatError> {
        let validated = MessageText::new(text)?;
        let entry = ChatEntry {
            id: MessageId::generate(),
            session_id: self.session_id.clone(),
            author_id: self.identity.user_id.clone(),
            author_name: self.identity.display_name.as_str().to_string(),
            author_role: self.identity.role,
            text: validated.into_string(),
            created_at: self.clock.now_jst_millis(),
            item_id,
            is_edited: false,
            is_deleted: false,
            edited_at: None,
            deleted_at: None,
            original_text: None,
        };
        let record = ChatMessageRecord::from(entry.clone());
        let event = SessionEvent::ChatMessage {
            message: record.clone(),
        };

        {
            let mut replica = self.replica.lock().await;
            replica.apply(&event, self.identity.user_id.as_str())?;
        }

        if let Err(source) = self.store.append_chat_message(entry.clone()).await {
            let mut replica = self.replica.lock().await;
            replica.chat.retain(|m| m.id != entry.id);
            return Err(ChatError::RolledBack {
                restored_text: record.text,
                source,
            });
        }

        publish_lossy(&self.bus, event).await;
        Ok(entry.id)
    }

    /// Edit an own message in place
    pub async fn edit(&self, id: &MessageId, new_text: String) -> Result<(), ChatError> {
        let validated = MessageText::new(new_text)?;
        let (previous, updated) = {
            let replica = self.replica.lock().await;
            let entry = replica
                .chat_entry(id)
                .ok_or_else(|| ChatError::UnknownMessage(id.as_str().to_string()))?;
            if entry.author_id != self.identity.user_id {
                return Err(ChatError::NotAuthor);
            }
            if entry.is_deleted {
                return Err(ChatError::MessageDeleted);
            }
            let previous = entry.clone();
            let mut updated = entry.clone();
            updated.edit(validated.into_string(), self.clock.now_jst_millis());
            (previous, updated)
        };

        self.apply_mutation(previous, updated, false).await
    }

    /// Delete an own message, leaving a tombstone. Deleting twice is a
    /// no-op.
    pub async fn delete(&self, id: &MessageId) -> Result<(), ChatError> {
        let (previous, updated) = {
            let replica = self.replica.lock().await;
            let entry = replica
                .chat_entry(id)
                .ok_or_else(|| ChatError::UnknownMessage(id.as_str().to_string()))?;
            if entry.author_id != self.identity.user_id {
                return Err(ChatError::NotAuthor);
            }
            if entry.is_deleted {
                return Ok(());
            }
            let previous = entry.clone();
            let mut updated = entry.clone();
            updated.delete(self.clock.now_jst_millis());
            (previous, updated)
        };

        self.apply_mutation(previous, updated, true).await
    }

    /// Pull the authoritative history tail from the store and merge it.
    /// Called on mount and whenever unknown-id mutations are pending.
    pub async fn backfill(&self) -> Result<(), ChatError> {
        let entries = self.store.list_chat_messages(HISTORY_LIMIT).await?;
        let mut replica = self.replica.lock().await;
        replica.merge_chat_history(entries);
        Ok(())
    }

    /// Messages in display order
    pub async fn messages(&self) -> Vec<ChatEntry> {
        let replica = self.replica.lock().await;
        replica.chat.clone()
    }

    async fn apply_mutation(
        &self,
        previous: ChatEntry,
        updated: ChatEntry,
        is_delete: bool,
    ) -> Result<(), ChatError> {
        let record = ChatMessageRecord::from(updated.clone());
        let event = if is_delete {
            SessionEvent::ChatMessageDeleted {
                message: record.clone(),
            }
        } else {
            SessionEvent::ChatMessageUpdated {
                message: record.clone(),
            }
        };

        // Optimistic local replace; rolled back below on store failure.
        {
            let mut replica = self.replica.lock().await;
            if let Some(entry) = replica.chat.iter_mut().find(|m| m.id == updated.id) {
                *entry = updated.clone();
            }
        }

        if let Err(source) = self.store.update_chat_message(updated.clone()).await {
            let mut replica = self.replica.lock().await;
            if let Some(entry) = replica.chat.iter_mut().find(|m| m.id == previous.id) {
                *entry = previous;
            }
            return Err(ChatError::Persistence(source));
        }

        publish_lossy(&self.bus, event).await;
        Ok(())
    }
}
