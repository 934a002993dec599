//! Persistence collaborator port.
//!
//! The store is an external CRUD collaborator; the engine never assumes
//! a concrete schema beyond these operations and their return shapes.
//! Broadcast optimizes latency, the store is authoritative history:
//! every reconciliation pull reads through this trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::entity::{ChatEntry, Item, ItemStatus, Vote};
use crate::domain::value_object::{ItemId, SessionId, UserId};

/// Errors surfaced by the persistence collaborator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("write rejected: {0}")]
    Rejected(String),
}

/// The persistence operations the session engine consumes
#[async_trait]
pub trait EstimationStore: Send + Sync {
    /// Upsert a vote by `(item, voter)` key
    async fn create_vote(&self, vote: Vote) -> Result<(), StoreError>;

    async fn list_votes_for_item(&self, item_id: &ItemId) -> Result<Vec<Vote>, StoreError>;

    /// Update an item's status and stored final estimate
    async fn update_item(
        &self,
        item_id: &ItemId,
        status: ItemStatus,
        final_estimate: Option<String>,
    ) -> Result<(), StoreError>;

    async fn append_chat_message(&self, entry: ChatEntry) -> Result<(), StoreError>;

    async fn update_chat_message(&self, entry: ChatEntry) -> Result<(), StoreError>;

    /// Most recent messages, oldest first, at most `limit`
    async fn list_chat_messages(&self, limit: usize) -> Result<Vec<ChatEntry>, StoreError>;

    async fn list_session_items(&self, session_id: &SessionId) -> Result<Vec<Item>, StoreError>;
}

struct StoreInner {
    items: HashMap<SessionId, Vec<Item>>,
    votes: HashMap<(ItemId, UserId), Vote>,
    messages: Vec<ChatEntry>,
}

/// In-memory store implementation.
///
/// Backs the engine tests and single-process compositions; a deployment
/// against a relational store implements [`EstimationStore`] instead.
pub struct InMemoryEstimationStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl InMemoryEstimationStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                items: HashMap::new(),
                votes: HashMap::new(),
                messages: Vec::new(),
            })),
        }
    }

    /// Seed the store with a session's backlog
    pub async fn seed_items(&self, session_id: SessionId, items: Vec<Item>) {
        let mut inner = self.inner.lock().await;
        inner.items.insert(session_id, items);
    }
}

impl Default for InMemoryEstimationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EstimationStore for InMemoryEstimationStore {
    async fn create_vote(&self, vote: Vote) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .votes
            .insert((vote.item_id.clone(), vote.voter_id.clone()), vote);
        Ok(())
    }

    async fn list_votes_for_item(&self, item_id: &ItemId) -> Result<Vec<Vote>, StoreError> {
        let inner = self.inner.lock().await;
        let mut votes: Vec<Vote> = inner
            .votes
            .values()
            .filter(|v| &v.item_id == item_id)
            .cloned()
            .collect();
        votes.sort_by(|a, b| a.voter_id.cmp(&b.voter_id));
        Ok(votes)
    }

    async fn update_item(
        &self,
        item_id: &ItemId,
        status: ItemStatus,
        final_estimate: Option<String>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        for items in inner.items.values_mut() {
            if let Some(item) = items.iter_mut().find(|i| &i.id == item_id) {
                item.status = status;
                item.final_estimate = final_estimate;
                return Ok(());
            }
        }
        Err(StoreError::NotFound(item_id.as_str().to_string()))
    }

    async fn append_chat_message(&self, entry: ChatEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.messages.push(entry);
        Ok(())
    }

    async fn update_chat_message(&self, entry: ChatEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.messages.iter_mut().find(|m| m.id == entry.id) {
            Some(existing) => {
                *existing = entry;
                Ok(())
            }
            None => Err(StoreError::NotFound(entry.id.as_str().to_string())),
        }
    }

    async fn list_chat_messages(&self, limit: usize) -> Result<Vec<ChatEntry>, StoreError> {
        let inner = self.inner.lock().await;
        let mut messages = inner.messages.clone();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.split_off(skip))
    }

    async fn list_session_items(&self, session_id: &SessionId) -> Result<Vec<Item>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.items.get(session_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yoriai_shared::protocol::{EstimateValue, Scale};

    fn vote(item: &str, voter: &str, points: u32) -> Vote {
        Vote {
            item_id: ItemId::new(item.to_string()).unwrap(),
            voter_id: UserId::new(voter.to_string()).unwrap(),
            voter_name: voter.to_string(),
            value: EstimateValue::Points { points },
            submitted_at: 1000,
            revealed: false,
        }
    }

    #[tokio::test]
    async fn test_create_vote_upserts_by_item_and_voter() {
        // テスト項目: 同一 (item, voter) の投票が上書きされる
        // given (前提条件):
        let store = InMemoryEstimationStore::new();
        store.create_vote(vote("item-a", "alice", 5)).await.unwrap();

        // when (操作):
        store.create_vote(vote("item-a", "alice", 8)).await.unwrap();

        // then (期待する結果):
        let item_id = ItemId::new("item-a".to_string()).unwrap();
        let votes = store.list_votes_for_item(&item_id).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].value, EstimateValue::Points { points: 8 });
    }

    #[tokio::test]
    async fn test_update_item_persists_status_and_estimate() {
        // テスト項目: アイテムのステータスと確定見積もりが保存される
        // given (前提条件):
        let store = InMemoryEstimationStore::new();
        let session_id = SessionId::new("s-1".to_string()).unwrap();
        let item_id = ItemId::new("item-a".to_string()).unwrap();
        store
            .seed_items(
                session_id.clone(),
                vec![Item::new(item_id.clone(), "Login".to_string(), Scale::Fibonacci)],
            )
            .await;

        // when (操作):
        store
            .update_item(&item_id, ItemStatus::Estimated, Some("8".to_string()))
            .await
            .unwrap();

        // then (期待する結果):
        let items = store.list_session_items(&session_id).await.unwrap();
        assert_eq!(items[0].status, ItemStatus::Estimated);
        assert_eq!(items[0].final_estimate, Some("8".to_string()));
    }

    #[tokio::test]
    async fn test_update_unknown_item_is_an_error() {
        // テスト項目: 存在しないアイテムの更新はエラーになる
        // given (前提条件):
        let store = InMemoryEstimationStore::new();
        let item_id = ItemId::new("ghost".to_string()).unwrap();

        // when (操作):
        let result = store.update_item(&item_id, ItemStatus::Skipped, None).await;

        // then (期待する結果):
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_chat_messages_returns_tail() {
        // テスト項目: 直近 limit 件のメッセージが古い順で返る
        // given (前提条件):
        let store = InMemoryEstimationStore::new();
        for i in 0..5 {
            let mut entry = sample_entry(&format!("m-{i}"));
            entry.created_at = 1000 + i as i64;
            store.append_chat_message(entry).await.unwrap();
        }

        // when (操作):
        let messages = store.list_chat_messages(3).await.unwrap();

        // then (期待する結果):
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].id.as_str(), "m-2");
        assert_eq!(messages[2].id.as_str(), "m-4");
    }

    fn sample_entry(id: &str) -> ChatEntry {
        ChatEntry {
            id: crate::domain::value_object::MessageId::new(id.to_string()).unwrap(),
            session_id: SessionId::new("s-1".to_string()).unwrap(),
            author_id: UserId::new("alice".to_string()).unwrap(),
            author_name: "Alice".to_string(),
            author_role: yoriai_shared::presence::Role::TeamMember,
            text: "hello".to_string(),
            created_at: 1000,
            item_id: None,
            is_edited: false,
            is_deleted: false,
            edited_at: None,
            deleted_at: None,
            original_text: None,
        }
    }
}
