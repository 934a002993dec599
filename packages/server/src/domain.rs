//! Domain logic for relay-side operations.
//!
//! This module contains pure functions that implement the relay's
//! routing and membership rules without side effects, making them easy
//! to test.

use std::collections::HashMap;

use yoriai_shared::presence::PresenceRecord;
use yoriai_shared::protocol::SessionEvent;

use super::state::MemberHandle;

/// Build the roster snapshot from connected members.
///
/// Sorted by user id for consistent ordering.
pub fn build_roster(members: &HashMap<String, MemberHandle>) -> Vec<PresenceRecord> {
    let mut roster: Vec<PresenceRecord> =
        members.values().map(|m| m.record.clone()).collect();
    roster.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    roster
}

/// Check whether a user id is already connected to the session
pub fn is_duplicate_member(members: &HashMap<String, MemberHandle>, user_id: &str) -> bool {
    members.contains_key(user_id)
}

/// Get fan-out targets: all members except the specified one
pub fn broadcast_targets<'a>(
    members: &'a HashMap<String, MemberHandle>,
    exclude_user_id: &str,
) -> Vec<(&'a String, &'a MemberHandle)> {
    members
        .iter()
        .filter(|(user_id, _)| user_id.as_str() != exclude_user_id)
        .collect()
}

/// Decide where a published event goes.
///
/// Peer-addressed events (video signals) are routed to their single
/// target; everything else fans out to every member but the publisher.
pub fn route_target(event: &SessionEvent) -> Option<String> {
    event.target().map(str::to_string)
}

/// Members whose last activity is older than the liveness timeout.
///
/// A client that disappears without a leave is a ghost until this cutoff
/// fires; dependent components tolerate the ghost in the meantime.
pub fn expired_member_ids(
    members: &HashMap<String, MemberHandle>,
    now_millis: i64,
    timeout_millis: i64,
) -> Vec<String> {
    let mut expired: Vec<String> = members
        .iter()
        .filter(|(_, member)| now_millis - member.last_seen_at > timeout_millis)
        .map(|(user_id, _)| user_id.clone())
        .collect();
    expired.sort();
    expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use yoriai_shared::presence::Role;
    use yoriai_shared::protocol::{SignalKind, SignalPayload};

    fn member(user: &str, last_seen_at: i64) -> MemberHandle {
        let (sender, _receiver) = mpsc::unbounded_channel();
        MemberHandle {
            sender,
            record: PresenceRecord::new(
                user.to_string(),
                user.to_string(),
                Role::TeamMember,
                last_seen_at,
            ),
            last_seen_at,
        }
    }

    #[test]
    fn test_build_roster_sorted_by_user_id() {
        // テスト項目: ロスターが user_id 順に並ぶ
        // given (前提条件):
        let mut members = HashMap::new();
        members.insert("charlie".to_string(), member("charlie", 3000));
        members.insert("alice".to_string(), member("alice", 1000));
        members.insert("bob".to_string(), member("bob", 2000));

        // when (操作):
        let roster = build_roster(&members);

        // then (期待する結果):
        assert_eq!(roster.len(), 3);
        assert_eq!(roster[0].user_id, "alice");
        assert_eq!(roster[1].user_id, "bob");
        assert_eq!(roster[2].user_id, "charlie");
    }

    #[test]
    fn test_is_duplicate_member() {
        // テスト項目: 既存の user_id をチェックした場合のみ true が返される
        // given (前提条件):
        let mut members = HashMap::new();
        members.insert("alice".to_string(), member("alice", 1000));

        // when (操作) / then (期待する結果):
        assert!(is_duplicate_member(&members, "alice"));
        assert!(!is_duplicate_member(&members, "bob"));
    }

    #[test]
    fn test_broadcast_targets_excludes_publisher() {
        // テスト項目: ブロードキャスト対象から発行者が除外される
        // given (前提条件):
        let mut members = HashMap::new();
        members.insert("alice".to_string(), member("alice", 1000));
        members.insert("bob".to_string(), member("bob", 2000));
        members.insert("charlie".to_string(), member("charlie", 3000));

        // when (操作):
        let targets = broadcast_targets(&members, "alice");

        // then (期待する結果):
        assert_eq!(targets.len(), 2);
        let ids: Vec<&str> = targets.iter().map(|(id, _)| id.as_str()).collect();
        assert!(ids.contains(&"bob"));
        assert!(ids.contains(&"charlie"));
        assert!(!ids.contains(&"alice"));
    }

    #[test]
    fn test_route_target_for_video_signal() {
        // テスト項目: video-signal イベントだけが単一の宛先にルーティングされる
        // given (前提条件):
        let signal = SessionEvent::VideoSignal {
            payload: SignalPayload {
                from: "alice".to_string(),
                to: "bob".to_string(),
                session_id: "s-1".to_string(),
                kind: SignalKind::Offer {
                    sdp: "v=0".to_string(),
                    handshake_id: "h-1".to_string(),
                },
            },
        };
        let broadcast = SessionEvent::ItemChanged {
            new_index: 1,
            actor_id: "alice".to_string(),
        };

        // when (操作) / then (期待する結果):
        assert_eq!(route_target(&signal), Some("bob".to_string()));
        assert_eq!(route_target(&broadcast), None);
    }

    #[test]
    fn test_expired_member_ids() {
        // テスト項目: タイムアウトを超えたメンバーだけが失効と判定される
        // given (前提条件): alice は新しく、bob は古い
        let mut members = HashMap::new();
        members.insert("alice".to_string(), member("alice", 100_000));
        members.insert("bob".to_string(), member("bob", 10_000));

        // when (操作):
        let expired = expired_member_ids(&members, 100_500, 45_000);

        // then (期待する結果):
        assert_eq!(expired, vec!["bob".to_string()]);
    }

    #[test]
    fn test_expired_member_ids_with_no_members() {
        // テスト項目: メンバーが空の場合、失効リストも空になる
        // given (前提条件):
        let members = HashMap::new();

        // when (操作):
        let expired = expired_member_ids(&members, 100_000, 45_000);

        // then (期待する結果):
        assert!(expired.is_empty());
    }
}
