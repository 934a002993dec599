//! Reconnect policy.
//!
//! Pure decision functions, kept free of IO so they are easy to test.

use crate::error::ClientError;

/// Check if the client should exit immediately based on the error type.
///
/// A duplicate user id can never succeed by retrying: the relay will
/// keep rejecting the same identity while the first connection lives.
pub fn should_exit_immediately(error: &ClientError) -> bool {
    matches!(error, ClientError::DuplicateUser(_))
}

/// Check if the client should attempt to reconnect.
///
/// # Arguments
///
/// * `error` - The client error that occurred
/// * `current_attempt` - The current reconnection attempt count (0-indexed)
/// * `max_attempts` - The maximum number of reconnection attempts allowed
pub fn should_attempt_reconnect(
    error: &ClientError,
    current_attempt: u32,
    max_attempts: u32,
) -> bool {
    if should_exit_immediately(error) {
        return false;
    }
    current_attempt < max_attempts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_user_exits_immediately() {
        // テスト項目: DuplicateUser エラーの場合、即座に終了すべきと判定される
        // given (前提条件):
        let error = ClientError::DuplicateUser("alice".to_string());

        // when (操作):
        let result = should_exit_immediately(&error);

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_connection_error_does_not_exit_immediately() {
        // テスト項目: ConnectionError の場合、即座に終了すべきではないと判定される
        // given (前提条件):
        let error = ClientError::ConnectionError("network error".to_string());

        // when (操作):
        let result = should_exit_immediately(&error);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_reconnect_within_limit() {
        // テスト項目: 再接続回数が上限未満の場合、再接続すべきと判定される
        // given (前提条件):
        let error = ClientError::ConnectionError("network error".to_string());

        // when (操作) / then (期待する結果):
        assert!(should_attempt_reconnect(&error, 0, 5));
        assert!(should_attempt_reconnect(&error, 4, 5));
    }

    #[test]
    fn test_reconnect_at_limit_is_denied() {
        // テスト項目: 再接続回数が上限に達した場合、再接続すべきではないと判定される
        // given (前提条件):
        let error = ClientError::ConnectionError("network error".to_string());

        // when (操作):
        let result = should_attempt_reconnect(&error, 5, 5);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_duplicate_user_never_reconnects() {
        // テスト項目: DuplicateUser エラーでは再接続しない
        // given (前提条件):
        let error = ClientError::DuplicateUser("alice".to_string());

        // when (操作):
        let result = should_attempt_reconnect(&error, 0, 5);

        // then (期待する結果):
        assert!(!result);
    }
}
