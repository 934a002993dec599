//! Slash-command parsing.
//!
//! Lines starting with `/` become session intents; everything else is a
//! chat message.

use thiserror::Error;

use yoriai_shared::protocol::{EstimateValue, Scale, ShirtSize};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `/vote <value>` — a point, a size, `?` (need info) or `!` (too big)
    Vote(EstimateValue),
    /// `/reveal`
    Reveal,
    /// `/start [seconds]`
    Start(Option<u32>),
    /// `/pause`
    Pause,
    /// `/resume`
    Resume,
    /// `/reset`
    ResetTimer,
    /// `/limit <seconds>`
    Limit(u32),
    /// `/override <value>`
    Override(EstimateValue),
    /// `/accept`
    Accept,
    /// `/skip`
    Skip,
    /// `/goto <index>`
    GoTo(usize),
    /// `/scale fib|tshirt`
    ChangeScale(Scale),
    /// `/edit <message-id> <new text>`
    Edit { id: String, text: String },
    /// `/delete <message-id>`
    Delete { id: String },
    /// `/call` — join the video call
    Call,
    /// `/hangup` — leave the video call
    Hangup,
    /// `/screen` — swap the outgoing track for a screen capture
    Screen,
    /// `/who` — show the roster
    Participants,
    /// `/votes` — show the current votes
    Votes,
    /// `/help`
    Help,
    /// Plain text: send as chat
    Chat(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("unknown command '/{0}' (try /help)")]
    UnknownCommand(String),

    #[error("'{0}' is not a valid estimate (try 5, M, ? or !)")]
    InvalidEstimate(String),

    #[error("/{command} expects {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },
}

/// Parse one input line into a command
pub fn parse_line(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Chat(line.to_string()));
    };

    let mut parts = rest.splitn(2, ' ');
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();

    match name {
        "vote" => {
            if arg.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "vote",
                    expected: "a value",
                });
            }
            parse_estimate(arg)
                .map(Command::Vote)
                .ok_or_else(|| CommandError::InvalidEstimate(arg.to_string()))
        }
        "reveal" => Ok(Command::Reveal),
        "start" => {
            if arg.is_empty() {
                Ok(Command::Start(None))
            } else {
                arg.parse()
                    .map(|secs| Command::Start(Some(secs)))
                    .map_err(|_| CommandError::MissingArgument {
                        command: "start",
                        expected: "a duration in seconds",
                    })
            }
        }
        "pause" => Ok(Command::Pause),
        "resume" => Ok(Command::Resume),
        "reset" => Ok(Command::ResetTimer),
        "limit" => arg
            .parse()
            .map(Command::Limit)
            .map_err(|_| CommandError::MissingArgument {
                command: "limit",
                expected: "a duration in seconds",
            }),
        "override" => {
            if arg.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "override",
                    expected: "a value",
                });
            }
            parse_estimate(arg)
                .map(Command::Override)
                .ok_or_else(|| CommandError::InvalidEstimate(arg.to_string()))
        }
        "accept" => Ok(Command::Accept),
        "skip" => Ok(Command::Skip),
        "goto" => arg
            .parse()
            .map(Command::GoTo)
            .map_err(|_| CommandError::MissingArgument {
                command: "goto",
                expected: "an item index",
            }),
        "scale" => match arg {
            "fib" | "fibonacci" => Ok(Command::ChangeScale(Scale::Fibonacci)),
            "tshirt" | "t-shirt" => Ok(Command::ChangeScale(Scale::TShirt)),
            _ => Err(CommandError::MissingArgument {
                command: "scale",
                expected: "'fib' or 'tshirt'",
            }),
        },
        "edit" => {
            let mut parts = arg.splitn(2, ' ');
            match (parts.next(), parts.next()) {
                (Some(id), Some(text)) if !id.is_empty() && !text.trim().is_empty() => {
                    Ok(Command::Edit {
                        id: id.to_string(),
                        text: text.trim().to_string(),
                    })
                }
                _ => Err(CommandError::MissingArgument {
                    command: "edit",
                    expected: "a message id and new text",
                }),
            }
        }
        "delete" => {
            if arg.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "delete",
                    expected: "a message id",
                })
            } else {
                Ok(Command::Delete {
                    id: arg.to_string(),
                })
            }
        }
        "call" => Ok(Command::Call),
        "hangup" => Ok(Command::Hangup),
        "screen" => Ok(Command::Screen),
        "who" => Ok(Command::Participants),
        "votes" => Ok(Command::Votes),
        "help" => Ok(Command::Help),
        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

/// Parse an estimate value: a Fibonacci point, a T-shirt size, or a
/// sentinel (`?` need info, `!` too big)
pub fn parse_estimate(raw: &str) -> Option<EstimateValue> {
    match raw.to_ascii_uppercase().as_str() {
        "?" | "NEED-INFO" => Some(EstimateValue::NeedInfo),
        "!" | "TOO-BIG" => Some(EstimateValue::TooBig),
        "XS" => Some(EstimateValue::Shirt { size: ShirtSize::XS }),
        "S" => Some(EstimateValue::Shirt { size: ShirtSize::S }),
        "M" => Some(EstimateValue::Shirt { size: ShirtSize::M }),
        "L" => Some(EstimateValue::Shirt { size: ShirtSize::L }),
        "XL" => Some(EstimateValue::Shirt { size: ShirtSize::XL }),
        digits => digits
            .parse::<u32>()
            .ok()
            .map(|points| EstimateValue::Points { points }),
    }
}

pub const HELP_TEXT: &str = "\
Commands:
  /vote <value>        cast or change your vote (5, M, ?, !)
  /reveal              reveal the votes for the active item
  /start [seconds]     start the timer (moderator)
  /pause /resume       pause or resume the timer (moderator)
  /reset               reset the timer (moderator)
  /limit <seconds>     change the default timer duration (moderator)
  /override <value>    override the consensus (moderator)
  /accept /skip        resolve the active item (moderator)
  /goto <index>        jump to an item (moderator)
  /scale fib|tshirt    change the estimation scale (moderator)
  /edit <id> <text>    edit one of your messages
  /delete <id>         delete one of your messages
  /call /hangup        join or leave the video call
  /screen              share your screen
  /who /votes          show the roster / current votes
Anything else is sent as a chat message.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_chat() {
        // テスト項目: スラッシュで始まらない行はチャットとして扱われる
        // given (前提条件):
        let line = "hello everyone";

        // when (操作):
        let result = parse_line(line).unwrap();

        // then (期待する結果):
        assert_eq!(result, Command::Chat("hello everyone".to_string()));
    }

    #[test]
    fn test_vote_with_points() {
        // テスト項目: /vote 5 が数値投票としてパースされる
        // given (前提条件):

        // when (操作):
        let result = parse_line("/vote 5").unwrap();

        // then (期待する結果):
        assert_eq!(result, Command::Vote(EstimateValue::Points { points: 5 }));
    }

    #[test]
    fn test_vote_with_shirt_size_is_case_insensitive() {
        // テスト項目: /vote m が T シャツサイズとしてパースされる
        // given (前提条件):

        // when (操作):
        let result = parse_line("/vote m").unwrap();

        // then (期待する結果):
        assert_eq!(
            result,
            Command::Vote(EstimateValue::Shirt { size: ShirtSize::M })
        );
    }

    #[test]
    fn test_vote_sentinels() {
        // テスト項目: ? と ! がセンチネル投票としてパースされる
        // given (前提条件):

        // when (操作) / then (期待する結果):
        assert_eq!(
            parse_line("/vote ?").unwrap(),
            Command::Vote(EstimateValue::NeedInfo)
        );
        assert_eq!(
            parse_line("/vote !").unwrap(),
            Command::Vote(EstimateValue::TooBig)
        );
    }

    #[test]
    fn test_invalid_estimate_is_rejected() {
        // テスト項目: 不正な見積もり値はエラーになる
        // given (前提条件):

        // when (操作):
        let result = parse_line("/vote banana");

        // then (期待する結果):
        assert_eq!(
            result,
            Err(CommandError::InvalidEstimate("banana".to_string()))
        );
    }

    #[test]
    fn test_start_without_duration_uses_default() {
        // テスト項目: /start 単体はデフォルト時間での開始になる
        // given (前提条件):

        // when (操作):
        let result = parse_line("/start").unwrap();

        // then (期待する結果):
        assert_eq!(result, Command::Start(None));
    }

    #[test]
    fn test_edit_splits_id_and_text() {
        // テスト項目: /edit が id と本文に分割される
        // given (前提条件):

        // when (操作):
        let result = parse_line("/edit m-1 new wording here").unwrap();

        // then (期待する結果):
        assert_eq!(
            result,
            Command::Edit {
                id: "m-1".to_string(),
                text: "new wording here".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_command() {
        // テスト項目: 未知のコマンドはエラーになる
        // given (前提条件):

        // when (操作):
        let result = parse_line("/frobnicate");

        // then (期待する結果):
        assert_eq!(
            result,
            Err(CommandError::UnknownCommand("frobnicate".to_string()))
        );
    }
}
