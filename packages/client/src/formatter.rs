//! Display formatting for the terminal client.

use yoriai_engine::domain::entity::{ChatEntry, Vote};
use yoriai_shared::presence::PresenceRecord;
use yoriai_shared::protocol::ConsensusResult;
use yoriai_shared::time::timestamp_to_jst_rfc3339;

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the roster, marking the local participant
    pub fn format_roster(roster: &[PresenceRecord], current_user_id: &str) -> String {
        let mut output = String::new();
        output.push_str("\n============================================================\n");
        output.push_str("Participants:\n");

        if roster.is_empty() {
            output.push_str("(No participants)\n");
        } else {
            for participant in roster {
                let me_suffix = if participant.user_id == current_user_id {
                    " (me)"
                } else {
                    ""
                };
                let call_suffix = if participant.in_call { " [in call]" } else { "" };
                output.push_str(&format!(
                    "{} <{}> {:?}{}{}\n",
                    participant.display_name,
                    participant.user_id,
                    participant.role,
                    me_suffix,
                    call_suffix,
                ));
            }
        }

        output.push_str("============================================================\n");
        output
    }

    pub fn format_participant_joined(record: &PresenceRecord) -> String {
        let timestamp_str = timestamp_to_jst_rfc3339(record.online_at);
        format!(
            "\n+ {} joined at {}\n",
            record.display_name, timestamp_str
        )
    }

    pub fn format_participant_left(user_id: &str) -> String {
        format!("\n- {} left the session\n", user_id)
    }

    /// A vote arrived; before reveal only the fact of voting is shown
    pub fn format_vote_notice(voter_name: &str, is_change: bool, revealed: bool, label: &str) -> String {
        let verb = if is_change { "changed their vote" } else { "voted" };
        if revealed {
            format!("\n* {} {} -> {}\n", voter_name, verb, label)
        } else {
            format!("\n* {} {}\n", voter_name, verb)
        }
    }

    /// The reveal board: every vote plus the derived consensus
    pub fn format_reveal(votes: &[Vote], consensus: &ConsensusResult) -> String {
        let mut output = String::new();
        output.push_str("\n------------------------------------------------------------\n");
        output.push_str("Votes revealed:\n");
        for vote in votes {
            output.push_str(&format!("  {}: {}\n", vote.voter_name, vote.value.label()));
        }
        match (&consensus.value, consensus.is_unanimous) {
            (Some(value), true) => {
                output.push_str(&format!("Consensus: {} (unanimous)\n", value.label()));
            }
            (Some(value), false) => {
                output.push_str(&format!("Consensus: {} (override)\n", value.label()));
            }
            (None, _) => output.push_str("Consensus: none\n"),
        }
        if let Some(average) = consensus.average {
            output.push_str(&format!("Average: {average}\n"));
        }
        output.push_str("------------------------------------------------------------\n");
        output
    }

    pub fn format_timer(remaining_seconds: u32, running: bool) -> String {
        if running {
            format!("\n[timer] {}s remaining\n", remaining_seconds)
        } else if remaining_seconds == 0 {
            "\n[timer] expired\n".to_string()
        } else {
            format!("\n[timer] paused at {}s\n", remaining_seconds)
        }
    }

    pub fn format_item_changed(new_index: usize, title: Option<&str>) -> String {
        match title {
            Some(title) => format!("\n>> Now estimating item {}: {}\n", new_index, title),
            None => format!("\n>> Now estimating item {}\n", new_index),
        }
    }

    /// Format a chat entry. The id is shown so `/edit` and `/delete` can
    /// reference it; a tombstone shows only the marker text.
    pub fn format_chat_message(entry: &ChatEntry) -> String {
        let timestamp_str = timestamp_to_jst_rfc3339(entry.created_at);
        let edited_suffix = if entry.is_edited && !entry.is_deleted {
            " (edited)"
        } else {
            ""
        };
        format!(
            "\n[{}] @{}: {}{}\n  sent at {}\n",
            entry.id.as_str(),
            entry.author_name,
            entry.text,
            edited_suffix,
            timestamp_str
        )
    }

    pub fn format_current_votes(votes: &[Vote], revealed: bool) -> String {
        let mut output = String::new();
        output.push_str("\nCurrent votes:\n");
        if votes.is_empty() {
            output.push_str("(No votes yet)\n");
        }
        for vote in votes {
            if revealed {
                output.push_str(&format!("  {}: {}\n", vote.voter_name, vote.value.label()));
            } else {
                output.push_str(&format!("  {}: [hidden]\n", vote.voter_name));
            }
        }
        output
    }

    pub fn format_raw_message(text: &str) -> String {
        format!("\n<- Received: {}\n", text)
    }
}
