//! Queue rendering for the CLI display.

use crate::common::time::millis_to_rfc3339;
use crate::protocol::RosterEntry;

use super::domain::QueueSlot;

/// Renders queue and roster state for the terminal.
pub struct QueueFormatter;

impl QueueFormatter {
    /// Format the speaking queue: the head is emphasized as the current
    /// speaker, everyone else is listed as waiting, in turn order.
    pub fn format_queue(slots: &[QueueSlot]) -> String {
        let mut output = String::new();
        output.push_str("\n\n============================================================\n");
        output.push_str("Speaking queue:\n");

        if slots.is_empty() {
            output.push_str("(Queue is empty)\n");
        } else {
            for (index, slot) in slots.iter().enumerate() {
                if slot.speaking {
                    output.push_str(&format!("  1. ** {} (Speaking) **\n", slot.name));
                } else {
                    output.push_str(&format!("  {}. {}\n", index + 1, slot.name));
                }
            }
        }

        output.push_str("============================================================\n");
        output
    }

    /// Format the connected-participant roster.
    ///
    /// # Arguments
    ///
    /// * `participants` - Roster entries in connection order
    /// * `current_client_id` - The current client's ID (to mark as "me")
    pub fn format_roster(participants: &[RosterEntry], current_client_id: &str) -> String {
        let mut output = String::new();
        output.push_str("\n\n============================================================\n");
        output.push_str("Participants:\n");

        if participants.is_empty() {
            output.push_str("(No participants)\n");
        } else {
            for participant in participants {
                let me_suffix = if participant.user_id == current_client_id {
                    " (me)"
                } else {
                    ""
                };
                let gm_suffix = if participant.is_gm { " [GM]" } else { "" };
                let timestamp_str = millis_to_rfc3339(participant.connected_at);
                output.push_str(&format!(
                    "{}{}{} - connected at {}\n",
                    participant.name, gm_suffix, me_suffix, timestamp_str
                ));
            }
        }

        output.push_str("============================================================\n");
        output
    }

    /// Format a server-side rejection notice.
    pub fn format_action_rejected(reason: &str) -> String {
        format!("\n! Action rejected by the server: {}\n", reason)
    }

    /// Format the command usage help.
    pub fn format_help() -> String {
        "\nCommands:\n\
         /join   join the speaking queue\n\
         /leave  leave the speaking queue\n\
         /next   dismiss the current speaker (GM only)\n\
         /clear  clear the whole queue (GM only)\n\
         /queue  show the current queue\n\
         /who    show connected participants\n\
         /help   show this help\n"
            .to_string()
    }

    /// Format a raw text message (when parsing fails)
    pub fn format_raw_message(text: &str) -> String {
        format!("\n← Received: {}\n", text)
    }
}
