//! Response text shown to the chat user.

use controlqa_shared::{AnswerEntry, ControlIdentifier, ControlQaError};

/// Footer label preceding citation lists.
pub const SOURCES_LABEL: &str = "Sources used:";

/// One answered question with its citations.
pub fn render_entry(entry: &AnswerEntry) -> String {
    format!(
        "**Q: {}**\nA: {}\n{SOURCES_LABEL}\n{}",
        entry.question, entry.answer, entry.source_list
    )
}

/// All answers for a control under a Family / ControlID header, in question order.
pub fn render_answers(id: &ControlIdentifier, entries: &[AnswerEntry]) -> String {
    if entries.is_empty() {
        return no_answers_message(id);
    }
    let body = entries
        .iter()
        .map(render_entry)
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "**Family: {} | ControlID: {}**\n\n{body}",
        id.family, id.control_id
    )
}

/// A free-text answer followed by its citation footer.
pub fn render_free_text(answer: &str, source_list: &str) -> String {
    format!("{answer}\n\n---\n{SOURCES_LABEL}\n{source_list}")
}

pub fn not_found_message(id: &ControlIdentifier) -> String {
    format!(
        "No control data found for Family '{}' and ControlID '{}'.",
        id.family, id.control_id
    )
}

pub fn no_answers_message(id: &ControlIdentifier) -> String {
    format!(
        "No answers found for any generated question of Family '{}' and ControlID '{}'.",
        id.family, id.control_id
    )
}

/// The fixed message returned instead of a partial answer when a call fails.
pub fn failure_message(err: &ControlQaError) -> String {
    format!(
        "Sorry, this request could not be completed because the {} failed. \
         Please try again later.",
        err.component()
    )
}
