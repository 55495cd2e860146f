//! Fixed prompts used by the dialogue engine.

use crate::backend::{ChatCompletionRequest, ChatMessage};

/// System preamble prepended to every dialogue turn.
pub const SYSTEM_PREAMBLE: &str =
    "You are a helpful assistant. Keep your responses concise and to the point.";

/// Instruction used to produce a conversation title.
pub const TITLE_INSTRUCTION: &str = "Write a short, descriptive title (at most five words) \
for the conversation below. Reply with the title only, without quotes or punctuation at the end.";

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 50;

/// Builds the title-generation request for a first exchange.
#[must_use]
pub fn title_request(
    summary_model: &str,
    user_text: &str,
    response_text: &str,
) -> ChatCompletionRequest {
    let prompt = format!("{TITLE_INSTRUCTION}\n\nUser: {user_text}\n\nAssistant: {response_text}");
    ChatCompletionRequest::new(summary_model, vec![ChatMessage::user(prompt)])
}

/// Normalizes a generated title.
///
/// Keeps the first non-empty line, strips surrounding quotes and whitespace,
/// and truncates to [`MAX_TITLE_CHARS`]. Returns `None` if nothing remains.
#[must_use]
pub fn clean_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let stripped = line
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '*')
        .trim();
    if stripped.is_empty() {
        return None;
    }

    if stripped.chars().count() > MAX_TITLE_CHARS {
        let head: String = stripped.chars().take(MAX_TITLE_CHARS - 3).collect();
        Some(format!("{}...", head.trim_end()))
    } else {
        Some(stripped.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatRole;

    #[test]
    fn title_request_contains_both_sides() {
        let request = title_request("gpt-4o-mini", "Hello", "Hi! How can I help?");
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, ChatRole::User);
        assert!(request.messages[0].content.contains("Hello"));
        assert!(request.messages[0].content.contains("Hi! How can I help?"));
    }

    #[test]
    fn clean_title_strips_quotes() {
        assert_eq!(
            clean_title("  \"Weather Small Talk\"\n"),
            Some("Weather Small Talk".to_string())
        );
    }

    #[test]
    fn clean_title_takes_first_line() {
        assert_eq!(
            clean_title("\nGreeting\nSecond line"),
            Some("Greeting".to_string())
        );
    }

    #[test]
    fn clean_title_truncates() {
        let long = "a".repeat(80);
        let title = clean_title(&long).expect("title");
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn clean_title_rejects_blank() {
        assert_eq!(clean_title("  \n \"\" "), None);
    }
}
