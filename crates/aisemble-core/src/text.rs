//! Text helpers for derived session titles.

/// Maximum length of a derived session title, including the ellipsis.
const MAX_TITLE_CHARS: usize = 50;

/// Derive a session title from the first user message.
///
/// Messages of 50 characters or fewer are used verbatim. Longer messages are
/// truncated at a word boundary so the result plus the trailing `"..."` stays
/// within 50 characters.
#[must_use]
pub fn generate_session_title(first_user_message: &str) -> String {
    if first_user_message.chars().count() <= MAX_TITLE_CHARS {
        return first_user_message.to_owned();
    }

    let budget = MAX_TITLE_CHARS - 3;
    let mut title = String::new();
    for word in first_user_message.split(' ') {
        if title.chars().count() + word.chars().count() > budget {
            return format!("{}...", title.trim());
        }
        title.push_str(word);
        title.push(' ');
    }
    title.trim().to_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
