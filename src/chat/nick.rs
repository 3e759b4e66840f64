//! Nickname and message text rules.

/// Maximum nickname length in characters.
pub const MAX_NICK_LENGTH: usize = 20;

/// Characters stripped from nicknames by [`sanitize_nick`].
const NICK_STRIP: &[char] = &['<', '>', '"', '\'', '/', '\\'];

/// Check whether a character is allowed in a nickname.
fn is_nick_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '_' | '@' | '-' | '[' | ']' | '\\' | '^' | '{' | '}' | '|' | '`'
        )
}

/// Validate the format of a claimed nickname.
///
/// A nickname is valid when it is non-empty, at most 20 characters long
/// and only contains `[A-Za-z0-9_@\-\[\]\\^{}|\`]`.
///
/// # Examples
///
/// ```
/// use parlor::chat::nick::validate_format;
///
/// assert!(validate_format("alice"));
/// assert!(validate_format("[x]_^{y}|`@-"));
/// assert!(!validate_format("bad nick"));
/// assert!(!validate_format(""));
/// ```
pub fn validate_format(nick: &str) -> bool {
    !nick.trim().is_empty()
        && nick.chars().count() <= MAX_NICK_LENGTH
        && nick.chars().all(is_nick_char)
}

/// Sanitize a nickname for storage and display.
///
/// Trims surrounding whitespace, caps the length at 20 characters and
/// strips `< > " ' / \`.
pub fn sanitize_nick(nick: &str) -> String {
    nick.trim()
        .chars()
        .take(MAX_NICK_LENGTH)
        .filter(|c| !NICK_STRIP.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Sanitize chat text: trim, cap at `max_len` characters, strip `<` and `>`.
pub fn sanitize_message(text: &str, max_len: usize) -> String {
    text.trim()
        .chars()
        .take(max_len)
        .filter(|c| !matches!(c, '<' | '>'))
        .collect()
}

/// Case-insensitive nickname key.
pub fn nick_key(nick: &str) -> String {
    nick.to_lowercase()
}
