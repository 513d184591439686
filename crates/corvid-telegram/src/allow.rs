//! Allowlist enforcement for the Telegram front-end.
//!
//! Deny-by-default: an empty `allow_users` list means no one is allowed.
//! Wildcard `"*"` allows everyone. Entries may include or omit the leading `@`.

/// Returns `true` when the given Telegram user is permitted to interact
/// with the bot.
///
/// Matching rules (all case-sensitive, matching the Telegram API):
/// - `"*"` — allow everyone
/// - `"@username"` or `"username"` — match by Telegram username (without `@`)
/// - `"123456789"` — match by numeric Telegram user ID
///
/// An empty `allow_users` slice always returns `false` (deny-by-default).
pub fn is_allowed(allow_users: &[String], username: &str, user_id: &str) -> bool {
    if allow_users.is_empty() {
        return false;
    }
    allow_users.iter().any(|entry| {
        let entry = entry.trim_start_matches('@');
        entry == "*" || entry == username || entry == user_id
    })
}
