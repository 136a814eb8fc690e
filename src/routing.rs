// src/routing.rs
//! Routing-key helpers for the topic exchanges.
//!
//! Keys look like `deposit.laos.<account>`: the account id always sits in the
//! third dot-delimited segment.

/// Segment index holding the account id.
pub const ACCOUNT_SEGMENT: usize = 2;

/// Value logged when a key is too short to carry an account id.
pub const UNKNOWN_ACCOUNT: &str = "unknown";

/// Replace the first `*` in `pattern` with `account_id`.
///
/// Patterns without a wildcard are returned unchanged.
pub fn topic_for_account(pattern: &str, account_id: &str) -> String {
    pattern.replacen('*', account_id, 1)
}

/// Pull the account id out of a concrete routing key.
pub fn account_id_from_key(routing_key: &str) -> &str {
    routing_key
        .split('.')
        .nth(ACCOUNT_SEGMENT)
        .unwrap_or(UNKNOWN_ACCOUNT)
}

/// AMQP topic matching: `*` matches exactly one segment, `#` matches zero or
/// more segments.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches_from(&pattern, &key)
}

fn matches_from(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| matches_from(rest, &key[skip..])),
        Some((&"*", rest)) => !key.is_empty() && matches_from(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && matches_from(rest, &key[1..]),
    }
}
