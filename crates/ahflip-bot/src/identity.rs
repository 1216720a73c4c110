//! Short log prefixes for identities.

/// Minimum prefix length.
pub const MIN_PREFIX_LEN: usize = 3;

/// Shortest prefix of `own`, at least `min_len` characters, that no other
/// identity in `all` starts with. When `own` is itself a prefix of another
/// identity the full name is returned.
pub fn unique_prefix(own: &str, all: &[String], min_len: usize) -> String {
    let chars: Vec<char> = own.chars().collect();
    let others: Vec<&str> = all
        .iter()
        .map(String::as_str)
        .filter(|other| *other != own)
        .collect();

    let mut len = min_len.max(1);
    while len < chars.len() {
        let candidate: String = chars[..len].iter().collect();
        if !others.iter().any(|other| other.starts_with(&candidate)) {
            return candidate;
        }
        len += 1;
    }
    own.to_string()
}

/// Prefix shown in front of an identity's log lines. Empty when only one
/// identity runs.
pub fn log_prefix(own: &str, all: &[String]) -> String {
    if all.len() > 1 {
        unique_prefix(own, all, MIN_PREFIX_LEN)
    } else {
        String::new()
    }
}
