//! Size-suffix and `PATH:OFFSET` lexing for CLI arguments.

/// Parse a size specification that may end in `K`/`M`/`G`/`T` (base 1024).
///
/// A bare numeric string with no recognized suffix is returned unscaled.
pub fn parse_size_spec(s: &str) -> u64 {
    let s = s.trim();
    let (digits, suffix) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => (&s[..idx], &s[idx..]),
        None => (s, ""),
    };
    let num: u64 = digits.parse().unwrap_or(0);
    match suffix.chars().next() {
        Some('k') | Some('K') => num << 10,
        Some('m') | Some('M') => num << 20,
        Some('g') | Some('G') => num << 30,
        Some('t') | Some('T') => num << 40,
        _ => num,
    }
}

/// Split a `PATH:OFFSET` string into the path and an optional byte offset.
///
/// Only a colon immediately followed by a digit is treated as an offset
/// separator, so paths containing colons for other reasons (rare, but
/// possible on some filesystems) are left untouched.
pub fn split_path_offset(s: &str) -> (&str, u64) {
    if let Some(idx) = s.find(':') {
        let rest = &s[idx + 1..];
        if rest.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return (&s[..idx], parse_size_spec(rest));
        }
    }
    (s, 0)
}
