//! Glob matching for index scopes and key scans.
//!
//! Supported wildcards: `*` matches any run of characters (including none),
//! `?` matches exactly one character. Everything else is literal.

/// Returns true if `key` matches the glob `pattern`.
pub fn matches(pattern: &str, key: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        if !has_wildcards(prefix) {
            return key.starts_with(prefix);
        }
    }

    let p: Vec<char> = pattern.chars().collect();
    let k: Vec<char> = key.chars().collect();

    // Iterative matcher with single-star backtracking.
    let (mut pi, mut ki) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ki < k.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == k[ki]) {
            pi += 1;
            ki += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ki));
            pi += 1;
        } else if let Some((sp, sk)) = star {
            pi = sp + 1;
            ki = sk + 1;
            star = Some((sp, sk + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// The literal part of `pattern` before its first wildcard.
///
/// Every key matching the pattern starts with this prefix, so scans can seek
/// straight to it.
pub fn literal_prefix(pattern: &str) -> &str {
    match pattern.find(['*', '?']) {
        Some(pos) => &pattern[..pos],
        None => pattern,
    }
}

fn has_wildcards(s: &str) -> bool {
    s.contains(['*', '?'])
}
