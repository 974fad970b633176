//! Identifier utilities shared by the synthesis passes
//!
//! Generated names must be stable and collision free, so everything that turns
//! a design name into an identifier goes through this module.

use std::collections::HashMap;

/// Initialisms kept fully upper-cased by [`goify`].
const ACRONYMS: &[&str] = &[
    "ACL", "API", "ASCII", "CPU", "CSS", "DNS", "EOF", "GUID", "HTML", "HTTP", "HTTPS", "ID",
    "IP", "JMES", "JSON", "JWT", "LHS", "OK", "QPS", "RAM", "RHS", "RPC", "SLA", "SMTP", "SQL",
    "SSH", "TCP", "TLS", "TTL", "UDP", "UI", "UID", "UUID", "URI", "URL", "UTF8", "VM", "XML",
    "XMPP", "XSRF", "XSS",
];

/// Splits a design name into words.
///
/// Words break on any non-alphanumeric character, on lower-to-upper case
/// transitions and before the last capital of an upper-case run that is
/// followed by a lower-case letter (`HTTPResponse` is `HTTP`, `Response`).
fn split_words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &ch) in chars.iter().enumerate() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if ch.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Converts a design name into an exported (`first_upper`) or unexported
/// identifier, keeping common initialisms upper-cased.
///
/// # Examples
/// ```
/// use wirecodegen::core::utils::goify;
///
/// assert_eq!(goify("show_by_id", true), "ShowByID");
/// assert_eq!(goify("account id", false), "accountID");
/// assert_eq!(goify("Not Found", true), "NotFound");
/// ```
pub fn goify(s: &str, first_upper: bool) -> String {
    let words = split_words(s);
    if words.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(s.len());
    for (i, word) in words.iter().enumerate() {
        let upper = word.to_uppercase();
        let lower = word.to_lowercase();
        if i == 0 && !first_upper {
            out.push_str(&lower);
        } else if ACRONYMS.contains(&upper.as_str()) {
            out.push_str(&upper);
        } else {
            let mut chars = lower.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }

    // identifiers cannot start with a digit
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Returns the canonical MIME header form of `name` (`x-request-id` becomes
/// `X-Request-Id`). Names containing characters outside the token set are
/// returned unchanged.
pub fn canonical_header_key(name: &str) -> String {
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c));
    if !valid {
        return name.to_string();
    }

    let mut upper_next = true;
    name.chars()
        .map(|c| {
            let mapped = if upper_next {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper_next = c == '-';
            mapped
        })
        .collect()
}

/// Hands out identifiers that are unique within one scope.
#[derive(Debug, Default, Clone)]
pub struct NameScope {
    counts: HashMap<String, usize>,
}

impl NameScope {
    /// Create an empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `name` the first time it is requested, then `name1`, `name2`...
    pub fn unique(&mut self, name: &str) -> String {
        let mut candidate = name.to_string();
        while let Some(count) = self.counts.get_mut(&candidate) {
            *count += 1;
            candidate = format!("{name}{count}");
        }
        self.counts.insert(candidate.clone(), 0);
        candidate
    }
}
