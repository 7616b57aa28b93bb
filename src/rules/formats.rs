//! Fixed textual grammars for the format rules.
//!
//! The same pattern strings are embedded into generated Go (RE2 syntax), so
//! the in-process validator and the emitted one agree on every input.
use std::net::{Ipv4Addr, Ipv6Addr};

use once_cell::sync::Lazy;
use regex::Regex;

pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$";

/// Canonical 8-4-4-4-12 form only: no braces, no `urn:uuid:`, no compact form.
pub const UUID_PATTERN: &str =
    r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$";

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern"));
static UUID: Lazy<Regex> = Lazy::new(|| Regex::new(UUID_PATTERN).expect("uuid pattern"));

pub fn is_email(s: &str) -> bool {
    EMAIL.is_match(s)
}

pub fn is_uuid(s: &str) -> bool {
    UUID.is_match(s)
}

/// Dotted quad, each octet 0-255 without leading zeros.
pub fn is_ipv4(s: &str) -> bool {
    s.parse::<Ipv4Addr>().is_ok()
}

/// RFC 4291 text forms, `::` compression and embedded IPv4 tails included;
/// zone suffixes (`%eth0`) are rejected.
pub fn is_ipv6(s: &str) -> bool {
    s.parse::<Ipv6Addr>().is_ok()
}
