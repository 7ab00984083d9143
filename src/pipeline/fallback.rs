//! Deterministic fallback extraction for contact details.
//!
//! Academic pages routinely obfuscate email addresses ("jdoe [at] cs [dot]
//! stanford [dot] edu") to dodge address harvesters. This tier undoes the
//! common obfuscation styles with plain string rules, then validates the
//! result against an address grammar so that prose like "reach me at the
//! office" never turns into a fake address. It never calls the network or
//! the model.

use regex::Regex;

use crate::types::{FieldSet, ProfileContent};

const AT_PATTERNS: [&str; 3] = [r"\[\s*at\s*\]", r"\(\s*at\s*\)", r"\s+at\s+"];
const DOT_PATTERNS: [&str; 4] = [
    r"\[\s*dot\s*\]",
    r"\(\s*dot\s*\)",
    r"\{\s*dot\s*\}",
    r"\s+dot\s+",
];
// "verified email at X" is a domain hint, not an address; stripping the
// phrase leaves a bare domain the grammar rejects, instead of letting the
// " at " rule fabricate "verifiedemail@X".
const LABEL_PREFIXES: [&str; 4] = ["contact info:", "contact:", "email:", "verified email at"];
const LINE_HINTS: [&str; 5] = ["contact", "mail", "@", "[at]", "(at)"];

/// Normalizes one candidate line into a valid email address, if it is one.
///
/// Lowercases, strips a leading contact label, substitutes the obfuscated
/// "at"/"dot" spellings, removes whitespace, then checks the result against
/// an address grammar. Returns `None` for anything that does not survive
/// every step.
pub fn normalize_obfuscated_email(line: &str) -> Option<String> {
    let mut text = line.trim().to_lowercase();

    for prefix in LABEL_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim().to_string();
            break;
        }
    }

    for pattern in AT_PATTERNS {
        text = Regex::new(pattern).unwrap().replace_all(&text, "@").into_owned();
    }
    for pattern in DOT_PATTERNS {
        text = Regex::new(pattern).unwrap().replace_all(&text, ".").into_owned();
    }

    let collapsed: String = text.split_whitespace().collect();

    let grammar = Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").unwrap();
    grammar.is_match(&collapsed).then_some(collapsed)
}

/// Scans profile content for an email address.
///
/// Contact regions are the likeliest carriers and are tried first; the rest
/// of the body is only scanned on lines that hint at contact details, so a
/// page-long biography does not produce false positives.
pub fn scan_for_email(content: &ProfileContent) -> Option<String> {
    for region in &content.contact {
        if let Some(email) = scan_line(region) {
            return Some(email);
        }
    }

    content
        .body
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            LINE_HINTS.iter().any(|hint| lower.contains(hint))
        })
        .find_map(scan_line)
}

/// Runs the fallback tier over one profile. Only the email field can come
/// out of this tier; everything else stays with the structured tier.
pub fn pattern_fields(content: &ProfileContent) -> FieldSet {
    let mut fields = FieldSet::default();
    if let Some(email) = scan_for_email(content) {
        fields.email = Some(email);
    }
    fields
}

/// Tries the whole line first, then falls back to an embedded plain address,
/// so "write to jdoe@cs.edu for preprints" still yields the address.
fn scan_line(line: &str) -> Option<String> {
    if let Some(email) = normalize_obfuscated_email(line) {
        return Some(email);
    }

    let embedded = Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap();
    embedded
        .find(line)
        .map(|found| found.as_str().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_bracketed_obfuscation() {
        assert_eq!(
            normalize_obfuscated_email("jdoe [at] cs [dot] stanford [dot] edu"),
            Some("jdoe@cs.stanford.edu".to_string())
        );
    }

    #[test]
    fn decodes_parenthesized_obfuscation() {
        assert_eq!(
            normalize_obfuscated_email("jane(at)lab(dot)mit(dot)edu"),
            Some("jane@lab.mit.edu".to_string())
        );
    }

    #[test]
    fn decodes_bare_word_obfuscation() {
        assert_eq!(
            normalize_obfuscated_email("smith at example dot org"),
            Some("smith@example.org".to_string())
        );
    }

    #[test]
    fn strips_contact_labels() {
        assert_eq!(
            normalize_obfuscated_email("Email: JDOE [at] CS [dot] EDU"),
            Some("jdoe@cs.edu".to_string())
        );
        assert_eq!(
            normalize_obfuscated_email("Contact info: a@b.edu"),
            Some("a@b.edu".to_string())
        );
    }

    #[test]
    fn rejects_prose_that_mentions_at() {
        assert_eq!(normalize_obfuscated_email("reach me at the office"), None);
        assert_eq!(normalize_obfuscated_email("seminars at noon dot m"), None);
        assert_eq!(normalize_obfuscated_email(""), None);
    }

    #[test]
    fn rejects_addresses_without_a_tld() {
        assert_eq!(normalize_obfuscated_email("user [at] localhost"), None);
    }

    #[test]
    fn verified_email_hints_never_fabricate_an_address() {
        assert_eq!(
            normalize_obfuscated_email("Verified email at cs.stanford.edu"),
            None
        );
        let content = ProfileContent::new(
            "https://example.edu/p",
            "Professor of Chemistry\nVerified email at uni.edu\nHomepage",
        );
        assert_eq!(scan_for_email(&content), None);
    }

    #[test]
    fn finds_embedded_plain_addresses() {
        let content = ProfileContent::new(
            "https://example.edu/p",
            "Biography text.\nFor preprints mail jdoe@cs.edu any time.",
        );
        assert_eq!(scan_for_email(&content), Some("jdoe@cs.edu".to_string()));
    }

    #[test]
    fn contact_regions_win_over_body_lines() {
        let content = ProfileContent::new(
            "https://example.edu/p",
            "Contact\nassistant@dept.edu\nLater in the text: other@body.edu mail line",
        );
        assert_eq!(scan_for_email(&content), Some("assistant@dept.edu".to_string()));
    }

    #[test]
    fn unhinted_prose_is_never_scanned() {
        // Without the hint filter this line would normalize into the fake
        // address "seminarsmeet@noon.sharpinroomfive".
        let content = ProfileContent::new(
            "https://example.edu/p",
            "Seminars meet at noon dot sharp in room five",
        );
        assert_eq!(scan_for_email(&content), None);
    }

    #[test]
    fn pattern_fields_only_carry_email() {
        let content = ProfileContent::new("https://example.edu/p", "Email: a [at] b [dot] edu");
        let fields = pattern_fields(&content);
        assert_eq!(fields.email.as_deref(), Some("a@b.edu"));
        assert!(fields.position.is_none());
        assert!(fields.funding.is_none());
    }

    #[test]
    fn no_email_yields_empty_fields() {
        let content = ProfileContent::new("https://example.edu/p", "Just a biography.");
        assert!(pattern_fields(&content).is_empty());
    }
}
