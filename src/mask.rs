//! Mask compilation — literal templates with one placeholder token.
//!
//! A mask is user-entered literal text containing at most one placeholder:
//! `{entry_id}` (order-id masks, matches a digit run) or `{value}`
//! (extra-field masks, matches any non-empty run within a line). The
//! literal portion is regex-escaped before the placeholder is substituted,
//! so user text can never change the pattern's meaning.

use regex::Regex;

/// Order-id placeholder — captures digits only.
const ENTRY_ID_TOKEN: &str = "{entry_id}";

/// Extra-field placeholder — captures any non-empty run within a line.
const VALUE_TOKEN: &str = "{value}";

/// A compiled mask: the raw template, its literal prefix, and the
/// case-insensitive regex with one named capturing group.
#[derive(Debug, Clone)]
pub struct CompiledMask {
    /// Template as entered (trimmed).
    pub raw: String,
    /// Literal text before the placeholder (or before a `*`), trimmed.
    pub literal_prefix: String,
    /// Compiled pattern. Unanchored; matching is substring semantics.
    pub regex: Regex,
    group: &'static str,
}

impl CompiledMask {
    /// Run the mask against `text` and return the captured group.
    pub fn capture(&self, text: &str) -> Option<String> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.name(self.group))
            .map(|m| m.as_str().to_string())
    }

    /// Whether the mask matches `text` at all.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Compile an order-id mask. `{entry_id}` becomes a digit-capturing
/// group. An empty (or whitespace-only) template disables extraction
/// and compiles to `None` — that is not an error.
pub fn compile_entry_id_mask(template: &str) -> Option<CompiledMask> {
    compile(template, ENTRY_ID_TOKEN, r"(?P<entry_id>\d+)", "entry_id")
}

/// Compile an extra-field mask. `{value}` becomes an unconstrained
/// non-empty capturing group, bounded to one line.
pub fn compile_value_mask(template: &str) -> Option<CompiledMask> {
    compile(template, VALUE_TOKEN, r"(?P<value>.+)", "value")
}

fn compile(
    template: &str,
    token: &str,
    replacement: &str,
    group: &'static str,
) -> Option<CompiledMask> {
    let raw = template.trim();
    if raw.is_empty() {
        return None;
    }

    let mut prefix = raw;
    if let Some(p) = prefix.find(token) {
        prefix = &prefix[..p];
    }
    if let Some(p) = prefix.find('*') {
        prefix = &prefix[..p];
    }
    let literal_prefix = prefix.trim().to_string();

    // Escape first, then substitute the (escaped) placeholder. Only the
    // first occurrence is honored — a mask carries at most one token.
    let escaped_token = regex::escape(token);
    let pattern = regex::escape(raw).replacen(&escaped_token, replacement, 1);

    // The pattern is built from escaped literal text plus a fixed group,
    // so compilation can only fail on pathological sizes.
    let regex = Regex::new(&format!("(?i){pattern}")).ok()?;

    Some(CompiledMask {
        raw: raw.to_string(),
        literal_prefix,
        regex,
        group,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_template_disables_extraction() {
        assert!(compile_entry_id_mask("").is_none());
        assert!(compile_entry_id_mask("   ").is_none());
        assert!(compile_value_mask("").is_none());
    }

    #[test]
    fn digit_round_trip() {
        // Substituting digits for the placeholder and capturing recovers
        // exactly those digits.
        let mask = compile_entry_id_mask("order-{entry_id}").unwrap();
        assert_eq!(mask.capture("order-4821").as_deref(), Some("4821"));
        assert_eq!(
            mask.capture("Your order-0012345 has shipped").as_deref(),
            Some("0012345")
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        let mask = compile_entry_id_mask("Order #{entry_id}").unwrap();
        assert_eq!(mask.capture("ORDER #77").as_deref(), Some("77"));
    }

    #[test]
    fn literal_metacharacters_are_escaped() {
        let mask = compile_entry_id_mask("inv. ({entry_id})").unwrap();
        assert_eq!(mask.capture("inv. (42)").as_deref(), Some("42"));
        // The dot is literal, not a wildcard.
        assert!(mask.capture("invX (42)").is_none());
    }

    #[test]
    fn digits_only_for_entry_id() {
        let mask = compile_entry_id_mask("ref {entry_id}").unwrap();
        assert!(mask.capture("ref abc").is_none());
        assert_eq!(mask.capture("ref 9").as_deref(), Some("9"));
    }

    #[test]
    fn literal_prefix_stops_at_placeholder() {
        let mask = compile_entry_id_mask("order-{entry_id} confirmed").unwrap();
        assert_eq!(mask.literal_prefix, "order-");
    }

    #[test]
    fn literal_prefix_stops_at_star() {
        let mask = compile_entry_id_mask("ticket *{entry_id}").unwrap();
        assert_eq!(mask.literal_prefix, "ticket");
    }

    #[test]
    fn template_without_placeholder_is_a_literal_gate() {
        let mask = compile_entry_id_mask("no token here").unwrap();
        assert!(mask.is_match("subject with no token here inside"));
        assert!(mask.capture("no token here").is_none());
    }

    #[test]
    fn value_mask_captures_to_end_of_line() {
        let mask = compile_value_mask("Tracking: {value}").unwrap();
        assert_eq!(
            mask.capture("Tracking: 1Z999AA10123456784\nCarrier: UPS")
                .as_deref(),
            Some("1Z999AA10123456784")
        );
    }

    #[test]
    fn value_mask_requires_nonempty_capture() {
        let mask = compile_value_mask("Tracking: {value}").unwrap();
        assert!(mask.capture("Tracking: ").is_none());
    }

    #[test]
    fn only_first_placeholder_is_substituted() {
        let mask = compile_entry_id_mask("{entry_id}-{entry_id}").unwrap();
        assert_eq!(mask.capture("12-{entry_id}").as_deref(), Some("12"));
    }
}
