//! Card network detection and display grouping.
//!
//! Classifies a raw digit string into a card network using prefix rules and
//! re-groups it for display (`"4242424242424242"` -> `"4242 4242 4242 4242"`).
//! Only the leading digits are inspected; full PAN validation (Luhn, issuer
//! checks) belongs to the tokenization SDK, not this crate.
//!
//! Grouping is always re-derived from the canonical digit string rather than
//! patched incrementally, so backspacing over a separator or pasting a
//! formatted number cannot desynchronize the display text.

use serde::{Deserialize, Serialize};

/// A recognized card network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardNetwork {
    Amex,
    DinersClub,
    Discover,
    Jcb,
    Mir,
    Mastercard,
    UnionPay,
    Maestro,
    Visa,
    /// No profile matched; formatted with the generic 4-4-4-4 grouping.
    Unknown,
}

/// Static description of one card network's prefix and layout rules.
#[derive(Debug)]
pub struct CardProfile {
    pub network: CardNetwork,
    /// Start-digit patterns: an exact prefix (`"34"`) or an inclusive
    /// numeric range over the leading digits (`"2221-2720"`).
    pub patterns: &'static [&'static str],
    /// Digit counts considered a complete number for this network.
    pub valid_lengths: &'static [usize],
    /// Display grouping per exact total length; lengths not listed fall back
    /// to [`DEFAULT_GROUPING`].
    pub groupings: &'static [(usize, &'static [usize])],
}

/// Generic grouping for unknown networks and unlisted lengths.
pub const DEFAULT_GROUPING: &[usize] = &[4, 4, 4, 4, 3];

/// Hard cap on accepted digits regardless of network.
pub const MAX_PAN_DIGITS: usize = 19;

const GROUP_4_6_5: &[usize] = &[4, 6, 5];
const GROUP_4_6_4: &[usize] = &[4, 6, 4];
const GROUP_4_4_5: &[usize] = &[4, 4, 5];

/// Known networks in match-priority order: first pattern hit wins, so more
/// specific prefixes (Discover's `622126-622925`) precede broader ones
/// (`UnionPay`'s `62`).
pub const CARD_PROFILES: &[CardProfile] = &[
    CardProfile {
        network: CardNetwork::Amex,
        patterns: &["34", "37"],
        valid_lengths: &[15],
        groupings: &[(15, GROUP_4_6_5)],
    },
    CardProfile {
        network: CardNetwork::DinersClub,
        patterns: &["300-305", "36", "38-39"],
        valid_lengths: &[14, 16, 19],
        groupings: &[(14, GROUP_4_6_4)],
    },
    CardProfile {
        network: CardNetwork::Discover,
        patterns: &["6011", "622126-622925", "644-649", "65"],
        valid_lengths: &[16, 19],
        groupings: &[],
    },
    CardProfile {
        network: CardNetwork::Jcb,
        patterns: &["3528-3589"],
        valid_lengths: &[16, 17, 18, 19],
        groupings: &[],
    },
    CardProfile {
        network: CardNetwork::Mir,
        patterns: &["2200-2204"],
        valid_lengths: &[16, 17, 18, 19],
        groupings: &[],
    },
    CardProfile {
        network: CardNetwork::Mastercard,
        patterns: &["2221-2720", "51-55"],
        valid_lengths: &[16],
        groupings: &[],
    },
    CardProfile {
        network: CardNetwork::UnionPay,
        patterns: &["62"],
        valid_lengths: &[16, 17, 18, 19],
        groupings: &[(19, &[6, 13])],
    },
    CardProfile {
        network: CardNetwork::Maestro,
        patterns: &["500000-506698", "506779-508999", "56-59", "63", "67"],
        valid_lengths: &[12, 13, 14, 15, 16, 17, 18, 19],
        groupings: &[(13, GROUP_4_4_5), (15, GROUP_4_6_5)],
    },
    CardProfile {
        network: CardNetwork::Visa,
        patterns: &["4"],
        valid_lengths: &[13, 16, 19],
        groupings: &[],
    },
];

/// Fallback profile for digits no pattern claims.
pub static UNKNOWN_PROFILE: CardProfile = CardProfile {
    network: CardNetwork::Unknown,
    patterns: &[],
    valid_lengths: &[12, 13, 14, 15, 16, 17, 18, 19],
    groupings: &[],
};

/// The result of formatting raw card input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedCard {
    /// Digits regrouped with single spaces.
    pub text: String,
    /// Network detected from the leading digits.
    pub network: CardNetwork,
}

/// Keep only ASCII digits from arbitrary typed/pasted text.
#[must_use]
pub fn strip_non_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Does `digits` fall under `pattern`?
///
/// Exact patterns match when either string is a prefix of the other, so a
/// partially typed number already classifies. Range patterns compare the
/// leading digits numerically, truncating the bounds to the typed length.
fn pattern_matches(pattern: &str, digits: &str) -> bool {
    if digits.is_empty() {
        return false;
    }
    match pattern.split_once('-') {
        None => digits.starts_with(pattern) || pattern.starts_with(digits),
        Some((min, max)) => {
            let width = min.len().min(digits.len());
            let (Some(head), Some(min), Some(max)) = (
                digits.get(..width).and_then(|s| s.parse::<u64>().ok()),
                min.get(..width).and_then(|s| s.parse::<u64>().ok()),
                max.get(..width).and_then(|s| s.parse::<u64>().ok()),
            ) else {
                return false;
            };
            (min..=max).contains(&head)
        }
    }
}

/// Classify a digit string into a card profile.
///
/// Scans [`CARD_PROFILES`] in declaration order and returns the first whose
/// pattern matches; unmatched input gets [`UNKNOWN_PROFILE`].
#[must_use]
pub fn detect(digits: &str) -> &'static CardProfile {
    CARD_PROFILES
        .iter()
        .find(|profile| profile.patterns.iter().any(|p| pattern_matches(p, digits)))
        .unwrap_or(&UNKNOWN_PROFILE)
}

impl CardProfile {
    /// Longest complete length this network issues.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.valid_lengths.last().copied().unwrap_or(MAX_PAN_DIGITS)
    }

    /// Whether `len` digits form a complete number for this network.
    #[must_use]
    pub fn is_valid_length(&self, len: usize) -> bool {
        self.valid_lengths.contains(&len)
    }

    /// Display grouping for a number of exactly `len` digits.
    #[must_use]
    pub fn grouping_for(&self, len: usize) -> &'static [usize] {
        self.groupings
            .iter()
            .find(|(l, _)| *l == len)
            .map_or(DEFAULT_GROUPING, |(_, groups)| groups)
    }
}

/// Re-format arbitrary card input for display.
///
/// Strips non-digits, truncates to the detected network's maximum length and
/// regroups with spaces. Call on every keystroke with the full field text.
#[must_use]
pub fn format(raw: &str) -> FormattedCard {
    let mut digits = strip_non_digits(raw);
    let profile = detect(&digits);
    digits.truncate(profile.max_length().min(MAX_PAN_DIGITS));

    let groups = profile.grouping_for(digits.len());
    let mut text = String::with_capacity(digits.len() + groups.len());
    let mut rest = digits.as_str();
    for &size in groups {
        if rest.is_empty() {
            break;
        }
        let take = size.min(rest.len());
        if !text.is_empty() {
            text.push(' ');
        }
        let (group, tail) = rest.split_at(take);
        text.push_str(group);
        rest = tail;
    }
    // Digits beyond the declared groups (partial input on a short grouping)
    // trail in one final group.
    if !rest.is_empty() {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(rest);
    }

    FormattedCard {
        text,
        network: profile.network,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_major_networks() {
        assert_eq!(detect("4242424242424242").network, CardNetwork::Visa);
        assert_eq!(detect("5555555555554444").network, CardNetwork::Mastercard);
        assert_eq!(detect("2221000000000009").network, CardNetwork::Mastercard);
        assert_eq!(detect("378282246310005").network, CardNetwork::Amex);
        assert_eq!(detect("6011111111111117").network, CardNetwork::Discover);
        assert_eq!(detect("3530111333300000").network, CardNetwork::Jcb);
        assert_eq!(detect("30569309025904").network, CardNetwork::DinersClub);
        assert_eq!(detect("6200000000000005").network, CardNetwork::UnionPay);
        assert_eq!(detect("2200123456789012").network, CardNetwork::Mir);
        assert_eq!(detect("5018000000000000").network, CardNetwork::Maestro);
    }

    #[test]
    fn test_detect_specific_range_beats_broad_prefix() {
        // 622126-622925 is Discover even though 62 alone is UnionPay
        assert_eq!(detect("6221260000000000").network, CardNetwork::Discover);
        assert_eq!(detect("6220000000000000").network, CardNetwork::UnionPay);
    }

    #[test]
    fn test_detect_partial_input() {
        assert_eq!(detect("4").network, CardNetwork::Visa);
        assert_eq!(detect("55").network, CardNetwork::Mastercard);
        assert_eq!(detect("22").network, CardNetwork::Mir);
        assert_eq!(detect("9").network, CardNetwork::Unknown);
    }

    #[test]
    fn test_unknown_fallback() {
        let profile = detect("9999999999999999");
        assert_eq!(profile.network, CardNetwork::Unknown);
        assert_eq!(profile.max_length(), MAX_PAN_DIGITS);
    }

    #[test]
    fn test_format_visa_grouping() {
        let formatted = format("4242424242424242");
        assert_eq!(formatted.text, "4242 4242 4242 4242");
        assert_eq!(formatted.network, CardNetwork::Visa);
    }

    #[test]
    fn test_format_amex_grouping() {
        let formatted = format("378282246310005");
        assert_eq!(formatted.text, "3782 822463 10005");
        assert_eq!(formatted.network, CardNetwork::Amex);
    }

    #[test]
    fn test_format_diners_14() {
        assert_eq!(format("30569309025904").text, "3056 930902 5904");
    }

    #[test]
    fn test_format_unionpay_19() {
        assert_eq!(format("6212345678901234567").text, "621234 5678901234567");
    }

    #[test]
    fn test_format_strips_pasted_noise() {
        let formatted = format("4242-4242 4242.4242");
        assert_eq!(formatted.text, "4242 4242 4242 4242");
    }

    #[test]
    fn test_format_truncates_overflow() {
        // Amex caps at 15 digits; extras from a sloppy paste are dropped
        let formatted = format("3782822463100051234");
        assert_eq!(formatted.text, "3782 822463 10005");
    }

    #[test]
    fn test_format_idempotent() {
        for raw in [
            "4242424242424242",
            "378282246310005",
            "30569309025904",
            "6212345678901234567",
            "4242 42",
            "99999",
        ] {
            let once = format(raw);
            let twice = format(&once.text);
            assert_eq!(once, twice, "format not idempotent for {raw}");
        }
    }

    #[test]
    fn test_detected_network_accepts_input_length() {
        // Complete test numbers must land on a declared valid length
        for number in [
            "4242424242424242",
            "378282246310005",
            "5555555555554444",
            "30569309025904",
            "6011111111111117",
        ] {
            let profile = detect(number);
            assert!(
                profile.is_valid_length(number.len()),
                "{number} rejected by {:?}",
                profile.network
            );
        }
    }

    #[test]
    fn test_backspace_regroups_from_digits() {
        // User deletes the trailing digit of "4242 4242 4" -> field text
        // "4242 4242 " regroups to "4242 4242"
        assert_eq!(format("4242 4242 ").text, "4242 4242");
    }
}
