//! Family / ControlID extraction from free-text chat messages.
//!
//! Recognizes `Family: AC` and `ControlID: 2` (or the short `ID: 2`) in any
//! label case. Pure string parsing; no I/O.

use std::sync::LazyLock;

use controlqa_shared::ControlIdentifier;
use regex::Regex;

/// What a message says about which control it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Both family and control id were found.
    Resolved(ControlIdentifier),
    /// Exactly one of the two was found.
    Partial {
        family: Option<String>,
        control_id: Option<String>,
    },
    /// Neither was found.
    Unresolved,
}

/// Extract a `(Family, ControlID)` pair from `message`.
pub fn extract(message: &str) -> Extraction {
    match (extract_family(message), extract_control_id(message)) {
        (Some(family), Some(control_id)) => {
            Extraction::Resolved(ControlIdentifier { family, control_id })
        }
        (None, None) => Extraction::Unresolved,
        (family, control_id) => Extraction::Partial { family, control_id },
    }
}

/// First `family:` label followed by letters, digits, or hyphens.
fn extract_family(message: &str) -> Option<String> {
    static FAMILY_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\bfamily:\s*([a-z0-9-]+)").expect("valid regex")
    });
    FAMILY_RE
        .captures(message)
        .map(|caps| caps[1].to_string())
}

/// First `controlid:` or `id:` label followed by digits.
fn extract_control_id(message: &str) -> Option<String> {
    static CONTROL_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\b(?:controlid|id):\s*(\d+)").expect("valid regex")
    });
    CONTROL_ID_RE
        .captures(message)
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(family: &str, control_id: &str) -> Extraction {
        Extraction::Resolved(ControlIdentifier::new(family, control_id))
    }

    #[test]
    fn label_case_does_not_matter() {
        for message in [
            "Family: AC ControlID: 1",
            "family: AC controlid: 1",
            "FAMILY: AC CONTROLID: 1",
            "Please check Family:AC and ControlId:1 for me",
            "family: AC id: 1",
        ] {
            assert_eq!(extract(message), resolved("AC", "1"), "message: {message}");
        }
    }

    #[test]
    fn value_case_is_preserved() {
        assert_eq!(extract("family: ac ID: 7"), resolved("ac", "7"));
    }

    #[test]
    fn family_accepts_digits_and_hyphens() {
        assert_eq!(extract("Family: PR-AC1 ControlID: 12"), resolved("PR-AC1", "12"));
    }

    #[test]
    fn first_match_wins() {
        assert_eq!(
            extract("Family: AC ControlID: 2, not Family: AU ControlID: 6"),
            resolved("AC", "2")
        );
    }

    #[test]
    fn missing_control_id_is_partial() {
        assert_eq!(
            extract("Family: AC tell me about MFA"),
            Extraction::Partial {
                family: Some("AC".into()),
                control_id: None,
            }
        );
    }

    #[test]
    fn non_numeric_control_id_is_absent() {
        assert_eq!(
            extract("Family: AC ControlID: two"),
            Extraction::Partial {
                family: Some("AC".into()),
                control_id: None,
            }
        );
    }

    #[test]
    fn missing_family_is_partial() {
        assert_eq!(
            extract("What does ControlID: 4 cover?"),
            Extraction::Partial {
                family: None,
                control_id: Some("4".into()),
            }
        );
    }

    #[test]
    fn plain_question_is_unresolved() {
        assert_eq!(extract("What is least privilege?"), Extraction::Unresolved);
        assert_eq!(extract(""), Extraction::Unresolved);
    }

    #[test]
    fn labels_inside_words_do_not_match() {
        assert_eq!(extract("subfamily: AC userid: 5"), Extraction::Unresolved);
    }
}
