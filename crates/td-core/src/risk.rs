//! Keyword-based risk classification.
//!
//! Incidents whose risk tier has not been set by an administrator are shown
//! with a tier derived from their description. The derived tier is never
//! persisted.

use crate::incident::RiskLevel;

/// Keywords that classify an incident as high risk.
pub const HIGH_RISK_KEYWORDS: &[&str] = &["breach", "unauthorized", "ransomware"];

/// Keywords that classify an incident as medium risk.
pub const MEDIUM_RISK_KEYWORDS: &[&str] = &["phishing", "malware"];

/// Derives a risk tier from free-text description.
///
/// Matching is a case-insensitive substring search. High-risk keywords are
/// checked before medium-risk ones; anything else is `Low`.
pub fn classify(description: &str) -> RiskLevel {
    let text = description.to_lowercase();

    if contains_any(&text, HIGH_RISK_KEYWORDS) {
        RiskLevel::High
    } else if contains_any(&text, MEDIUM_RISK_KEYWORDS) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_keywords() {
        assert_eq!(classify("Possible data BREACH on HR share"), RiskLevel::High);
        assert_eq!(classify("unauthorized login from abroad"), RiskLevel::High);
        assert_eq!(classify("Ransomware note on desktop"), RiskLevel::High);
    }

    #[test]
    fn test_high_takes_precedence_over_medium() {
        assert_eq!(
            classify("phishing email led to unauthorized access"),
            RiskLevel::High
        );
        assert_eq!(classify("malware dropped ransomware"), RiskLevel::High);
    }

    #[test]
    fn test_medium_keywords() {
        assert_eq!(classify("Phishing link in newsletter"), RiskLevel::Medium);
        assert_eq!(classify("antivirus flagged MALWARE"), RiskLevel::Medium);
    }

    #[test]
    fn test_default_low() {
        assert_eq!(classify("suspicious email"), RiskLevel::Low);
        assert_eq!(classify(""), RiskLevel::Low);
    }

    #[test]
    fn test_substring_match() {
        // "breached" still contains "breach"
        assert_eq!(classify("account was breached"), RiskLevel::High);
    }
}
