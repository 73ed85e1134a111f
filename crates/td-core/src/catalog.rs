//! Static recommendation catalog.
//!
//! Maps an incident type to the operational and managerial remediation text
//! offered when drafting a BIA report, and to the canned solutions an
//! administrator can send back to the reporter.

use serde::{Deserialize, Serialize};

/// Incident-type labels offered to reporters.
pub const INCIDENT_TYPES: [&str; 5] = [
    "Unauthorized Access",
    "Data Breach",
    "Phishing Attempt",
    "Malware Infection",
    "Lost Device",
];

/// Remediation text for one incident type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Operational (technical) remediation steps.
    pub operational: &'static [&'static str],
    /// Managerial (process and policy) remediation steps.
    pub managerial: &'static [&'static str],
    /// Canned solutions shown to the reporter.
    pub user_solutions: &'static [&'static str],
}

/// Recommendations offered on the BIA report form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendations {
    pub operational: Vec<String>,
    pub managerial: Vec<String>,
}

impl Recommendations {
    /// Returns true if the catalog had nothing for the requested type.
    pub fn is_empty(&self) -> bool {
        self.operational.is_empty() && self.managerial.is_empty()
    }
}

static UNAUTHORIZED_ACCESS: CatalogEntry = CatalogEntry {
    operational: &[
        "Disable the compromised account and revoke active sessions.",
        "Reset credentials for affected users.",
        "Review access logs for lateral movement.",
    ],
    managerial: &[
        "Enforce multi-factor authentication for all staff.",
        "Review role-based access control assignments quarterly.",
        "Update the access control policy.",
    ],
    user_solutions: &[
        "Change your password immediately and enable multi-factor authentication.",
        "Review your recent account activity and report anything unfamiliar.",
    ],
};

static DATA_BREACH: CatalogEntry = CatalogEntry {
    operational: &[
        "Isolate affected systems.",
        "Preserve logs and forensic evidence.",
        "Identify and contain the exfiltration path.",
    ],
    managerial: &[
        "Strengthen data encryption practices.",
        "Notify affected parties and regulators as required.",
        "Review data retention and classification policies.",
    ],
    user_solutions: &[
        "Change passwords for any accounts that may share the exposed credentials.",
        "Watch for suspicious messages referencing the exposed data.",
    ],
};

static PHISHING_ATTEMPT: CatalogEntry = CatalogEntry {
    operational: &[
        "Block the sender domain at the mail gateway.",
        "Purge the message from all mailboxes.",
        "Reset credentials for users who clicked the link.",
    ],
    managerial: &[
        "Run phishing awareness training.",
        "Schedule periodic phishing simulations.",
        "Publish a clear procedure for reporting suspicious email.",
    ],
    user_solutions: &[
        "Do not click links or open attachments from the message. Delete it.",
        "If you entered your password, change it now.",
    ],
};

static MALWARE_INFECTION: CatalogEntry = CatalogEntry {
    operational: &[
        "Disconnect the infected host from the network.",
        "Run a full endpoint scan and remove the malware.",
        "Reimage the host if persistence is confirmed.",
    ],
    managerial: &[
        "Keep endpoint protection signatures and patches current.",
        "Restrict installation of unapproved software.",
        "Review backup and recovery procedures.",
    ],
    user_solutions: &[
        "Disconnect your device from the network and do not use it until IT clears it.",
        "Run a full antivirus scan.",
    ],
};

static LOST_DEVICE: CatalogEntry = CatalogEntry {
    operational: &[
        "Remotely lock or wipe the device.",
        "Revoke sessions and tokens issued to the device.",
        "Rotate credentials stored on the device.",
    ],
    managerial: &[
        "Require full-disk encryption on portable devices.",
        "Maintain an inventory of issued devices.",
        "Update the acceptable use policy for portable devices.",
    ],
    user_solutions: &[
        "Report the loss to IT and change your passwords.",
        "File a report with local authorities if the device was stolen.",
    ],
};

/// Normalizes an incident-type label into a catalog key.
pub fn catalog_key(incident_type: &str) -> String {
    incident_type.trim().to_lowercase()
}

/// Looks up the catalog entry for an incident type.
pub fn lookup(incident_type: &str) -> Option<&'static CatalogEntry> {
    match catalog_key(incident_type).as_str() {
        "unauthorized access" => Some(&UNAUTHORIZED_ACCESS),
        "data breach" => Some(&DATA_BREACH),
        "phishing attempt" => Some(&PHISHING_ATTEMPT),
        "malware infection" => Some(&MALWARE_INFECTION),
        "lost device" => Some(&LOST_DEVICE),
        _ => None,
    }
}

/// Returns BIA recommendations for an incident type, empty if unknown.
pub fn recommendations_for(incident_type: &str) -> Recommendations {
    lookup(incident_type)
        .map(|entry| Recommendations {
            operational: owned_strings(entry.operational),
            managerial: owned_strings(entry.managerial),
        })
        .unwrap_or_default()
}

/// Returns the canned reporter-facing solutions for an incident type.
pub fn user_solutions_for(incident_type: &str) -> Vec<String> {
    lookup(incident_type)
        .map(|entry| owned_strings(entry.user_solutions))
        .unwrap_or_default()
}

fn owned_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_offered_type_has_an_entry() {
        for incident_type in INCIDENT_TYPES {
            let entry = lookup(incident_type).unwrap();
            assert!(!entry.operational.is_empty());
            assert!(!entry.managerial.is_empty());
            assert!(!entry.user_solutions.is_empty());
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_trimmed() {
        let recs = recommendations_for("  DATA breach ");
        assert_eq!(recs.operational[0], "Isolate affected systems.");
        assert_eq!(recs.managerial[0], "Strengthen data encryption practices.");
    }

    #[test]
    fn test_unknown_type_is_empty() {
        assert!(recommendations_for("Printer Jam").is_empty());
        assert!(user_solutions_for("").is_empty());
    }

    #[test]
    fn test_order_is_preserved() {
        let recs = recommendations_for("Lost Device");
        assert_eq!(
            recs.operational,
            vec![
                "Remotely lock or wipe the device.",
                "Revoke sessions and tokens issued to the device.",
                "Rotate credentials stored on the device.",
            ]
        );
    }
}
