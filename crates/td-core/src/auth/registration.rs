//! Profile registration policy.
//!
//! The authentication provider owns credentials. This module only decides
//! whether a profile row may be created for a new account.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{Role, User};

/// Default email domain required for administrator accounts.
pub const DEFAULT_ADMIN_EMAIL_DOMAIN: &str = "nbsc.edu.ph";

/// Errors raised when a registration request breaks the policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Invalid role '{0}': expected 'user' or 'admin'")]
    InvalidRole(String),

    #[error("Admin accounts must use an @{domain} email address")]
    AdminDomainRequired { domain: String },
}

/// A registration request as submitted on the sign-up form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRegistration {
    pub email: String,
    pub full_name: String,
    /// Raw role string. Parsed after trimming and lowercasing.
    pub role: String,
}

impl NewRegistration {
    pub fn new(
        email: impl Into<String>,
        full_name: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            full_name: full_name.into(),
            role: role.into(),
        }
    }
}

/// Rules applied before a profile is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationPolicy {
    /// Domain an administrator's email must belong to.
    pub admin_email_domain: String,
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self {
            admin_email_domain: DEFAULT_ADMIN_EMAIL_DOMAIN.to_string(),
        }
    }
}

impl RegistrationPolicy {
    pub fn new(admin_email_domain: impl Into<String>) -> Self {
        Self {
            admin_email_domain: admin_email_domain.into(),
        }
    }

    /// Validates a request and builds the profile for the account `id`.
    pub fn validate(&self, id: Uuid, request: &NewRegistration) -> Result<User, RegistrationError> {
        let full_name = request.full_name.trim();
        if full_name.is_empty() {
            return Err(RegistrationError::MissingField("full name"));
        }

        let email = request.email.trim();
        if email.is_empty() {
            return Err(RegistrationError::MissingField("email"));
        }
        let domain = email_domain(email)
            .ok_or_else(|| RegistrationError::InvalidEmail(email.to_string()))?;

        let role_str = request.role.trim().to_lowercase();
        let role = match role_str.as_str() {
            "user" => Role::Reporter,
            "admin" => Role::Admin,
            _ => return Err(RegistrationError::InvalidRole(request.role.clone())),
        };

        if role == Role::Admin && !domain.eq_ignore_ascii_case(&self.admin_email_domain) {
            return Err(RegistrationError::AdminDomainRequired {
                domain: self.admin_email_domain.clone(),
            });
        }

        Ok(User {
            id,
            email: email.to_string(),
            full_name: full_name.to_string(),
            role,
            created_at: Utc::now(),
        })
    }
}

/// Returns the domain of a plausible email address.
fn email_domain(email: &str) -> Option<&str> {
    let (local, domain) = email.split_once('@')?;
    if local.is_empty()
        || domain.contains('@')
        || email.chars().any(char::is_whitespace)
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return None;
    }
    Some(domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_registration() {
        let policy = RegistrationPolicy::default();
        let id = Uuid::new_v4();
        let user = policy
            .validate(
                id,
                &NewRegistration::new(" jdoe@gmail.com ", " Jane Doe ", " User "),
            )
            .unwrap();

        assert_eq!(user.id, id);
        assert_eq!(user.email, "jdoe@gmail.com");
        assert_eq!(user.full_name, "Jane Doe");
        assert_eq!(user.role, Role::Reporter);
    }

    #[test]
    fn test_admin_requires_domain() {
        let policy = RegistrationPolicy::default();

        let rejected = policy.validate(
            Uuid::new_v4(),
            &NewRegistration::new("it@gmail.com", "IT Desk", "admin"),
        );
        assert_eq!(
            rejected,
            Err(RegistrationError::AdminDomainRequired {
                domain: "nbsc.edu.ph".to_string()
            })
        );

        let accepted = policy
            .validate(
                Uuid::new_v4(),
                &NewRegistration::new("it@NBSC.edu.ph", "IT Desk", "ADMIN"),
            )
            .unwrap();
        assert_eq!(accepted.role, Role::Admin);
    }

    #[test]
    fn test_custom_admin_domain() {
        let policy = RegistrationPolicy::new("example.org");
        assert!(policy
            .validate(
                Uuid::new_v4(),
                &NewRegistration::new("sec@example.org", "Sec", "admin")
            )
            .is_ok());
    }

    #[test]
    fn test_rejects_bad_input() {
        let policy = RegistrationPolicy::default();
        let id = Uuid::new_v4();

        assert_eq!(
            policy.validate(id, &NewRegistration::new("a@b.com", "  ", "user")),
            Err(RegistrationError::MissingField("full name"))
        );
        assert_eq!(
            policy.validate(id, &NewRegistration::new("", "A", "user")),
            Err(RegistrationError::MissingField("email"))
        );
        assert!(matches!(
            policy.validate(id, &NewRegistration::new("not-an-email", "A", "user")),
            Err(RegistrationError::InvalidEmail(_))
        ));
        assert!(matches!(
            policy.validate(id, &NewRegistration::new("a@b.com", "A", "superuser")),
            Err(RegistrationError::InvalidRole(_))
        ));
    }
}
