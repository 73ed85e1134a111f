//! Authentication and authorization types for Triage Desk.
//!
//! This module provides:
//! - The two-role model (`Reporter`, `Admin`) and its capability check
//! - The `Actor` carried into every engine operation
//! - User profiles as stored in the `users` table
//! - The session layer in front of the hosted authentication provider
//! - The registration policy applied when a profile is created

pub mod registration;
pub mod session;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub use registration::{NewRegistration, RegistrationError, RegistrationPolicy};
pub use session::{AuthProvider, AuthenticatedUser, SessionService, StaticAuthProvider};

/// User roles.
///
/// The store keeps the reporter role as the string `"user"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Files incidents and feedback on their own incidents.
    #[serde(rename = "user")]
    Reporter,
    /// Triages incidents, manages BIA reports and answers feedback.
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    /// Returns true if the role may perform administrative mutations.
    pub fn can_administer(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Returns the role as stored in the database.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Role::Reporter => "user",
            Role::Admin => "admin",
        }
    }

    /// Parses a stored role string, ignoring case and surrounding whitespace.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" | "reporter" => Some(Role::Reporter),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_db_str(s).ok_or_else(|| format!("Invalid role: {}. Use 'user' or 'admin'", s))
    }
}

/// The identity on whose behalf an engine operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// User id.
    pub id: Uuid,
    /// Role claim supplied by the authentication collaborator.
    pub role: Role,
}

impl Actor {
    /// Creates an actor.
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    /// Creates a reporter actor.
    pub fn reporter(id: Uuid) -> Self {
        Self::new(id, Role::Reporter)
    }

    /// Creates an admin actor.
    pub fn admin(id: Uuid) -> Self {
        Self::new(id, Role::Admin)
    }

    /// Returns true if the actor may perform administrative mutations.
    pub fn can_administer(&self) -> bool {
        self.role.can_administer()
    }

    /// Returns the actor identity string used in logs and errors.
    pub fn identity(&self) -> String {
        format!("{}:{}", self.role, self.id)
    }
}

/// A user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Id shared with the authentication provider.
    pub id: Uuid,
    /// Email address.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Role.
    pub role: Role,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Returns the actor for this user.
    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }
}

/// A recorded sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub logged_in_at: DateTime<Utc>,
}

impl LoginRecord {
    /// Creates a login record stamped now.
    pub fn new(user_id: Uuid, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            email: email.into(),
            role,
            logged_in_at: Utc::now(),
        }
    }
}

/// Errors raised by the authentication collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No user is signed in.
    #[error("No user is signed in")]
    NotSignedIn,

    /// The signed-in user has no profile row.
    #[error("No profile found for user {0}")]
    ProfileMissing(Uuid),

    /// The provider itself failed.
    #[error("Authentication provider error: {0}")]
    Provider(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_capabilities() {
        assert!(Role::Admin.can_administer());
        assert!(!Role::Reporter.can_administer());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from_db_str(" Admin "), Some(Role::Admin));
        assert_eq!(Role::from_db_str("user"), Some(Role::Reporter));
        assert_eq!(Role::from_db_str("administrator"), None);
        assert_eq!(Role::Reporter.as_db_str(), "user");
    }

    #[test]
    fn test_role_serde_uses_store_strings() {
        assert_eq!(serde_json::to_string(&Role::Reporter).unwrap(), "\"user\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_actor_identity() {
        let id = Uuid::new_v4();
        let actor = Actor::admin(id);
        assert!(actor.can_administer());
        assert_eq!(actor.identity(), format!("admin:{}", id));
    }
}
