//! Session layer in front of the hosted authentication provider.
//!
//! The provider answers "who is signed in"; `SessionService` turns that into
//! an [`Actor`] by reading the role from the user's profile row.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{Actor, AuthError, LoginRecord, NewRegistration, RegistrationPolicy, User};
use crate::db::{DbError, UserRepository};
use crate::error::{TriageError, TriageResult};

/// Identity reported by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
}

impl AuthenticatedUser {
    pub fn new(id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }
}

/// Hosted authentication provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Returns the signed-in user, or `None` if nobody is signed in.
    async fn current_user(&self) -> Result<Option<AuthenticatedUser>, AuthError>;

    /// Ends the current session.
    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Provider holding a fixed session, for the CLI and tests.
#[derive(Default)]
pub struct StaticAuthProvider {
    user: RwLock<Option<AuthenticatedUser>>,
}

impl StaticAuthProvider {
    /// Creates a provider with nobody signed in.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider with `user` signed in.
    pub fn signed_in(user: AuthenticatedUser) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    /// Replaces the current session.
    pub async fn set_user(&self, user: Option<AuthenticatedUser>) {
        *self.user.write().await = user;
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn current_user(&self) -> Result<Option<AuthenticatedUser>, AuthError> {
        Ok(self.user.read().await.clone())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.user.write().await = None;
        Ok(())
    }
}

/// Resolves sessions into actors and manages profiles.
#[derive(Clone)]
pub struct SessionService {
    auth: Arc<dyn AuthProvider>,
    users: Arc<dyn UserRepository>,
    policy: RegistrationPolicy,
}

impl SessionService {
    pub fn new(auth: Arc<dyn AuthProvider>, users: Arc<dyn UserRepository>) -> Self {
        Self {
            auth,
            users,
            policy: RegistrationPolicy::default(),
        }
    }

    /// Replaces the registration policy.
    pub fn with_policy(mut self, policy: RegistrationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the profile of the signed-in user.
    pub async fn current_user(&self) -> TriageResult<User> {
        let session = self.auth.current_user().await?.ok_or(AuthError::NotSignedIn)?;
        let user = self
            .users
            .get(session.id)
            .await?
            .ok_or(AuthError::ProfileMissing(session.id))?;
        Ok(user)
    }

    /// Returns the actor for the signed-in user.
    pub async fn current_actor(&self) -> TriageResult<Actor> {
        Ok(self.current_user().await?.actor())
    }

    /// Completes a sign-in by resolving the profile and logging the login.
    ///
    /// A failed login-log write is logged and does not fail the sign-in.
    #[instrument(skip(self))]
    pub async fn sign_in(&self) -> TriageResult<User> {
        let user = self.current_user().await?;

        let record = LoginRecord::new(user.id, user.email.clone(), user.role);
        if let Err(e) = self.users.record_login(&record).await {
            warn!(user_id = %user.id, error = %e, "Failed to record login");
        }
        info!(user_id = %user.id, role = %user.role, "User signed in");

        Ok(user)
    }

    pub async fn sign_out(&self) -> TriageResult<()> {
        self.auth.sign_out().await?;
        Ok(())
    }

    /// Creates the profile for a freshly created provider account.
    #[instrument(skip(self, request))]
    pub async fn register_profile(
        &self,
        account_id: Uuid,
        request: &NewRegistration,
    ) -> TriageResult<User> {
        let user = self
            .policy
            .validate(account_id, request)
            .map_err(|e| TriageError::validation(e.to_string()))?;

        match self.users.create(&user).await {
            Ok(user) => {
                info!(user_id = %user.id, role = %user.role, "Profile registered");
                Ok(user)
            }
            Err(DbError::Constraint(_)) => Err(TriageError::validation(format!(
                "email {} is already registered",
                user.email
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::db::mocks::MockUserRepository;

    fn service_with(
        session: Option<AuthenticatedUser>,
        users: Vec<User>,
    ) -> (SessionService, Arc<MockUserRepository>) {
        let auth = Arc::new(match session {
            Some(user) => StaticAuthProvider::signed_in(user),
            None => StaticAuthProvider::new(),
        });
        let repo = Arc::new(MockUserRepository::with_users(users));
        (SessionService::new(auth, repo.clone()), repo)
    }

    fn admin_profile() -> User {
        RegistrationPolicy::default()
            .validate(
                Uuid::new_v4(),
                &NewRegistration::new("it@nbsc.edu.ph", "IT Desk", "admin"),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_current_actor_resolves_role_from_profile() {
        let profile = admin_profile();
        let (service, _) = service_with(
            Some(AuthenticatedUser::new(profile.id, &profile.email)),
            vec![profile.clone()],
        );

        let actor = service.current_actor().await.unwrap();
        assert_eq!(actor, Actor::admin(profile.id));
    }

    #[tokio::test]
    async fn test_not_signed_in() {
        let (service, _) = service_with(None, vec![]);
        assert!(matches!(
            service.current_actor().await,
            Err(TriageError::Auth(AuthError::NotSignedIn))
        ));
    }

    #[tokio::test]
    async fn test_profile_missing() {
        let id = Uuid::new_v4();
        let (service, _) = service_with(Some(AuthenticatedUser::new(id, "a@b.com")), vec![]);
        assert!(matches!(
            service.current_actor().await,
            Err(TriageError::Auth(AuthError::ProfileMissing(missing))) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_sign_in_records_login_and_sign_out_clears_session() {
        let profile = admin_profile();
        let (service, repo) = service_with(
            Some(AuthenticatedUser::new(profile.id, &profile.email)),
            vec![profile.clone()],
        );

        service.sign_in().await.unwrap();
        let logins = repo.logins().await;
        assert_eq!(logins.len(), 1);
        assert_eq!(logins[0].user_id, profile.id);
        assert_eq!(logins[0].role, Role::Admin);

        service.sign_out().await.unwrap();
        assert!(service.current_actor().await.is_err());
    }

    #[tokio::test]
    async fn test_register_profile() {
        let (service, repo) = service_with(None, vec![]);
        let id = Uuid::new_v4();

        let user = service
            .register_profile(id, &NewRegistration::new("r@gmail.com", "Reporter", "user"))
            .await
            .unwrap();
        assert_eq!(user.role, Role::Reporter);
        assert_eq!(repo.snapshot().await.len(), 1);

        let duplicate = service
            .register_profile(
                Uuid::new_v4(),
                &NewRegistration::new("R@gmail.com", "Other", "user"),
            )
            .await;
        assert!(matches!(duplicate, Err(TriageError::Validation(_))));

        let bad_admin = service
            .register_profile(
                Uuid::new_v4(),
                &NewRegistration::new("x@gmail.com", "X", "admin"),
            )
            .await;
        assert!(matches!(bad_admin, Err(TriageError::Validation(_))));
    }
}
