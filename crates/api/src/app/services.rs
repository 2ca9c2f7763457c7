//! Infrastructure wiring: stores, token service, hashing, payments.
//!
//! Everything a handler needs hangs off [`AppServices`], which the router
//! shares as `Extension<Arc<AppServices>>`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use lms_auth::{
    AuthError, CredentialHasher, Hs256TokenService, IssuedToken, NewUser, Role, TokenService, User,
    ensure_issued_after_password_change, user::normalize_email,
};
use lms_infra::{
    ContentStore, EnrollmentStore, InMemoryStore, OwnershipResolver, PostgresStore, QuizStore,
    StoreError, UserStore,
};
use lms_payments::{OfflineGateway, PaymentGateway, StripeGateway, WebhookVerifier};

use crate::app::errors::{ApiError, ApiResult};
use crate::config::Settings;
use crate::context::PrincipalContext;

/// A backend implementing every store contract.
pub trait LmsStore: UserStore + ContentStore + EnrollmentStore + QuizStore + 'static {}

impl<T> LmsStore for T where T: UserStore + ContentStore + EnrollmentStore + QuizStore + 'static {}

pub struct AppServices {
    pub settings: Settings,
    pub users: Arc<dyn UserStore>,
    pub content: Arc<dyn ContentStore>,
    pub enrollments: Arc<dyn EnrollmentStore>,
    pub quizzes: Arc<dyn QuizStore>,
    pub resolver: OwnershipResolver,
    pub tokens: Arc<dyn TokenService>,
    pub hasher: CredentialHasher,
    pub gateway: Arc<dyn PaymentGateway>,
    pub webhooks: WebhookVerifier,
}

impl AppServices {
    /// Build services for `settings`: Postgres when `DATABASE_URL` is set,
    /// the in-memory store otherwise.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        match settings.database_url.clone() {
            Some(url) => {
                let store = PostgresStore::connect(&url).await?;
                store.migrate().await?;
                info!("using postgres store");
                Self::with_store(Arc::new(store), settings)
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
                Self::with_store(Arc::new(InMemoryStore::new()), settings)
            }
        }
    }

    pub fn with_store<S: LmsStore>(store: Arc<S>, settings: Settings) -> anyhow::Result<Self> {
        let users: Arc<dyn UserStore> = store.clone();
        let content: Arc<dyn ContentStore> = store.clone();
        let enrollments: Arc<dyn EnrollmentStore> = store.clone();
        let quizzes: Arc<dyn QuizStore> = store;

        let tokens = Arc::new(Hs256TokenService::new(
            settings.jwt_secret().as_bytes(),
            settings.token_ttl(),
        ));
        let hasher = CredentialHasher::new(settings.hash_cost())?;

        let gateway: Arc<dyn PaymentGateway> = match settings.stripe_secret_key.as_deref() {
            Some(key) if !key.is_empty() => Arc::new(StripeGateway::new(
                key,
                settings.stripe_api_base.clone(),
            )),
            _ => {
                warn!("STRIPE_SECRET_KEY not set; checkout sessions will not charge");
                Arc::new(OfflineGateway)
            }
        };
        let webhooks = WebhookVerifier::new(settings.webhook_secret());

        Ok(Self {
            resolver: OwnershipResolver::new(content.clone(), quizzes.clone()),
            settings,
            users,
            content,
            enrollments,
            quizzes,
            tokens,
            hasher,
            gateway,
            webhooks,
        })
    }

    /// Hash off the async runtime; Argon2 is deliberately slow.
    pub async fn hash_password(&self, password: String) -> ApiResult<String> {
        let hasher = self.hasher.clone();
        let hashed = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| ApiError::internal(format!("hashing task failed: {e}")))??;
        Ok(hashed)
    }

    /// `stored = None` still spends a full verification.
    pub async fn verify_password(&self, password: String, stored: Option<String>) -> ApiResult<bool> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || match stored {
            Some(hash) => hasher.verify(&password, &hash),
            None => hasher.verify_absent(&password),
        })
        .await
        .map_err(|e| ApiError::internal(format!("verification task failed: {e}")))
    }

    /// Check an email/password pair. Unknown email and wrong password are
    /// indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> ApiResult<User> {
        let user = self.users.find_user_by_email(&normalize_email(email)).await?;
        let stored = user.as_ref().map(|u| u.password_hash.clone());

        if !self.verify_password(password.to_string(), stored).await? {
            return Err(AuthError::InvalidCredentials.into());
        }
        let user = user.ok_or(AuthError::InvalidCredentials)?;
        if !user.active {
            return Err(AuthError::Deactivated.into());
        }
        Ok(user)
    }

    pub fn issue_token(&self, user: &User) -> ApiResult<IssuedToken> {
        Ok(self.tokens.issue(user.id, Utc::now())?)
    }

    /// Resolve a bearer token back to the account it was issued to.
    pub async fn principal_from_token(&self, token: &str) -> ApiResult<PrincipalContext> {
        let claims = self.tokens.verify(token, Utc::now())?;

        let user = self
            .users
            .find_user(claims.sub)
            .await?
            .ok_or(AuthError::UnknownSubject)?;

        ensure_issued_after_password_change(&claims, user.password_changed_at)
            .map_err(AuthError::from)?;
        if !user.active {
            return Err(AuthError::Deactivated.into());
        }

        Ok(PrincipalContext::new(user))
    }

    /// Create the configured admin account unless one with that email exists.
    pub async fn seed_admin(&self) -> anyhow::Result<()> {
        let (Some(email), Some(password)) = (
            self.settings.admin_email.as_deref(),
            self.settings.admin_password.as_deref(),
        ) else {
            return Ok(());
        };

        if self.users.find_user_by_email(&normalize_email(email)).await?.is_some() {
            debug!(%email, "admin account already present");
            return Ok(());
        }

        let new_user = NewUser::parse("Administrator", email, password, Role::Admin, None)?;
        let hash = self.hash_password(password.to_string()).await?;

        match self.users.insert_user(new_user.into_user(hash, None, Utc::now())).await {
            Ok(admin) => {
                info!(user_id = %admin.id, "seeded admin account");
                Ok(())
            }
            Err(StoreError::Conflict(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
