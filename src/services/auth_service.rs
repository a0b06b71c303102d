use tracing::{info, warn};

use crate::{
    auth::{
        Role, TokenBundle, TokenService,
        password::{hash_password, verify_password},
    },
    db::{
        dao::DaoLayerError,
        entities::user,
        store::{NewUser, UserStore},
    },
    error::AppError,
    services::{
        avatar::{AvatarStorage, gravatar_url},
        mail::MailQueue,
    },
};

pub struct SignupInput<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

pub struct ResetPasswordInput<'a> {
    pub token: &'a str,
    pub new_password: &'a str,
    pub email: Option<&'a str>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone, Copy)]
pub struct AuthService<'a> {
    users: &'a dyn UserStore,
    tokens: &'a TokenService,
    mail: &'a MailQueue,
    avatars: &'a dyn AvatarStorage,
    public_url: &'a str,
}

impl<'a> AuthService<'a> {
    pub fn new(
        users: &'a dyn UserStore,
        tokens: &'a TokenService,
        mail: &'a MailQueue,
        avatars: &'a dyn AvatarStorage,
        public_url: &'a str,
    ) -> Self {
        Self {
            users,
            tokens,
            mail,
            avatars,
            public_url,
        }
    }

    pub async fn signup(&self, input: SignupInput<'_>) -> Result<user::Model, AppError> {
        let email = normalize_email(input.email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("Account already exists"));
        }

        let password_hash = hash_password(input.password)?;
        let avatar = gravatar_url(&email);
        // A concurrent signup can still win the insert.
        let user = self
            .users
            .create(NewUser {
                email,
                password_hash,
                username: input.username.trim().to_string(),
                avatar: Some(avatar),
                role: Role::User.as_str().to_string(),
                confirmed: false,
            })
            .await
            .map_err(|err| match err {
                DaoLayerError::Conflict { .. } => AppError::conflict("Account already exists"),
                other => other.into(),
            })?;

        let token = self.tokens.create_email_token(&user.email)?;
        self.mail
            .send_confirmation(&user.email, &user.username, self.public_url, token);
        info!(user_id = %user.id, "user signed up");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenBundle, AppError> {
        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid email"))?;

        if !user.confirmed {
            return Err(AppError::unauthorized("Email not confirmed"));
        }

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::unauthorized("Invalid password"));
        }

        self.issue_tokens(&user).await
    }

    /// Stores the new refresh token, which revokes any earlier one.
    async fn issue_tokens(&self, user: &user::Model) -> Result<TokenBundle, AppError> {
        let access_token = self.tokens.create_access_token(&user.email)?;
        let refresh_token = self.tokens.create_refresh_token(&user.email)?;
        self.users
            .set_refresh_token(user.id, Some(refresh_token.clone()))
            .await?;

        Ok(TokenBundle {
            access_token,
            refresh_token,
            token_type: "bearer",
            expires_in: self.tokens.access_ttl_secs(),
        })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenBundle, AppError> {
        let email = self.tokens.decode_refresh_token(refresh_token).map_err(|err| {
            tracing::debug!(error = %err, "refresh token rejected");
            AppError::unauthorized("Could not validate credentials")
        })?;

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid refresh token"))?;

        if user.refresh_token.as_deref() != Some(refresh_token) {
            warn!(user_id = %user.id, "stale refresh token presented, revoking session");
            self.users.set_refresh_token(user.id, None).await?;
            return Err(AppError::unauthorized("Invalid refresh token"));
        }

        self.issue_tokens(&user).await
    }

    pub async fn confirm_email(&self, token: &str) -> Result<&'static str, AppError> {
        let email = self
            .tokens
            .get_email_from_token(token)
            .map_err(|_| AppError::invalid_token("Invalid token for email verification"))?;

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::bad_request("Verification error"))?;

        if user.confirmed {
            return Ok("Your email is already confirmed");
        }

        self.users.confirm_email(&email).await?;
        info!(user_id = %user.id, "email confirmed");
        Ok("Email confirmed")
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid email"))?;

        let token = self.tokens.create_reset_password_token(&user.email)?;
        self.mail
            .send_password_reset(&user.email, &user.username, self.public_url, token);
        Ok(())
    }

    /// The account is taken from the token subject, never from the payload.
    pub async fn reset_password(&self, input: ResetPasswordInput<'_>) -> Result<(), AppError> {
        let claims = self
            .tokens
            .verify_reset_password_token(input.token)
            .map_err(|_| AppError::invalid_token("Invalid or expired token"))?;

        if let Some(email) = input.email {
            if normalize_email(email) != claims.sub {
                return Err(AppError::invalid_token("Invalid or expired token"));
            }
        }

        let user = self
            .users
            .find_by_email(&claims.sub)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        let password_hash = hash_password(input.new_password)?;
        self.users.update_password(user.id, password_hash).await?;
        info!(user_id = %user.id, "password reset");
        Ok(())
    }

    pub async fn update_avatar(
        &self,
        user: &user::Model,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<user::Model, AppError> {
        let stored = self
            .avatars
            .upload(bytes, &format!("user-{}", user.id), content_type)
            .await?;
        Ok(self.users.update_avatar(user.id, stored.url).await?)
    }

    pub async fn seed_admin(&self, email: &str, password: &str) -> anyhow::Result<()> {
        let email = normalize_email(email);
        if let Some(existing) = self
            .users
            .find_by_email(&email)
            .await
            .map_err(|err| anyhow::anyhow!("{err}"))?
        {
            info!("admin user already present: {}", existing.email);
            return Ok(());
        }

        let password_hash =
            hash_password(password).map_err(|err| anyhow::anyhow!("admin seed hash error: {err}"))?;
        let user = self
            .users
            .create(NewUser {
                email,
                password_hash,
                username: "admin".to_string(),
                avatar: None,
                role: Role::Admin.as_str().to_string(),
                confirmed: true,
            })
            .await
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        info!("seeded admin user {}", user.email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ResetPasswordInput, SignupInput};
    use crate::{
        auth::password::verify_password,
        db::store::UserStore,
        error::AppError,
        services::ServiceContext,
        test_helpers::{TestApp, extract_reset_token},
    };

    fn alice() -> SignupInput<'static> {
        SignupInput {
            username: "alice",
            email: "a@x.com",
            password: "secret1",
        }
    }

    #[tokio::test]
    async fn signup_rejects_duplicate_email() {
        let app = TestApp::new();
        let auth = ServiceContext::from_state(&app.state).auth();

        let user = auth.signup(alice()).await.expect("signup should succeed");
        assert!(!user.confirmed);
        assert_eq!(user.role, "user");
        assert!(
            user.avatar
                .as_deref()
                .is_some_and(|url| url.starts_with("https://www.gravatar.com/avatar/"))
        );

        let err = auth.signup(alice()).await.expect_err("duplicate should fail");
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(app.mailer.wait_for(1).await.len(), 1);
    }

    #[tokio::test]
    async fn login_checks_confirmation_before_password() {
        let app = TestApp::new();
        let auth = ServiceContext::from_state(&app.state).auth();
        auth.signup(alice()).await.expect("signup should succeed");

        let err = auth
            .login("a@x.com", "wrong-password")
            .await
            .expect_err("unconfirmed login should fail");
        assert_eq!(err.message(), "Email not confirmed");

        let err = auth
            .login("nobody@x.com", "secret1")
            .await
            .expect_err("unknown login should fail");
        assert_eq!(err.message(), "Invalid email");
    }

    #[tokio::test]
    async fn new_refresh_token_revokes_the_previous_one() {
        let app = TestApp::new();
        app.confirmed_user("a@x.com", "secret1", "user").await;
        let auth = ServiceContext::from_state(&app.state).auth();

        let first = auth.login("a@x.com", "secret1").await.expect("login");
        let second = auth.login("a@x.com", "secret1").await.expect("login");

        let err = auth
            .refresh(&first.refresh_token)
            .await
            .expect_err("stale token should fail");
        assert_eq!(err.message(), "Invalid refresh token");

        // The mismatch cleared the session, so the newest token is gone too.
        let err = auth
            .refresh(&second.refresh_token)
            .await
            .expect_err("revoked session should fail");
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn reset_password_is_bound_to_the_token_subject() {
        let app = TestApp::new();
        let user = app.confirmed_user("a@x.com", "secret1", "user").await;
        app.confirmed_user("b@x.com", "secret2", "user").await;
        let auth = ServiceContext::from_state(&app.state).auth();

        auth.request_password_reset("a@x.com")
            .await
            .expect("reset request should succeed");
        let sent = app.mailer.wait_for(1).await;
        let token = extract_reset_token(&sent[0]).expect("mail should carry a token");

        let err = auth
            .reset_password(ResetPasswordInput {
                token: &token,
                new_password: "newpass1",
                email: Some("b@x.com"),
            })
            .await
            .expect_err("mismatched email should fail");
        assert!(matches!(err, AppError::InvalidToken(_)));

        let unchanged = app.store.find_by_id(user.id).await.expect("lookup").expect("user");
        assert!(verify_password("secret1", &unchanged.password_hash).expect("verify"));

        auth.reset_password(ResetPasswordInput {
            token: &token,
            new_password: "newpass1",
            email: None,
        })
        .await
        .expect("reset should succeed");
        let updated = app.store.find_by_id(user.id).await.expect("lookup").expect("user");
        assert!(verify_password("newpass1", &updated.password_hash).expect("verify"));
        assert_eq!(updated.refresh_token, None);
    }

    #[tokio::test]
    async fn request_reset_for_unknown_email_sends_nothing() {
        let app = TestApp::new();
        let auth = ServiceContext::from_state(&app.state).auth();

        let err = auth
            .request_password_reset("ghost@x.com")
            .await
            .expect_err("unknown email should fail");
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(app.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn seed_admin_is_idempotent() {
        let app = TestApp::new();
        let auth = ServiceContext::from_state(&app.state).auth();

        auth.seed_admin("Admin@Example.com", "adminpass")
            .await
            .expect("seed should succeed");
        auth.seed_admin("admin@example.com", "adminpass")
            .await
            .expect("reseed should succeed");

        let admin = app
            .store
            .find_by_email("admin@example.com")
            .await
            .expect("lookup")
            .expect("admin should exist");
        assert_eq!(admin.role, "admin");
        assert!(admin.confirmed);
    }
}
