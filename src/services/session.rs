//! Session manager
//!
//! Sessions are stateless: a session is an HS256-signed token carrying
//! `SessionClaims`, stored client-side in the `session` cookie. Nothing is
//! persisted, so logging out only tells the browser to drop the cookie.
//!
//! Verification always checks `exp` against the wall clock. The `*_at`
//! variants only control the timestamps written into new tokens.

use crate::config::{AuthConfig, ConfigError};
use crate::models::SessionClaims;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

/// Name of the cookie holding the session token
pub const SESSION_COOKIE: &str = "session";

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Error types for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The signing secret is missing or empty
    #[error("Session signing secret is not configured")]
    MissingSecret,

    /// The presented token did not verify
    #[error("Invalid or expired session")]
    InvalidToken,

    /// The session lifetime pushes `exp` out of the representable range
    #[error("Session lifetime is out of range")]
    InvalidLifetime,

    /// Token encoding failed
    #[error("Failed to encode session token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

impl From<ConfigError> for SessionError {
    fn from(_: ConfigError) -> Self {
        SessionError::MissingSecret
    }
}

/// A freshly signed token together with the claims it carries
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: SessionClaims,
}

/// Issues, verifies and refreshes session tokens.
///
/// Holds the signing keys; construct once at start-up and share via `Arc`.
pub struct SessionManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionManager {
    /// Create a manager signing with `secret`.
    ///
    /// Fails with `MissingSecret` if the secret is empty.
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, SessionError> {
        if secret.trim().is_empty() {
            return Err(SessionError::MissingSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        })
    }

    /// Create a manager from the `auth` section of the configuration
    pub fn from_config(config: &AuthConfig) -> Result<Self, SessionError> {
        let ttl = Duration::try_days(config.session_ttl_days).ok_or(SessionError::InvalidLifetime)?;
        Self::new(config.secret()?, ttl)
    }

    /// Session lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for a user, valid from now
    pub fn issue(&self, user_id: i64, username: &str) -> Result<IssuedToken, SessionError> {
        self.issue_at(user_id, username, Utc::now())
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(
        &self,
        user_id: i64,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, SessionError> {
        let claims = SessionClaims {
            user: username.to_string(),
            uid: user_id,
            iat: now.timestamp(),
            exp: self.expiry_from(now)?,
        };

        self.sign(claims)
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> Result<i64, SessionError> {
        now.checked_add_signed(self.ttl)
            .map(|exp| exp.timestamp())
            .ok_or(SessionError::InvalidLifetime)
    }

    fn sign(&self, claims: SessionClaims) -> Result<IssuedToken, SessionError> {
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedToken { token, claims })
    }

    /// Decode a token, returning its claims if the signature and expiry are
    /// valid. Every failure looks the same to the caller.
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        match decode::<SessionClaims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("Session token rejected: {}", e);
                None
            }
        }
    }

    /// Re-issue a valid token with a new expiry, keeping user id and name
    pub fn refresh(&self, token: &str) -> Result<IssuedToken, SessionError> {
        self.refresh_at(token, Utc::now())
    }

    /// Like `refresh`, stamping the new token with `now`.
    ///
    /// `exp` has one-second resolution, so a token refreshed within the
    /// second it was issued is pushed one second past the old expiry.
    pub fn refresh_at(&self, token: &str, now: DateTime<Utc>) -> Result<IssuedToken, SessionError> {
        let old = self.verify(token).ok_or(SessionError::InvalidToken)?;
        let exp = self.expiry_from(now)?.max(old.exp.saturating_add(1));

        self.sign(SessionClaims {
            user: old.user,
            uid: old.uid,
            iat: now.timestamp(),
            exp,
        })
    }

    /// `Set-Cookie` value carrying an issued token
    pub fn session_cookie(&self, issued: &IssuedToken) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}; Expires={}",
            SESSION_COOKIE,
            issued.token,
            self.ttl.num_seconds(),
            issued.claims.expires_at().format(HTTP_DATE_FORMAT),
        )
    }

    /// `Set-Cookie` value that makes the client discard the session
    pub fn revocation_cookie(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            SESSION_COOKIE
        )
    }
}
