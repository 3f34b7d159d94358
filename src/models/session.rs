//! Session token claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried inside a signed session token.
///
/// Validity is entirely determined by the token signature and `exp`;
/// nothing is stored server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Username at the time of issue
    pub user: String,
    /// User ID
    pub uid: i64,
    /// Issued-at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

impl SessionClaims {
    /// Expiration as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expires_at_roundtrip() {
        let now = Utc::now();
        let claims = SessionClaims {
            user: "alice".to_string(),
            uid: 1,
            iat: now.timestamp(),
            exp: (now + Duration::days(7)).timestamp(),
        };
        assert_eq!(claims.expires_at().timestamp(), claims.exp);
        assert!(claims.expires_at() > now);
    }
}
