use serde::{Deserialize, Serialize};

use reservo_core::{RefreshTokenId, UserId};

/// Claims embedded in a signed access token.
///
/// `refresh_token_id` ties the access token to the refresh-token lineage it was
/// issued with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub user_id: UserId,
    pub refresh_token_id: RefreshTokenId,

    /// Issued-at (unix seconds).
    pub iat: i64,

    /// Expiration (unix seconds).
    pub exp: i64,
}

/// Claims embedded in a signed refresh token.
///
/// `ppid` mirrors the secret stored on the refresh-token record; the pair is
/// cross-checked on every refresh/logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshClaims {
    pub user_id: UserId,
    pub refresh_token_id: RefreshTokenId,
    pub ppid: String,
    pub iat: i64,
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_use_camel_case_keys() {
        let claims = RefreshClaims {
            user_id: UserId::new(),
            refresh_token_id: RefreshTokenId::new(),
            ppid: "abc".to_string(),
            iat: 1,
            exp: 2,
        };

        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("refreshTokenId").is_some());
        assert_eq!(json["ppid"], "abc");
    }
}
