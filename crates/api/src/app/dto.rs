use serde::{Deserialize, Serialize};

use tenantry_auth::IssuedToken;
use tenantry_core::TenantId;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until expiry.
    pub expires_in: i64,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            expires_in: issued.expires_in(),
            access_token: issued.token,
            token_type: "bearer",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UserEmailResponse {
    pub user: String,
}

#[derive(Debug, Serialize)]
pub struct TenantContextResponse {
    pub tenant_id: Option<TenantId>,
}

#[derive(Debug, Serialize)]
pub struct DebugDbResponse {
    pub status: &'static str,
    /// `landlord` or `tenant`.
    pub connection: &'static str,
    pub database: String,
}
