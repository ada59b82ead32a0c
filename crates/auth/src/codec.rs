//! Token codec: issue, verify, refresh and invalidate signed bearer tokens.
//!
//! Verification here answers only "is this a well-formed, correctly signed,
//! currently valid, non-revoked token". Whether the token may be used with a
//! particular guard is checked separately against the guard registry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use tenantry_core::PrincipalId;

use crate::blacklist::{BlacklistError, TokenBlacklist};
use crate::claims::{Claims, ExtraClaims, RESERVED_CLAIMS, TENANT_CLAIM};
use crate::principal::BindingTag;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token has expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has been blacklisted")]
    Blacklisted,

    #[error("token revocation failed: {0}")]
    Revocation(String),

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl TokenError {
    /// Short label for logs; never sent to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::Expired => "expired",
            TokenError::NotYetValid => "not_yet_valid",
            TokenError::SignatureInvalid => "signature_invalid",
            TokenError::Blacklisted => "blacklisted",
            TokenError::Revocation(_) => "revocation",
            TokenError::Encoding(_) => "encoding",
        }
    }
}

/// Process-wide codec settings. Every flag is explicit; nothing is inferred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// HS256 signing secret.
    pub secret: String,

    /// Value of the `iss` claim.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// How long after `exp` a token may still be refreshed, in seconds.
    #[serde(default)]
    pub refresh_grace_secs: u64,

    /// Whether refresh resets `iat` to the refresh time.
    #[serde(default)]
    pub refresh_iat: bool,

    /// Clock skew tolerance applied to `exp`, `nbf` and `iat`, in seconds.
    #[serde(default)]
    pub leeway_secs: u64,

    /// When disabled, invalidation is a no-op and refresh does not revoke.
    #[serde(default = "default_true")]
    pub blacklist_enabled: bool,
}

fn default_issuer() -> String {
    "tenantry".to_string()
}

fn default_true() -> bool {
    true
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: default_issuer(),
            refresh_grace_secs: 0,
            refresh_iat: false,
            leeway_secs: 0,
            blacklist_enabled: true,
        }
    }

    pub fn refresh_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_grace_secs as i64)
    }

    fn leeway(&self) -> i64 {
        self.leeway_secs as i64
    }
}

/// What a guard contributes to a token: its binding tag and lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenProfile {
    pub binding_tag: BindingTag,
    pub ttl: Duration,
}

/// A freshly signed token plus its claims.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

impl IssuedToken {
    /// Remaining lifetime in seconds, as reported to clients.
    pub fn expires_in(&self) -> i64 {
        self.claims.lifetime_secs()
    }
}

pub struct TokenCodec {
    config: TokenConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
    blacklist: Arc<dyn TokenBlacklist>,
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.config.issuer)
            .field("refresh_grace_secs", &self.config.refresh_grace_secs)
            .field("refresh_iat", &self.config.refresh_iat)
            .field("blacklist_enabled", &self.config.blacklist_enabled)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(config: TokenConfig, blacklist: Arc<dyn TokenBlacklist>) -> Self {
        let encoding = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding,
            decoding,
            blacklist,
        }
    }

    pub fn issue(
        &self,
        subject: &PrincipalId,
        profile: &TokenProfile,
        extra: ExtraClaims,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, profile, extra, Utc::now())
    }

    /// Sign a new token for `subject` with fresh time claims and a unique `jti`.
    pub fn issue_at(
        &self,
        subject: &PrincipalId,
        profile: &TokenProfile,
        extra: ExtraClaims,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let iat = now.timestamp();
        let ttl = i64::try_from(profile.ttl.as_secs()).unwrap_or(i64::MAX / 2);

        let mut custom = extra.custom;
        custom.retain(|key, _| {
            let reserved = RESERVED_CLAIMS.contains(&key.as_str()) || key == TENANT_CLAIM;
            if reserved {
                tracing::warn!(claim = %key, "ignoring extra claim that shadows a reserved claim");
            }
            !reserved
        });

        let claims = Claims {
            sub: subject.clone(),
            iss: self.config.issuer.clone(),
            iat,
            nbf: iat,
            exp: iat.saturating_add(ttl),
            jti: Uuid::now_v7().simple().to_string(),
            prv: profile.binding_tag.clone(),
            tenant_id: extra.tenant_id,
            extra: custom,
        };

        self.sign(claims)
    }

    pub async fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now()).await
    }

    /// Decode and validate a token: signature, issuer, required claims, time
    /// window, then the blacklist.
    pub async fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        self.check_time_window(&claims, now)?;
        self.check_not_revoked(&claims, now).await?;
        Ok(claims)
    }

    pub async fn refresh(&self, token: &str) -> Result<IssuedToken, TokenError> {
        self.refresh_at(token, Utc::now()).await
    }

    /// Reissue a token that is valid or inside the refresh grace window.
    ///
    /// Subject, binding tag, tenant and extra claims are preserved; the new token
    /// has a new `jti`, `nbf = now` and at least the original lifetime from
    /// `now`. Its `exp` is always later than the original's.
    ///
    /// With the blacklist enabled the original is revoked, and revocation is
    /// the gate: when two refreshes of one token race, only the one that
    /// records the revocation gets its token back.
    pub async fn refresh_at(&self, token: &str, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let old = self.decode(token)?;

        let leeway = self.config.leeway();
        if old.nbf > now.timestamp() + leeway || old.iat > now.timestamp() + leeway {
            return Err(TokenError::NotYetValid);
        }
        let refresh_deadline = old.expires_at() + self.config.refresh_grace();
        if now >= refresh_deadline {
            return Err(TokenError::Expired);
        }
        self.check_not_revoked(&old, now).await?;

        let nbf = now.timestamp();
        let exp = nbf
            .saturating_add(old.lifetime_secs())
            .max(old.exp.saturating_add(1));
        let claims = Claims {
            sub: old.sub.clone(),
            iss: self.config.issuer.clone(),
            iat: if self.config.refresh_iat { nbf } else { old.iat },
            nbf,
            exp,
            jti: Uuid::now_v7().simple().to_string(),
            prv: old.prv.clone(),
            tenant_id: old.tenant_id.clone(),
            extra: old.extra.clone(),
        };

        let issued = self.sign(claims)?;
        if !self.revoke(&old, now).await? {
            tracing::debug!(jti = %old.jti, "token already refreshed or revoked");
            return Err(TokenError::Blacklisted);
        }
        Ok(issued)
    }

    /// Check the signature and issuer only and return the claims, whatever
    /// their time window or revocation state. Used to pick a guard before
    /// refreshing.
    pub fn inspect(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode(token)
    }

    /// Revoke a token. Fails with [`TokenError::Revocation`] when the
    /// blacklist could not record it; the token is then still usable.
    pub async fn invalidate(&self, token: &str) -> Result<(), TokenError> {
        let claims = self.decode(token)?;
        self.revoke(&claims, Utc::now()).await?;
        Ok(())
    }

    /// Remove blacklist entries that can no longer match a usable token.
    pub async fn prune_blacklist(&self, now: DateTime<Utc>) -> Result<usize, BlacklistError> {
        self.blacklist.prune(now).await
    }

    /// Record the token's `jti`. `Ok(false)` means it was already revoked.
    async fn revoke(&self, claims: &Claims, now: DateTime<Utc>) -> Result<bool, TokenError> {
        if !self.config.blacklist_enabled {
            return Ok(true);
        }
        // Keep the entry through the refresh window so a revoked token cannot
        // be revived by refreshing it.
        let until = claims.expires_at() + self.config.refresh_grace();
        let recorded = self
            .blacklist
            .add(&claims.jti, until, now)
            .await
            .map_err(|err| TokenError::Revocation(err.0))?;
        if recorded {
            tracing::debug!(jti = %claims.jti, until = %until, "token blacklisted");
        }
        Ok(recorded)
    }

    fn sign(&self, claims: Claims) -> Result<IssuedToken, TokenError> {
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        Ok(IssuedToken { token, claims })
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256];
        // Time claims are checked against the caller's clock, not the system's.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.set_issuer(&[self.config.issuer.as_str()]);

        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    fn check_time_window(&self, claims: &Claims, now: DateTime<Utc>) -> Result<(), TokenError> {
        let now = now.timestamp();
        let leeway = self.config.leeway();

        if claims.exp <= claims.iat.min(claims.nbf) {
            return Err(TokenError::Malformed);
        }
        if claims.nbf > now + leeway || claims.iat > now + leeway {
            return Err(TokenError::NotYetValid);
        }
        if claims.exp <= now - leeway {
            return Err(TokenError::Expired);
        }
        Ok(())
    }

    async fn check_not_revoked(&self, claims: &Claims, now: DateTime<Utc>) -> Result<(), TokenError> {
        if !self.config.blacklist_enabled {
            return Ok(());
        }
        match self.blacklist.contains(&claims.jti, now).await {
            Ok(false) => Ok(()),
            Ok(true) => Err(TokenError::Blacklisted),
            Err(err) => {
                // Fail closed: a token that cannot be checked counts as revoked.
                tracing::error!(jti = %claims.jti, error = %err, "blacklist lookup failed");
                Err(TokenError::Blacklisted)
            }
        }
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
        // A token signed with another algorithm cannot carry a valid HS256 signature.
        ErrorKind::InvalidAlgorithm => TokenError::SignatureInvalid,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::ImmatureSignature => TokenError::NotYetValid,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blacklist::InMemoryTokenBlacklist;
    use crate::principal::PrincipalKind;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

    fn codec_with(config: TokenConfig) -> TokenCodec {
        TokenCodec::new(config, Arc::new(InMemoryTokenBlacklist::new()))
    }

    fn codec() -> TokenCodec {
        codec_with(TokenConfig::new(SECRET))
    }

    fn profile(kind: PrincipalKind) -> TokenProfile {
        TokenProfile {
            binding_tag: kind.binding_tag(),
            ttl: Duration::from_secs(3600),
        }
    }

    fn subject() -> PrincipalId {
        "A1".parse().unwrap()
    }

    #[tokio::test]
    async fn issue_then_verify_returns_same_subject() {
        let codec = codec();
        let now = Utc::now();
        let issued = codec
            .issue_at(&subject(), &profile(PrincipalKind::LandlordAdmin), ExtraClaims::none(), now)
            .unwrap();

        assert_eq!(issued.token.split('.').count(), 3);
        assert_eq!(issued.expires_in(), 3600);

        let claims = codec.verify_at(&issued.token, now).await.unwrap();
        assert_eq!(claims.sub, subject());
        assert_eq!(claims.prv, PrincipalKind::LandlordAdmin.binding_tag());
        assert_eq!(claims.exp, now.timestamp() + 3600);
        assert_eq!(claims.iss, "tenantry");
        assert!(claims.tenant_id.is_none());
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let codec = codec();
        let issued_at = Utc::now() - ChronoDuration::seconds(3601);
        let issued = codec
            .issue_at(&subject(), &profile(PrincipalKind::GenericUser), ExtraClaims::none(), issued_at)
            .unwrap();

        // exp = now - 1s
        assert_eq!(codec.verify_at(&issued.token, Utc::now()).await, Err(TokenError::Expired));
    }

    #[tokio::test]
    async fn future_token_is_not_yet_valid() {
        let codec = codec();
        let later = Utc::now() + ChronoDuration::minutes(5);
        let issued = codec
            .issue_at(&subject(), &profile(PrincipalKind::GenericUser), ExtraClaims::none(), later)
            .unwrap();

        assert_eq!(codec.verify_at(&issued.token, Utc::now()).await, Err(TokenError::NotYetValid));
    }

    #[tokio::test]
    async fn leeway_tolerates_small_skew() {
        let mut config = TokenConfig::new(SECRET);
        config.leeway_secs = 30;
        let codec = codec_with(config);
        let now = Utc::now();
        let issued = codec
            .issue_at(&subject(), &profile(PrincipalKind::GenericUser), ExtraClaims::none(), now + ChronoDuration::seconds(10))
            .unwrap();

        assert!(codec.verify_at(&issued.token, now).await.is_ok());
    }

    #[tokio::test]
    async fn garbage_is_malformed_and_foreign_secret_is_signature_invalid() {
        let codec = codec();
        assert_eq!(codec.verify_at("not-a-token", Utc::now()).await, Err(TokenError::Malformed));
        assert_eq!(codec.verify_at("a.b.c", Utc::now()).await, Err(TokenError::Malformed));

        let other = codec_with(TokenConfig::new("a-completely-different-signing-secret"));
        let issued = other
            .issue(&subject(), &profile(PrincipalKind::LandlordAdmin), ExtraClaims::none())
            .unwrap();
        assert_eq!(codec.verify(&issued.token).await, Err(TokenError::SignatureInvalid));
    }

    #[tokio::test]
    async fn token_missing_required_claims_is_malformed() {
        let codec = codec();
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &json!({"sub": "A1", "exp": Utc::now().timestamp() + 60}),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(codec.verify(&token).await, Err(TokenError::Malformed));
    }

    #[tokio::test]
    async fn extra_claims_cannot_override_reserved() {
        let codec = codec();
        let extra = ExtraClaims::tenant("t-9".parse().unwrap())
            .with_claim("sub", json!("someone-else"))
            .with_claim("prv", json!("forged"))
            .with_claim("locale", json!("fr"));

        let issued = codec
            .issue(&subject(), &profile(PrincipalKind::TenantUser), extra)
            .unwrap();
        let claims = codec.verify(&issued.token).await.unwrap();

        assert_eq!(claims.sub, subject());
        assert_eq!(claims.prv, PrincipalKind::TenantUser.binding_tag());
        assert_eq!(claims.tenant_id.unwrap().as_str(), "t-9");
        assert_eq!(claims.extra.get("locale"), Some(&json!("fr")));
        assert!(!claims.extra.contains_key("sub"));
    }

    #[test]
    fn jti_is_unique_per_issue() {
        let codec = codec();
        let p = profile(PrincipalKind::GenericUser);
        let a = codec.issue(&subject(), &p, ExtraClaims::none()).unwrap();
        let b = codec.issue(&subject(), &p, ExtraClaims::none()).unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
    }

    #[tokio::test]
    async fn invalidate_blacklists_jti() {
        let codec = codec();
        let issued = codec
            .issue(&subject(), &profile(PrincipalKind::GenericUser), ExtraClaims::none())
            .unwrap();

        assert!(codec.verify(&issued.token).await.is_ok());
        codec.invalidate(&issued.token).await.unwrap();
        assert_eq!(codec.verify(&issued.token).await, Err(TokenError::Blacklisted));
    }

    #[tokio::test]
    async fn invalidate_is_noop_when_blacklist_disabled() {
        let mut config = TokenConfig::new(SECRET);
        config.blacklist_enabled = false;
        let codec = codec_with(config);
        let issued = codec
            .issue(&subject(), &profile(PrincipalKind::GenericUser), ExtraClaims::none())
            .unwrap();

        codec.invalidate(&issued.token).await.unwrap();
        assert!(codec.verify(&issued.token).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_preserves_identity_and_moves_expiry() {
        let codec = codec();
        let t0 = Utc::now() - ChronoDuration::minutes(10);
        let original = codec
            .issue_at(
                &subject(),
                &profile(PrincipalKind::TenantUser),
                ExtraClaims::tenant("t-1".parse().unwrap()),
                t0,
            )
            .unwrap();

        let now = Utc::now();
        let refreshed = codec.refresh_at(&original.token, now).await.unwrap();

        assert_eq!(refreshed.claims.sub, original.claims.sub);
        assert_eq!(refreshed.claims.prv, original.claims.prv);
        assert_eq!(refreshed.claims.tenant_id, original.claims.tenant_id);
        assert_ne!(refreshed.claims.jti, original.claims.jti);
        assert!(refreshed.claims.exp > original.claims.exp);
        // refresh_iat defaults to false
        assert_eq!(refreshed.claims.iat, original.claims.iat);
        assert_eq!(refreshed.claims.nbf, now.timestamp());

        assert_eq!(codec.verify_at(&original.token, now).await, Err(TokenError::Blacklisted));
        assert!(codec.verify_at(&refreshed.token, now).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_iat_flag_resets_issued_at() {
        let mut config = TokenConfig::new(SECRET);
        config.refresh_iat = true;
        let codec = codec_with(config);
        let t0 = Utc::now() - ChronoDuration::minutes(1);
        let original = codec
            .issue_at(&subject(), &profile(PrincipalKind::GenericUser), ExtraClaims::none(), t0)
            .unwrap();

        let now = Utc::now();
        let refreshed = codec.refresh_at(&original.token, now).await.unwrap();
        assert_eq!(refreshed.claims.iat, now.timestamp());
    }

    #[tokio::test]
    async fn refresh_outside_grace_is_expired() {
        let codec = codec();
        let t0 = Utc::now() - ChronoDuration::hours(2);
        let original = codec
            .issue_at(&subject(), &profile(PrincipalKind::GenericUser), ExtraClaims::none(), t0)
            .unwrap();

        assert_eq!(
            codec.refresh_at(&original.token, Utc::now()).await.map(|_| ()),
            Err(TokenError::Expired)
        );
    }

    #[tokio::test]
    async fn refresh_inside_grace_succeeds() {
        let mut config = TokenConfig::new(SECRET);
        config.refresh_grace_secs = 600;
        let codec = codec_with(config);
        let t0 = Utc::now() - ChronoDuration::seconds(3600 + 60);
        let original = codec
            .issue_at(&subject(), &profile(PrincipalKind::GenericUser), ExtraClaims::none(), t0)
            .unwrap();

        let now = Utc::now();
        assert_eq!(codec.verify_at(&original.token, now).await, Err(TokenError::Expired));
        let refreshed = codec.refresh_at(&original.token, now).await.unwrap();
        assert!(codec.verify_at(&refreshed.token, now).await.is_ok());

        // The revoked original stays revoked for the rest of the grace window.
        assert_eq!(
            codec.refresh_at(&original.token, now).await.map(|_| ()),
            Err(TokenError::Blacklisted)
        );
    }

    #[tokio::test]
    async fn refresh_of_blacklisted_token_fails() {
        let codec = codec();
        let issued = codec
            .issue(&subject(), &profile(PrincipalKind::GenericUser), ExtraClaims::none())
            .unwrap();
        codec.invalidate(&issued.token).await.unwrap();

        assert_eq!(codec.refresh(&issued.token).await.map(|_| ()), Err(TokenError::Blacklisted));
    }

    #[tokio::test]
    async fn prune_removes_expired_entries() {
        let codec = codec();
        let t0 = Utc::now() - ChronoDuration::hours(2);
        let old = codec
            .issue_at(&subject(), &profile(PrincipalKind::GenericUser), ExtraClaims::none(), t0)
            .unwrap();
        codec.invalidate(&old.token).await.unwrap();

        assert_eq!(codec.prune_blacklist(Utc::now()).await.unwrap(), 1);
    }

    #[test]
    fn inspect_ignores_time_window_but_not_signature() {
        let codec = codec();
        let t0 = Utc::now() - ChronoDuration::hours(2);
        let old = codec
            .issue_at(&subject(), &profile(PrincipalKind::TenantUser), ExtraClaims::none(), t0)
            .unwrap();

        assert_eq!(codec.inspect(&old.token).unwrap().sub, subject());

        let other = codec_with(TokenConfig::new("a-completely-different-signing-secret"));
        assert_eq!(other.inspect(&old.token), Err(TokenError::SignatureInvalid));
    }

    #[tokio::test]
    async fn refresh_in_the_issuing_second_still_moves_expiry() {
        let codec = codec();
        let now = Utc::now();
        let original = codec
            .issue_at(&subject(), &profile(PrincipalKind::GenericUser), ExtraClaims::none(), now)
            .unwrap();

        let refreshed = codec.refresh_at(&original.token, now).await.unwrap();
        assert!(refreshed.claims.exp > original.claims.exp);
        assert!(codec.verify_at(&refreshed.token, now).await.is_ok());
    }

    #[tokio::test]
    async fn token_from_another_issuer_is_malformed() {
        let mut config = TokenConfig::new(SECRET);
        config.issuer = "someone-else".into();
        let foreign = codec_with(config);
        let issued = foreign
            .issue(&subject(), &profile(PrincipalKind::LandlordAdmin), ExtraClaims::none())
            .unwrap();

        let codec = codec();
        assert_eq!(codec.verify(&issued.token).await, Err(TokenError::Malformed));
        assert_eq!(codec.inspect(&issued.token), Err(TokenError::Malformed));
    }

    #[tokio::test]
    async fn extra_tenant_claim_does_not_shadow_typed_tenant() {
        let codec = codec();
        let extra = ExtraClaims::none().with_claim(TENANT_CLAIM, json!("forged"));
        let issued = codec
            .issue(&subject(), &profile(PrincipalKind::GenericUser), extra)
            .unwrap();

        let claims = codec.verify(&issued.token).await.unwrap();
        assert!(claims.tenant_id.is_none());
        assert!(!claims.extra.contains_key(TENANT_CLAIM));
    }

    #[tokio::test]
    async fn concurrent_refreshes_of_one_token_yield_one_winner() {
        let codec = codec();
        let issued = codec
            .issue(&subject(), &profile(PrincipalKind::GenericUser), ExtraClaims::none())
            .unwrap();

        let now = Utc::now();
        let (a, b) = tokio::join!(
            codec.refresh_at(&issued.token, now),
            codec.refresh_at(&issued.token, now)
        );
        let outcomes = [a.map(|_| ()), b.map(|_| ())];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes.contains(&Err(TokenError::Blacklisted)));
    }

    /// Store that is down for every operation.
    struct UnavailableBlacklist;

    #[async_trait::async_trait]
    impl TokenBlacklist for UnavailableBlacklist {
        async fn add(&self, _: &str, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<bool, BlacklistError> {
            Err(BlacklistError("connection refused".into()))
        }

        async fn contains(&self, _: &str, _: DateTime<Utc>) -> Result<bool, BlacklistError> {
            Err(BlacklistError("connection refused".into()))
        }

        async fn prune(&self, _: DateTime<Utc>) -> Result<usize, BlacklistError> {
            Err(BlacklistError("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn unavailable_blacklist_surfaces_revocation_failures() {
        let codec = TokenCodec::new(TokenConfig::new(SECRET), Arc::new(UnavailableBlacklist));
        let issued = codec
            .issue(&subject(), &profile(PrincipalKind::GenericUser), ExtraClaims::none())
            .unwrap();

        assert!(matches!(
            codec.invalidate(&issued.token).await,
            Err(TokenError::Revocation(_))
        ));
        assert!(codec.prune_blacklist(Utc::now()).await.is_err());
        // Lookups fail closed.
        assert_eq!(codec.verify(&issued.token).await, Err(TokenError::Blacklisted));
    }

    /// Lookups work, writes fail.
    struct ReadOnlyBlacklist;

    #[async_trait::async_trait]
    impl TokenBlacklist for ReadOnlyBlacklist {
        async fn add(&self, _: &str, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<bool, BlacklistError> {
            Err(BlacklistError("READONLY replica".into()))
        }

        async fn contains(&self, _: &str, _: DateTime<Utc>) -> Result<bool, BlacklistError> {
            Ok(false)
        }

        async fn prune(&self, _: DateTime<Utc>) -> Result<usize, BlacklistError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn refresh_fails_when_original_cannot_be_revoked() {
        let codec = TokenCodec::new(TokenConfig::new(SECRET), Arc::new(ReadOnlyBlacklist));
        let issued = codec
            .issue(&subject(), &profile(PrincipalKind::GenericUser), ExtraClaims::none())
            .unwrap();

        let err = codec.refresh(&issued.token).await.map(|_| ()).unwrap_err();
        assert_eq!(err, TokenError::Revocation("READONLY replica".into()));
        assert_eq!(err.kind(), "revocation");
    }
}
