use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{header::HOST, StatusCode};
use serde_json::{json, Value};

use tenantry_api::config::AppConfig;
use tenantry_auth::{ExtraClaims, InMemoryTokenBlacklist, PrincipalKind, TokenCodec, TokenProfile};
use tenantry_core::PrincipalId;
use tenantry_infra::{DevSeed, InMemoryBackend, SwitchEvent};

const JWT_SECRET: &str = "black-box-secret-black-box-secret";

const SEED: &str = r#"{
    "tenants": [
        { "id": "acme", "database_ref": "tenant_acme", "domains": ["acme.localhost"] },
        { "id": "globex", "database_ref": "tenant_globex", "domains": ["globex.localhost"] }
    ],
    "admins": [
        { "id": "A1", "name": "Admin", "email": "admin@example.com", "password": "secret" }
    ],
    "company_users": [
        { "id": "U1", "tenant_id": "acme", "name": "Ann", "email": "ann@acme.test", "password": "pw" }
    ],
    "users": [
        { "id": "G1", "name": "Gus", "email": "gus@example.com", "password": "pw" }
    ]
}"#;

struct TestServer {
    base_url: String,
    backend: InMemoryBackend,
    config: AppConfig,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(test_config()).await
    }

    async fn spawn_with(config: AppConfig) -> Self {
        let backend = InMemoryBackend::new();
        backend.seed(&DevSeed::from_json(SEED).unwrap()).unwrap();

        // Same router as prod, over a backend the test can inspect, bound to
        // an ephemeral port.
        let app = tenantry_api::app::build_in_memory_app(&config, &backend).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            backend,
            config,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, client: &reqwest::Client, path: &str, host: Option<&str>, email: &str, password: &str) -> String {
        let mut req = client
            .post(self.url(path))
            .json(&json!({ "email": email, "password": password }));
        if let Some(host) = host {
            req = req.header(HOST, host);
        }
        let res = req.send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "login to {path} failed");
        let body: Value = res.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Sign a token with the server's own key for an arbitrary subject.
    fn mint(&self, kind: PrincipalKind, sub: &str, extra: ExtraClaims) -> String {
        let codec = TokenCodec::new(self.config.token_config(), Arc::new(InMemoryTokenBlacklist::new()));
        let profile = TokenProfile {
            binding_tag: kind.binding_tag(),
            ttl: Duration::from_secs(600),
        };
        codec
            .issue(&sub.parse::<PrincipalId>().unwrap(), &profile, extra)
            .unwrap()
            .token
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt.secret = JWT_SECRET.to_string();
    config
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn landlord_token_only_opens_landlord_routes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/auth/landlord/login"))
        .json(&json!({ "email": "admin@example.com", "password": "secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 3600);
    let token = body["access_token"].as_str().unwrap();

    let res = client
        .get(srv.url("/api/user/protected"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Unauthorized" }));

    let res = client
        .get(srv.url("/api/landlord/protected"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "user": "admin@example.com" }));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for (email, password) in [("admin@example.com", "nope"), ("ghost@example.com", "secret")] {
        let res = client
            .post(srv.url("/api/auth/landlord/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body, json!({ "error": "Unauthorized" }));
    }
}

#[tokio::test]
async fn malformed_login_body_is_unprocessable() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/auth/login"))
        .json(&json!({ "email": "gus@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for path in ["/api/landlord/protected", "/api/tenant/protected", "/api/user/protected", "/api/user"] {
        let res = client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
    }
}

#[tokio::test]
async fn forged_token_is_unauthorized() {
    let srv = TestServer::spawn().await;
    let now = Utc::now();
    let claims = json!({
        "sub": "G1",
        "iss": "tenantry",
        "iat": now.timestamp(),
        "nbf": now.timestamp(),
        "exp": (now + ChronoDuration::minutes(10)).timestamp(),
        "jti": "forged",
        "prv": PrincipalKind::GenericUser.binding_tag().as_str(),
    });
    let forged = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"some-other-secret-some-other-secret"),
    )
    .expect("failed to encode jwt");

    let res = reqwest::Client::new()
        .get(srv.url("/api/user/protected"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tenant_user_sees_its_tenant_context() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv
        .login(&client, "/api/auth/tenant/login", Some("acme.localhost"), "ann@acme.test", "pw")
        .await;

    // The token's tenant wins over the host the request was sent to.
    let res = client
        .get(srv.url("/api/tenant/check-context"))
        .header(HOST, "globex.localhost")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "tenant_id": "acme" }));

    let res = client
        .get(srv.url("/api/tenant/protected"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "user": "ann@acme.test" }));
}

#[tokio::test]
async fn tenant_login_without_tenant_is_unauthorized() {
    let srv = TestServer::spawn().await;
    let res = reqwest::Client::new()
        .post(srv.url("/api/auth/tenant/login"))
        .json(&json!({ "email": "ann@acme.test", "password": "pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_for_another_tenant_is_forbidden() {
    let srv = TestServer::spawn().await;
    let stray = srv.mint(
        PrincipalKind::TenantUser,
        "U1",
        ExtraClaims::tenant("defunct".parse().unwrap()),
    );

    let res = reqwest::Client::new()
        .get(srv.url("/api/tenant/protected"))
        .header(HOST, "acme.localhost")
        .bearer_auth(stray)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Forbidden");
    assert_eq!(body["message"], "Token not valid for this tenant");
}

#[tokio::test]
async fn tenant_token_on_another_tenants_host_cannot_refresh_me_or_logout() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv
        .login(&client, "/api/auth/tenant/login", Some("acme.localhost"), "ann@acme.test", "pw")
        .await;

    for path in ["/api/auth/refresh", "/api/auth/me"] {
        let req = if path.ends_with("refresh") { client.post(srv.url(path)) } else { client.get(srv.url(path)) };
        let res = req
            .header(HOST, "globex.localhost")
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{path}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["message"], "Token not valid for this tenant", "{path}");
    }

    let res = client
        .post(srv.url("/api/auth/logout"))
        .header(HOST, "globex.localhost")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(srv.backend.blacklist.is_empty());

    // Still usable on its own tenant.
    let res = client
        .get(srv.url("/api/auth/me"))
        .header(HOST, "acme.localhost")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.login(&client, "/api/auth/login", None, "gus@example.com", "pw").await;

    let res = client
        .post(srv.url("/api/auth/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "message": "Successfully logged out" }));

    let res = client
        .get(srv.url("/api/user/protected"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Logging out again, or without a token at all, still succeeds.
    for req in [
        client.post(srv.url("/api/auth/logout")).bearer_auth(&token),
        client.post(srv.url("/api/auth/logout")),
    ] {
        assert_eq!(req.send().await.unwrap().status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn refresh_rotates_the_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.login(&client, "/api/auth/login", None, "gus@example.com", "pw").await;

    let res = client
        .post(srv.url("/api/auth/refresh"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let fresh = body["access_token"].as_str().unwrap().to_string();
    assert_ne!(fresh, token);

    let old = client
        .get(srv.url("/api/user/protected"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

    let new = client
        .get(srv.url("/api/user/protected"))
        .bearer_auth(&fresh)
        .send()
        .await
        .unwrap();
    assert_eq!(new.status(), StatusCode::OK);

    let res = client.post(srv.url("/api/auth/refresh")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_the_principal() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv
        .login(&client, "/api/auth/landlord/login", None, "admin@example.com", "secret")
        .await;

    let res = client
        .get(srv.url("/api/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["id"], "A1");
    assert_eq!(body["email"], "admin@example.com");
    assert!(body.get("password").is_none());

    let res = client.get(srv.url("/api/auth/me")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn current_user_route_uses_the_api_guard() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.login(&client, "/api/auth/login", None, "gus@example.com", "pw").await;

    let res = client.get(srv.url("/api/user")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["name"], "Gus");
}

#[tokio::test]
async fn debug_db_reports_the_storage_scope() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/api/debug-db")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "status": "success", "connection": "landlord", "database": "landlord" })
    );

    let res = client
        .get(srv.url("/api/debug-db"))
        .header(HOST, "globex.localhost:8080")
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "status": "success", "connection": "tenant", "database": "tenant_globex" })
    );
}

#[tokio::test]
async fn every_request_returns_to_landlord_storage() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for host in ["acme.localhost", "globex.localhost", "unknown.localhost"] {
        let res = client
            .get(srv.url("/api/debug-db"))
            .header(HOST, host)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    assert_eq!(srv.backend.switch.open_activations(), 0);
    let events = srv.backend.switch.events();
    assert_eq!(
        events,
        vec![
            SwitchEvent::Tenant("tenant_acme".into()),
            SwitchEvent::Landlord,
            SwitchEvent::Tenant("tenant_globex".into()),
            SwitchEvent::Landlord,
        ]
    );
}
