//! Drives `supabase_settings` over real HTTP against a mock server

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

mod common;

use common::*;
use mockito::{Matcher, Server};
use serde_json::json;
use supabase::SupabaseProvider;
use tfplug::testing::{Harness, PlanAction};
use tfplug::types::AttributePath;

#[tokio::test]
async fn create_over_http_sends_authenticated_requests() {
    init_test_logging();
    let mut server = Server::new_async().await;
    let path = |suffix: &str| project_path(PROJECT_REF, suffix);

    let put_postgres = server
        .mock("PUT", path("/config/database/postgres").as_str())
        .match_header("authorization", "Bearer sbp_test_token")
        .match_body(Matcher::Json(json!({"statement_timeout": "20s"})))
        .with_status(200)
        .with_body(r#"{"statement_timeout":"20s"}"#)
        .expect(1)
        .create_async()
        .await;
    let patch_auth = server
        .mock("PATCH", path("/config/auth").as_str())
        .match_header("authorization", "Bearer sbp_test_token")
        .match_body(Matcher::Json(json!({"jwt_exp": 1800})))
        .with_status(200)
        .with_body(r#"{"jwt_exp":1800}"#)
        .expect(1)
        .create_async()
        .await;

    let reads = [
        ("/config/database/postgres", json!({"statement_timeout": "20s", "max_connections": 60})),
        (
            "/network-restrictions",
            json!({"entitlement": "allowed", "config": {"db_allowed_cidrs": ["0.0.0.0/0"], "db_allowed_cidrs_v6": ["::/0"]}}),
        ),
        (
            "/postgrest",
            json!({"db_schema": "public,storage,graphql_public", "db_extra_search_path": "public,extensions", "max_rows": 1000}),
        ),
        (
            "/config/auth",
            json!({"site_url": "http://localhost:3000", "jwt_exp": 1800, "external_email_enabled": true}),
        ),
        ("/config/database/pgbouncer", json!({"default_pool_size": 15, "pool_mode": "transaction"})),
        ("/config/storage", json!({"file_size_limit": 52428800})),
    ];
    let mut get_mocks = vec![];
    for (suffix, body) in reads {
        get_mocks.push(
            server
                .mock("GET", path(suffix).as_str())
                .match_header("authorization", "Bearer sbp_test_token")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(body.to_string())
                .expect(1)
                .create_async()
                .await,
        );
    }

    let mut provider_config = provider_config();
    provider_config
        .set_string(&AttributePath::new("endpoint"), server.url())
        .unwrap();
    let mut provider = SupabaseProvider::new();
    let mut harness = Harness::new(&mut provider, provider_config, "supabase_settings")
        .await
        .unwrap();

    let config = settings_config(
        PROJECT_REF,
        &[
            ("database", json!({"statement_timeout": "20s"})),
            ("auth", json!({"jwt_exp": 1800})),
        ],
    );
    let action = harness.apply(&config).await.unwrap();
    assert_eq!(action, PlanAction::Create);

    put_postgres.assert_async().await;
    patch_auth.assert_async().await;
    for mock in get_mocks {
        mock.assert_async().await;
    }

    let state = harness.state().unwrap().unwrap();
    assert_eq!(block(&state, "database"), Some(json!({"statement_timeout": "20s"})));
    assert_eq!(block(&state, "auth"), Some(json!({"jwt_exp": 1800})));
    assert_eq!(
        block(&state, "network"),
        Some(json!({"restrictions": ["0.0.0.0/0", "::/0"]}))
    );
}

#[tokio::test]
async fn rejected_token_is_reported() {
    init_test_logging();
    let mut server = Server::new_async().await;
    let _unauthorized = server
        .mock("PATCH", project_path(PROJECT_REF, "/config/auth").as_str())
        .with_status(401)
        .with_body(r#"{"message":"Unauthorized"}"#)
        .create_async()
        .await;

    let mut provider_config = provider_config();
    provider_config
        .set_string(&AttributePath::new("endpoint"), server.url())
        .unwrap();
    let mut provider = SupabaseProvider::new();
    let mut harness = Harness::new(&mut provider, provider_config, "supabase_settings")
        .await
        .unwrap();

    let err = harness
        .apply(&settings_config(PROJECT_REF, &[("auth", json!({"jwt_exp": 1800}))]))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("HTTP 401"));
    assert!(harness.state().unwrap().is_none());
}
