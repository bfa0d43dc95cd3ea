//! Router-level tests: auth, admission, dispatch and usage recording.

mod common;

use axum::http::StatusCode;
use cg_domain::config::Config;
use cg_domain::quota::{Limit, QuotaPolicy};
use serde_json::json;

use common::{get, post_json, send, text, tool, ALICE_TOKEN, BOB_TOKEN, UPSTREAM_SECRET};

fn one_rpm() -> QuotaPolicy {
    QuotaPolicy::new(Limit::Max(1), Limit::Max(100), Limit::Max(10_000), Limit::Unlimited)
}

#[tokio::test]
async fn health_is_public() {
    let gw = common::gateway(common::secured_config(), vec![]);
    let (status, body) = send(&gw.app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chatReady"], true);
    assert_eq!(body["ledgerPersistent"], false);
}

#[tokio::test]
async fn missing_or_unknown_token_is_rejected_before_dispatch() {
    let gw = common::gateway(common::secured_config(), vec![text("calculator", 1)]);

    let (status, body) = send(&gw.app, post_json("/v1/chat", None, json!({"message": "hi"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");
    assert_eq!(body["reason"], "missing bearer token");

    let (status, body) = send(
        &gw.app,
        post_json("/v1/chat", Some("wrong"), json!({"message": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "invalid API token");

    assert_eq!(gw.provider.calls(), 0);
    assert!(gw.store.is_empty());
}

#[tokio::test]
async fn calculator_round_trip_records_usage() {
    let gw = common::gateway(
        common::secured_config(),
        vec![
            text("  Calculator ", 5),
            tool("calculator", json!({"expression": "(2 + 3) * 4"}), 11),
        ],
    );

    let (status, body) = send(
        &gw.app,
        post_json("/v1/chat", Some(ALICE_TOKEN), json!({"message": "(2 + 3) * 4 ?"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agentName"], "calculator");
    assert_eq!(body["response"], "The result of the calculation is: 20");
    assert_eq!(body["toolUsed"], "calculator");

    assert_eq!(gw.store.len(), 1);
    let (_, usage) = send(&gw.app, get("/v1/usage?range=1h", Some(ALICE_TOKEN))).await;
    assert_eq!(usage["userId"], "alice");
    assert_eq!(usage["totalRequests"], 1);
    assert_eq!(usage["totalTokens"], 16);
    assert_eq!(usage["successRate"], 100.0);
}

#[tokio::test]
async fn direct_answer_has_no_tool() {
    let gw = common::gateway(
        common::secured_config(),
        vec![text("I can only help with math and weather.", 8)],
    );
    let (status, body) = send(
        &gw.app,
        post_json("/v1/chat", Some(ALICE_TOKEN), json!({"message": "tell me a joke"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agentName"], "supervisor");
    assert_eq!(body["response"], "I can only help with math and weather.");
    assert!(body.get("toolUsed").is_none());
}

#[tokio::test]
async fn forced_agent_skips_classifier() {
    let gw = common::gateway(
        common::secured_config(),
        vec![
            tool("weather", json!({"city": "Marseille"}), 4),
            text("Clear skies in Marseille, 25°C.", 6),
        ],
    );
    let (status, body) = send(
        &gw.app,
        post_json(
            "/v1/chat",
            Some(ALICE_TOKEN),
            json!({"message": "Marseille?", "forcedAgent": "weather"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agentName"], "weather");
    assert_eq!(body["toolUsed"], "weather");
    assert_eq!(body["response"], "Clear skies in Marseille, 25°C.");
    assert_eq!(gw.provider.calls(), 2);
}

#[tokio::test]
async fn unknown_forced_agent_is_a_bad_request() {
    let gw = common::gateway(common::secured_config(), vec![]);
    let (status, body) = send(
        &gw.app,
        post_json(
            "/v1/chat",
            Some(ALICE_TOKEN),
            json!({"message": "hi", "forcedAgent": "astrologer"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("astrologer"));
    assert!(gw.store.is_empty());
}

#[tokio::test]
async fn quota_rejection_does_not_consume_quota() {
    let mut config = common::secured_config();
    config.quota.models.insert("tiny".into(), one_rpm());
    let gw = common::gateway(config, vec![text("hello there", 3)]);

    let req = || {
        post_json(
            "/v1/chat",
            Some(ALICE_TOKEN),
            json!({"message": "hi", "model": "tiny"}),
        )
    };

    let (status, _) = send(&gw.app, req()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&gw.app, req()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["reason"], "RPM_EXCEEDED");
    assert_eq!(body["quotaExceeded"], true);
    assert_eq!(body["error"], "Rate limit: requests per minute exceeded");

    // Only the admitted request reached the model and the ledger.
    assert_eq!(gw.provider.calls(), 1);
    assert_eq!(gw.store.len(), 1);

    // Quotas are per user.
    let (status, _) = send(
        &gw.app,
        post_json("/v1/chat", Some(BOB_TOKEN), json!({"message": "hi", "model": "tiny"})),
    )
    .await;
    // Bob is admitted; the script is exhausted so the dispatch itself fails.
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn agent_failure_is_500_and_recorded_as_failed() {
    let gw = common::gateway(common::secured_config(), vec![]);
    let (status, body) = send(
        &gw.app,
        post_json("/v1/chat", Some(ALICE_TOKEN), json!({"message": "2+2"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Error processing request");
    assert_eq!(body["details"], "model invocation failed");
    assert!(!body.to_string().contains(UPSTREAM_SECRET));
    assert!(!body.to_string().contains("HTTP 401"));

    assert_eq!(gw.store.len(), 1);
    let (_, usage) = send(&gw.app, get("/v1/usage", Some(ALICE_TOKEN))).await;
    assert_eq!(usage["totalRequests"], 1);
    assert_eq!(usage["totalTokens"], 0);
    assert_eq!(usage["successRate"], 0.0);
}

#[tokio::test]
async fn quotas_endpoint_reports_one_or_all() {
    let mut config = common::secured_config();
    config.quota.models.insert("tiny".into(), one_rpm());
    let gw = common::gateway(config, vec![text("hi!", 7)]);

    send(
        &gw.app,
        post_json("/v1/chat", Some(ALICE_TOKEN), json!({"message": "hi", "model": "tiny"})),
    )
    .await;

    let (status, one) = send(&gw.app, get("/v1/quotas?modelId=tiny", Some(ALICE_TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(one["model"], "tiny");
    assert_eq!(one["used"]["rpm"], 1);
    assert_eq!(one["used"]["tpd"], 7);
    assert_eq!(one["limits"]["tpd"], -1);
    assert_eq!(one["ok"], false);

    let (_, all) = send(&gw.app, get("/v1/quotas", Some(ALICE_TOKEN))).await;
    let quotas = all.as_object().unwrap();
    assert!(quotas.get("quotas").is_none());
    assert_eq!(quotas.len(), 18);
    assert_eq!(quotas["tiny"]["ok"], false);
    assert_eq!(quotas["llama-3.1-8b-instant"]["ok"], true);
}

#[tokio::test]
async fn dev_mode_charges_the_dev_user() {
    let gw = common::gateway(Config::default(), vec![text("weather", 1), text("no tool", 1)]);
    let (status, body) = send(&gw.app, post_json("/v1/chat", None, json!({"message": "Paris?"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agentName"], "weather");

    let (_, usage) = send(&gw.app, get("/v1/usage", None)).await;
    assert_eq!(usage["userId"], "local");
    assert_eq!(usage["totalRequests"], 1);
}

#[tokio::test]
async fn chat_without_provider_is_unavailable() {
    let gw = common::gateway_without_llm(common::secured_config());
    let (status, body) = send(
        &gw.app,
        post_json("/v1/chat", Some(ALICE_TOKEN), json!({"message": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["details"].is_string());
    assert!(gw.store.is_empty());

    let (_, health) = send(&gw.app, get("/health", None)).await;
    assert_eq!(health["chatReady"], false);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let gw = common::gateway(common::secured_config(), vec![]);
    let (status, _) = send(
        &gw.app,
        post_json("/v1/chat", Some(ALICE_TOKEN), json!({"message": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(gw.provider.calls(), 0);
}

#[tokio::test]
async fn tools_and_agents_are_listed() {
    let gw = common::gateway(common::secured_config(), vec![]);

    let (status, tools) = send(&gw.app, get("/v1/tools", Some(ALICE_TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = tools["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["calculator", "weather"]);

    let (_, agents) = send(&gw.app, get("/v1/agents", Some(ALICE_TOKEN))).await;
    let agents = agents["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0]["id"], "calculator");
    assert_eq!(agents[1]["tool"], "weather");
}

#[tokio::test]
async fn malformed_classifier_reply_gets_fallback_answer() {
    let gw = common::gateway_scripted(
        common::secured_config(),
        vec![common::malformed("groq")],
    );
    let (status, body) = send(
        &gw.app,
        post_json("/v1/chat", Some(ALICE_TOKEN), json!({"message": "2+2"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agentName"], "supervisor");
    assert_eq!(
        body["response"],
        "Sorry, I could not understand the supervisor's decision. Please rephrase your request."
    );
    assert!(body.get("toolUsed").is_none());

    let (_, usage) = send(&gw.app, get("/v1/usage", Some(ALICE_TOKEN))).await;
    assert_eq!(usage["totalRequests"], 1);
    assert_eq!(usage["successRate"], 100.0);
}

#[tokio::test]
async fn malformed_body_is_a_json_bad_request() {
    let gw = common::gateway(common::secured_config(), vec![]);
    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {ALICE_TOKEN}"))
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&gw.app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");
    assert!(body["details"].is_string());

    let (status, body) = send(
        &gw.app,
        post_json("/v1/chat", Some(ALICE_TOKEN), json!({"forcedAgent": "weather"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");

    assert_eq!(gw.provider.calls(), 0);
    assert!(gw.store.is_empty());
}
