//! Integration tests for the Kong Admin API client using wiremock
//!
//! These tests verify request shapes, pagination and error mapping of the
//! HTTP client against a mock Admin API.

use kong_chaos::instance::Instance;
use kong_chaos::kong::{AdminApiError, AdminClient, GatewayClient, Plugin, PluginScope};
use serde_json::json;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::{
    matchers::{
        body_json, body_partial_json, header, method, path, path_regex, query_param,
        query_param_is_missing,
    },
    Mock, MockServer, ResponseTemplate,
};

fn client_for(server: &MockServer) -> AdminClient {
    let instance = Instance::new("test-local", server.uri());
    AdminClient::new(&instance, Duration::from_secs(5), "kong-chaos-test").unwrap()
}

fn service_json(id: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "protocol": "https",
        "host": "mockbin.org",
        "port": 443,
        "path": "/request",
        "enabled": true,
        "tags": null
    })
}

#[tokio::test]
async fn test_list_services_follows_offset() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services"))
        .and(query_param("offset", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [service_json("s2", "second")],
            "offset": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services"))
        .and(query_param("size", "1000"))
        .and(query_param_is_missing("offset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [service_json("s1", "first")],
            "offset": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let services = client_for(&server).list_services().await.unwrap();

    let names: Vec<_> = services.iter().filter_map(|s| s.name.as_deref()).collect();
    assert_eq!(names, vec!["first", "second"]);
    assert!(services[0].tags.is_empty());
}

#[tokio::test]
async fn test_auth_header_and_user_agent_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/mockbin"))
        .and(header("apikey", "s3cr3t"))
        .and(header("user-agent", "kong-chaos-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(service_json("s1", "mockbin")))
        .expect(1)
        .mount(&server)
        .await;

    let instance = Instance::new("test-local", server.uri()).with_auth_header("apikey", "s3cr3t");
    let client = AdminClient::new(&instance, Duration::from_secs(5), "kong-chaos-test").unwrap();

    let service = assert_ok!(client.find_service("mockbin").await);
    assert_eq!(service.id.as_deref(), Some("s1"));
    assert_eq!(service.port, Some(443));
}

#[tokio::test]
async fn test_missing_resource_maps_to_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/consumers/nobody"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not found"})))
        .mount(&server)
        .await;

    let result = client_for(&server).find_consumer("nobody").await;
    assert!(matches!(result, Err(AdminApiError::NotFound(_))));
}

#[tokio::test]
async fn test_reserved_characters_stay_in_identifier() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/consumers/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "c-alice",
            "username": "alice"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/consumers/alice(%3F|\?)team=ops$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "c-ops",
            "username": "alice?team=ops"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);

    let consumer = assert_ok!(client.find_consumer("alice?team=ops").await);
    assert_eq!(consumer.id.as_deref(), Some("c-ops"));

    for username in ["alice#2", "ops/alice"] {
        let result = client.find_consumer(username).await;
        assert!(
            matches!(result, Err(AdminApiError::NotFound(_))),
            "consumer '{}' resolved to {:?}",
            username,
            result
        );
    }
}

#[tokio::test]
async fn test_server_error_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    match client_for(&server).list_services().await {
        Err(AdminApiError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_json_maps_to_decode() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/mockbin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let result = client_for(&server).find_service("mockbin").await;
    assert!(matches!(result, Err(AdminApiError::Decode(_))));
}

#[tokio::test]
async fn test_unreachable_server_maps_to_transport() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    drop(server);

    let result = client.list_services().await;
    assert!(matches!(result, Err(AdminApiError::Transport(_))));
}

#[tokio::test]
async fn test_route_lookup_is_scoped_to_service() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/s1/routes/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "r1",
            "name": "test",
            "paths": ["/products"],
            "hosts": ["server1"],
            "methods": ["GET"],
            "tags": ["test"],
            "service": {"id": "s1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let route = client_for(&server).find_route("s1", "test").await.unwrap();
    assert_eq!(route.service_id(), Some("s1"));
    assert_eq!(route.methods, vec!["GET".to_string()]);
}

#[tokio::test]
async fn test_plugin_create_update_delete() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/routes/r1/plugins"))
        .and(body_partial_json(json!({
            "name": "request-termination",
            "enabled": false,
            "config": {"status_code": 503}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "p1",
            "name": "request-termination",
            "enabled": false,
            "route": {"id": "r1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/routes/r1/plugins/p1"))
        .and(body_json(json!({"enabled": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p1",
            "name": "request-termination",
            "enabled": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/routes/r1/plugins/p1"))
        .respond_with(ResponseTemplate::new(204))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/routes/r1/plugins/p1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let scope = PluginScope::Route("r1");
    let mut config = serde_json::Map::new();
    config.insert("status_code".to_string(), json!(503));
    let plugin = Plugin {
        name: "request-termination".to_string(),
        config,
        ..Default::default()
    };

    let created = client.create_plugin(scope, &plugin).await.unwrap();
    assert_eq!(created.id.as_deref(), Some("p1"));

    let updated = client.update_plugin(scope, "p1", true).await.unwrap();
    assert!(updated.enabled);

    assert_ok!(client.delete_plugin(scope, "p1").await);
    assert_err!(client.delete_plugin(scope, "p1").await);
}
