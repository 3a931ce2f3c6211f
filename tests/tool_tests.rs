//! Tests for the built-in tools against mock HTTP services.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::ScriptedTransport;
use palaver::prelude::*;
use palaver::tools::default_registry;

fn config_for(server: &MockServer) -> PalaverConfig {
    PalaverConfig::builder()
        .weather_base_url(server.uri())
        .geocoding_base_url(server.uri())
        .build()
}

#[tokio::test]
async fn location_tool_geocodes_place() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Beijing"))
        .and(query_param("format", "json"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "lat": "39.9057136",
            "lon": "116.3912972",
            "display_name": "Beijing, China",
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let registry = default_registry(&config_for(&server)).unwrap();
    let message = registry
        .dispatch("tu-1", "get_lat_long", r#"{"place":"Beijing"}"#)
        .await
        .unwrap();

    assert_eq!(message.role, Role::User);
    let results = message.tool_results();
    assert!(!results[0].is_error);
    assert_eq!(
        results[0].content,
        vec![ToolResultContent::Json(json!({
            "location": {
                "latitude": "39.9057136",
                "longitude": "116.3912972",
                "display_name": "Beijing, China",
            }
        }))]
    );
}

#[tokio::test]
async fn location_tool_reports_no_match_to_the_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let registry = default_registry(&config_for(&server)).unwrap();
    let message = registry
        .dispatch("tu-1", "get_lat_long", r#"{"place":"Atlantis"}"#)
        .await
        .unwrap();

    let results = message.tool_results();
    assert!(results[0].is_error);
    assert_eq!(
        results[0].content,
        vec![ToolResultContent::Text("No location found for 'Atlantis'".into())]
    );
}

#[tokio::test]
async fn weather_tool_fetches_current_weather() {
    let server = MockServer::start().await;
    let forecast = json!({
        "latitude": 39.9,
        "longitude": 116.4,
        "current_weather": { "temperature": 25.1, "windspeed": 7.2, "weathercode": 1 },
    });
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "39.9042"))
        .and(query_param("longitude", "116.4074"))
        .and(query_param("current_weather", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let registry = default_registry(&config_for(&server)).unwrap();
    let message = registry
        .dispatch(
            "tu-2",
            "get_weather",
            r#"{"latitude":"39.9042","longitude":"116.4074"}"#,
        )
        .await
        .unwrap();

    assert_eq!(
        message.tool_results()[0].content,
        vec![ToolResultContent::Json(json!({ "weather": forecast }))]
    );
}

#[tokio::test]
async fn weather_service_failure_is_external_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let registry = default_registry(&config_for(&server)).unwrap();
    let err = registry
        .dispatch("tu-2", "get_weather", r#"{"latitude":"1","longitude":"2"}"#)
        .await
        .unwrap_err();

    match err {
        PalaverError::ExternalService { tool, message } => {
            assert_eq!(tool, "get_weather");
            assert!(message.contains("503"), "{message}");
        }
        other => panic!("expected ExternalService, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_body_is_external_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
        .mount(&server)
        .await;

    let registry = default_registry(&config_for(&server)).unwrap();
    let err = registry
        .dispatch("tu-1", "get_lat_long", r#"{"place":"Beijing"}"#)
        .await
        .unwrap_err();

    assert!(matches!(err, PalaverError::ExternalService { ref tool, .. } if tool == "get_lat_long"));
}

#[tokio::test]
async fn missing_argument_never_reaches_the_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let registry = default_registry(&config_for(&server)).unwrap();
    let err = registry
        .dispatch("tu-2", "get_weather", r#"{"latitude":"39.9042"}"#)
        .await
        .unwrap_err();

    assert!(matches!(err, PalaverError::InvalidArguments { ref tool, .. } if tool == "get_weather"));
}

#[tokio::test]
async fn beijing_conversation_over_real_tools() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "lat": "39.9042",
            "lon": "116.4074",
            "display_name": "Beijing, China",
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "39.9042"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "current_weather": { "temperature": 25.1 },
        })))
        .mount(&server)
        .await;

    let transport = ScriptedTransport::new();
    transport.queue_tool_use("tu-1", "get_lat_long", json!({ "place": "Beijing" }));
    transport.queue_tool_use(
        "tu-2",
        "get_weather",
        json!({ "latitude": "39.9042", "longitude": "116.4074" }),
    );
    transport.queue_text("It is 25.1°C in Beijing.");

    let config = config_for(&server);
    let mut conversation = Conversation::new(
        Arc::clone(&transport) as Arc<dyn ModelTransport>,
        default_registry(&config).unwrap(),
        ConversationOptions::from_config(&config),
    );

    let answer = conversation.ask("What's weather in Beijing ?").await.unwrap();

    assert_eq!(answer, "It is 25.1°C in Beijing.");
    let messages = conversation.history().messages();
    assert_eq!(messages.len(), 6);
    assert_eq!(
        messages[4].tool_results()[0].content,
        vec![ToolResultContent::Json(json!({
            "weather": { "current_weather": { "temperature": 25.1 } }
        }))]
    );
    let requests = transport.requests();
    let third_request = &requests[2];
    assert_eq!(third_request.messages.len(), 5);
    assert_eq!(third_request.model_id, "anthropic.claude-3-sonnet-20240229-v1:0");
}
