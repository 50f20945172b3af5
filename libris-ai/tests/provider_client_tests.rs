//! Provider client tests against an in-process mock server

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use libris_ai::config::SharedApiKey;
use libris_ai::models::MediaType;
use libris_ai::services::{
    CatalogClient, ImageGenerator, ItunesClient, MusicSearch, OpenAiImageClient, OpenAiTextClient, ProviderError,
    TextGenerator, TextPrompt,
};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Serve `app` on an ephemeral port and return its base URL
async fn spawn_mock(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn chat_ok(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer sk-test") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"})));
    }
    let last = body["messages"].as_array().and_then(|m| m.last()).cloned().unwrap_or(Value::Null);
    let reply = format!("echo: {}", last["content"].as_str().unwrap_or_default());
    (
        StatusCode::OK,
        Json(json!({"choices": [{"message": {"role": "assistant", "content": reply}}]})),
    )
}

async fn chat_error() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded")
}

async fn chat_empty() -> Json<Value> {
    Json(json!({"choices": [{"message": {"role": "assistant", "content": "   "}}]}))
}

#[tokio::test]
async fn test_text_client_sends_bearer_and_returns_content() {
    let base = spawn_mock(Router::new().route("/chat/completions", post(chat_ok))).await;
    let client = OpenAiTextClient::new(SharedApiKey::new(Some("sk-test".to_string())))
        .unwrap()
        .with_base_url(&base);

    let text = client
        .generate(&TextPrompt::new("hello").with_system("be brief"))
        .await
        .unwrap();
    assert_eq!(text, "echo: hello");
}

#[tokio::test]
async fn test_text_client_maps_http_error() {
    let base = spawn_mock(Router::new().route("/chat/completions", post(chat_error))).await;
    let client = OpenAiTextClient::new(SharedApiKey::new(Some("sk-test".to_string())))
        .unwrap()
        .with_base_url(&base);

    match client.generate(&TextPrompt::new("hello")).await {
        Err(ProviderError::Api(status, body)) => {
            assert_eq!(status, 500);
            assert_eq!(body, "model overloaded");
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_text_client_rejects_blank_completion() {
    let base = spawn_mock(Router::new().route("/chat/completions", post(chat_empty))).await;
    let client = OpenAiTextClient::new(SharedApiKey::new(Some("sk-test".to_string())))
        .unwrap()
        .with_base_url(&base);

    assert!(matches!(
        client.generate(&TextPrompt::new("hello")).await,
        Err(ProviderError::Parse(_))
    ));
}

#[tokio::test]
async fn test_text_client_without_key_is_not_configured() {
    let client = OpenAiTextClient::new(SharedApiKey::new(None))
        .unwrap()
        .with_base_url("http://127.0.0.1:9");

    assert!(matches!(
        client.generate(&TextPrompt::new("hello")).await,
        Err(ProviderError::NotConfigured(_))
    ));
}

#[tokio::test]
async fn test_text_client_picks_up_key_set_later() {
    let base = spawn_mock(Router::new().route("/chat/completions", post(chat_ok))).await;
    let key = SharedApiKey::new(None);
    let client = OpenAiTextClient::new(key.clone()).unwrap().with_base_url(&base);

    key.set("sk-test".to_string()).await;
    assert_eq!(client.generate(&TextPrompt::new("hi")).await.unwrap(), "echo: hi");
}

#[tokio::test]
async fn test_image_client_decodes_b64_payload() {
    async fn images() -> Json<Value> {
        // "\x89PNG\r\n\x1a\n" base64-encoded
        Json(json!({"data": [{"b64_json": "iVBORw0KGgo="}]}))
    }
    let base = spawn_mock(Router::new().route("/images/generations", post(images))).await;
    let client = OpenAiImageClient::new(SharedApiKey::new(Some("sk-test".to_string())))
        .unwrap()
        .with_base_url(&base);

    let image = client.generate_image("a white whale").await.unwrap();
    assert_eq!(image.extension, "png");
    assert_eq!(image.bytes.len(), 8);
}

#[tokio::test]
async fn test_itunes_search_skips_incomplete_results() {
    async fn search(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        assert_eq!(params.get("entity").map(String::as_str), Some("song"));
        Json(json!({"resultCount": 2, "results": [
            {"trackName": "Sea Shanty", "artistName": "The Crew", "previewUrl": "https://p/1"},
            {"artistName": "Nameless"}
        ]}))
    }
    let base = spawn_mock(Router::new().route("/search", get(search))).await;
    let client = ItunesClient::new().unwrap().with_base_url(&base);

    let tracks = client.search_tracks("sea", 5).await.unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].title, "Sea Shanty");
    assert_eq!(tracks[0].preview_url.as_deref(), Some("https://p/1"));
}

#[tokio::test]
async fn test_catalog_book_search() {
    async fn search() -> Json<Value> {
        Json(json!({"docs": [{
            "key": "/works/OL102749W",
            "title": "Moby Dick",
            "author_name": ["Herman Melville"],
            "first_publish_year": 1851,
            "cover_i": 42
        }]}))
    }
    let base = spawn_mock(Router::new().route("/search.json", get(search))).await;
    let client = CatalogClient::new(None).unwrap().with_open_library_url(&base);

    let hits = client.search("moby dick", MediaType::Book).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].creator, "Herman Melville");
    assert_eq!(hits[0].external_id, "/works/OL102749W");
    assert_eq!(hits[0].year, Some(1851));
    assert!(hits[0].cover_url.as_deref().unwrap().ends_with("42-M.jpg"));
}

#[tokio::test]
async fn test_catalog_movie_search_needs_key() {
    let client = CatalogClient::new(None).unwrap();
    assert!(matches!(
        client.search("jaws", MediaType::Movie).await,
        Err(ProviderError::NotConfigured(_))
    ));
}
