use super::*;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, method, path},
};

fn config_for(server: &MockServer) -> GenerationConfig {
    GenerationConfig {
        endpoint: format!("{}/api/generate", server.uri()),
        model: "qwen2.5:3b".to_string(),
        ..GenerationConfig::default()
    }
}

#[test]
fn generator_configuration() {
    let generator = OllamaGenerator::new(&GenerationConfig::default())
        .expect("default config should build")
        .with_model("llama3.2:1b");

    assert_eq!(generator.model(), "llama3.2:1b");
    assert_eq!(generator.endpoint().path(), "/api/generate");
    assert_eq!(generator.http.retry_attempts(), 1);
}

#[test]
fn invalid_endpoint_is_a_config_error() {
    let config = GenerationConfig {
        endpoint: "not a url".to_string(),
        ..GenerationConfig::default()
    };

    assert!(matches!(
        OllamaGenerator::new(&config),
        Err(RagError::Config(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn returns_response_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(json!({
            "model": "qwen2.5:3b",
            "prompt": "Question: Q?\nAnswer:",
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "42"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut generator = OllamaGenerator::new(&config_for(&server)).expect("generator should build");
    let answer = generator
        .generate("Question: Q?\nAnswer:")
        .expect("generation should succeed");

    assert_eq!(answer, "42");
}

#[tokio::test(flavor = "multi_thread")]
async fn extra_response_fields_are_ignored() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "qwen2.5:3b",
            "response": "GUJARAT",
            "done": true,
            "eval_count": 3
        })))
        .mount(&server)
        .await;

    let mut generator = OllamaGenerator::new(&config_for(&server)).expect("generator should build");
    assert_eq!(generator.generate("Which state?").expect("generate"), "GUJARAT");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_is_a_service_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let mut generator = OllamaGenerator::new(&config_for(&server)).expect("generator should build");

    let result = generator.generate("Q?");
    assert!(matches!(result, Err(RagError::GenerationService(message)) if message.contains("500")));
}

#[tokio::test(flavor = "multi_thread")]
async fn client_error_is_a_service_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "model not found"})))
        .mount(&server)
        .await;

    let mut generator = OllamaGenerator::new(&config_for(&server)).expect("generator should build");

    assert!(matches!(
        generator.generate("Q?"),
        Err(RagError::GenerationService(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_response_field_is_a_service_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
        .mount(&server)
        .await;

    let mut generator = OllamaGenerator::new(&config_for(&server)).expect("generator should build");

    assert!(matches!(
        generator.generate("Q?"),
        Err(RagError::GenerationService(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn retries_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let mut generator = OllamaGenerator::new(&config_for(&server))
        .expect("generator should build")
        .with_retry_attempts(3)
        .with_retry_delay(Duration::from_millis(1));

    assert!(generator.generate("Q?").is_err());
}
