use super::*;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

#[test]
fn load_existing_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = load_existing_config(temp_dir.path()).expect("config loaded successfully");
    assert!(!config.embedding.host.is_empty());
    assert!(config.embedding.port > 0);
    assert!(!config.embedding.model.is_empty());
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
fn load_existing_config_ignores_broken_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "[embedding\nport = 1")
        .expect("should write config");

    let config = load_existing_config(temp_dir.path()).expect("config loaded successfully");
    assert_eq!(config.embedding, OllamaConfig::default());
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
fn show_config_renders_defaults() {
    assert!(show_config(&Config::default()).is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn connection_test_pings_ollama() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"models":[]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let url = url::Url::parse(&server.uri()).expect("mock uri should parse");
    let config = OllamaConfig {
        host: url.host_str().expect("mock uri has a host").to_string(),
        port: url.port().expect("mock uri has a port"),
        ..OllamaConfig::default()
    };

    assert!(test_ollama_connection(&config));
}

#[test]
fn connection_test_fails_without_server() {
    let config = OllamaConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        ..OllamaConfig::default()
    };

    assert!(!test_ollama_connection(&config));
}
