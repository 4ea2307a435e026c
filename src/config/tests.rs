use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            ollama: OllamaConfig {
                protocol: "https".to_string(),
                host: "test-host".to_string(),
                port: 8080,
                embedding_model: "test-embed".to_string(),
                chat_model: "test-chat".to_string(),
                embedding_dimension: 512,
                temperature: 0.5,
            },
            retrieval: RetrievalConfig { top_k: 7 },
            base_dir: temp_dir.path().to_path_buf(),
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let loaded_config =
            Config::load(temp_dir.path()).expect("should load written config successfully");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [ollama
            host = "localhost"
            port = "invalid_port"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn partial_config_with_defaults() {
        let partial_toml = r#"
            [ollama]
            host = "custom-host"

            [retrieval]
            top_k = 3
        "#;

        let config: Config = toml::from_str(partial_toml).expect("should parse toml successfully");
        assert_eq!(config.ollama.host, "custom-host");
        assert_eq!(config.ollama.port, 11434);
        assert_eq!(config.ollama.embedding_model, "nomic-embed-text:latest");
        assert_eq!(config.retrieval.top_k, 3);
    }

    #[test]
    fn complete_valid_config() {
        let valid_toml = r#"
            [ollama]
            protocol = "http"
            host = "localhost"
            port = 11434
            embedding_model = "nomic-embed-text:latest"
            chat_model = "llama3.2:latest"
            embedding_dimension = 768
            temperature = 0.7

            [retrieval]
            top_k = 10
        "#;

        let config: Config = toml::from_str(valid_toml).expect("should parse toml successfully");
        assert_eq!(config.ollama.protocol, "http");
        assert_eq!(config.ollama.host, "localhost");
        assert_eq!(config.ollama.port, 11434);
        assert_eq!(config.ollama.embedding_model, "nomic-embed-text:latest");
        assert_eq!(config.ollama.chat_model, "llama3.2:latest");
        assert_eq!(config.ollama.embedding_dimension, 768);
        assert_eq!(config.retrieval.top_k, 10);
    }

    #[test]
    fn config_validation_edge_cases() {
        let config = Config {
            ollama: OllamaConfig {
                host: String::new(),
                ..OllamaConfig::default()
            },
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err()); // Empty host should be invalid
    }

    #[test]
    fn port_boundary_validation() {
        let mut config = OllamaConfig::default();

        assert!(config.set_port(1).is_ok());
        assert!(config.set_port(65535).is_ok());
        assert!(config.set_port(0).is_err());
    }

    #[test]
    fn ollama_url_generation_with_different_hosts() {
        let configs = vec![
            ("http", "localhost", 11434, "http://localhost:11434/"),
            ("http", "127.0.0.1", 8080, "http://127.0.0.1:8080/"),
            ("http", "example.com", 3000, "http://example.com:3000/"),
            (
                "https",
                "secure.example.com",
                443,
                "https://secure.example.com/",
            ),
        ];

        for (protocol, host, port, expected_url) in configs {
            let config = OllamaConfig {
                protocol: protocol.to_string(),
                host: host.to_string(),
                port,
                ..OllamaConfig::default()
            };

            let url = config.ollama_url().expect("ollama_url is ok");
            assert_eq!(url.as_str(), expected_url);
        }
    }

    #[test]
    fn model_name_validation() {
        let mut config = OllamaConfig::default();

        assert!(config.set_embedding_model("valid-model".to_string()).is_ok());
        assert!(config.set_chat_model("another_model".to_string()).is_ok());
        assert!(config.set_embedding_model(String::new()).is_err());
        assert!(config.set_chat_model("   ".to_string()).is_err()); // Only whitespace
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::InvalidProtocol("ftp".to_string()),
            ConfigError::InvalidPort(0),
            ConfigError::InvalidModel(String::new()),
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::InvalidEmbeddingDimension(0),
            ConfigError::InvalidTemperature(3.0),
            ConfigError::InvalidTopK(0),
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(!message.is_empty());
            assert!(message.len() > 10); // Ensure meaningful error messages
        }
    }
}
