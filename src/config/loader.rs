use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::ServerConfig;

/// Prefix of environment overrides, e.g. `COMMONAPI__ASSETS__DSN`
pub const ENV_PREFIX: &str = "COMMONAPI";

/// Load configuration from a file using the config crate
/// Supports multiple formats: YAML, JSON, TOML, etc.
/// Environment variables override file values.
pub async fn load_config(config_path: &str) -> Result<ServerConfig> {
    load_config_sync(config_path)
}

/// Load configuration synchronously
pub fn load_config_sync(config_path: &str) -> Result<ServerConfig> {
    let config_path = Path::new(config_path);

    // Determine file format based on extension
    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Toml,
    };

    let settings = Config::builder()
        .add_source(File::new(
            config_path
                .to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
            format,
        ))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("httpd.allow_origins"),
        )
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    let server_config: ServerConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })?;

    Ok(server_config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[tokio::test]
    async fn test_load_toml_config() {
        let toml_content = r#"
[httpd]
listen_addr = "127.0.0.1:9000"
allow_origins = ["https://portal.local"]
token = "t0ken"

[assets]
dsn = "server=is-db;user id=api;password=pw;port=1433;database=Intraservice"
sql_timeout_secs = 5

[customers]
dsn = "server=cm-db;user id=api;password=pw;port=1433;database=CM_INFO"

[reference]
dsn = "postgres://api:pw@ref-db:5432/evolution"
sql_timeout_secs = 3

[service_desk]
url = "https://sd.local"
user = "bot"
pass = "pw"

[health_check]
reconnect_on_failure = true
"#;

        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.httpd.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.httpd.token.as_deref(), Some("t0ken"));
        assert_eq!(config.assets.sql_timeout_secs, 5);
        assert_eq!(config.customers.sql_timeout_secs, 30);
        assert_eq!(config.reference.sql_timeout_secs, 3);
        assert_eq!(config.service_desk.http_timeout_secs, 30);
        assert_eq!(config.health_check.interval_secs, 30);
        assert!(config.health_check.reconnect_on_failure);
    }

    #[tokio::test]
    async fn test_load_yaml_config() {
        let yaml_content = r#"
httpd:
  listen_addr: "127.0.0.1:3000"
reference:
  dsn: "server=ref;database=evolution"
logging:
  level: debug
  json: false
"#;

        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.httpd.listen_addr, "127.0.0.1:3000");
        assert_eq!(config.reference.dsn, "server=ref;database=evolution");
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config_sync("/definitely/not/here.toml").is_err());
    }
}
