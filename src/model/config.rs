use clap::{Parser, command};
use serde::{Deserialize, Serialize};

/**
 * Command-line arguments for the application.
 */
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct ApplicationArguments {
    /**
     * Path to the configuration file.
     */
    #[arg(short, long)]
    pub config_file: String,
}

/**
 * Represents the configuration for the application.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /**
     * Logging configuration for the application.
     */
    pub logging: LoggingConfig,
    /**
     * Security configuration for the application.
     */
    pub security: AppSecurity,
    /**
     * Server configuration for the application.
     */
    pub server: Server,
    /**
     * Database configuration for the application.
     */
    pub database: Database,
    /**
     * External statistics API.
     */
    pub upstream: Upstream,
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /**
     * Whether to log the target of the log message.
     */
    pub target: bool,
    /**
     * Whether to log thread IDs .
     */
    pub thread_ids: bool,
    /**
     * Whether to log thread names.
     */
    pub thread_names: bool,
    /**
     * Whether to log line numbers.
     */
    pub line_number: bool,
    /**
     * Whether to log the log level.
     */
    pub level: bool,
    /**
     * Whether to use ANSI colors in logs.
     */
    pub ansi: bool,
    /**
     * Whether to log the source file.
     */
    pub file: bool,
    /**
     * Path to the log file. Empty means stdout only.
     */
    pub logfile: String,
    /**
     * Additional directives for logging configuration, e.g. `sqlx=warn`.
     */
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            target: true,
            thread_ids: true,
            thread_names: true,
            line_number: true,
            level: true,
            ansi: true,
            file: true,
            logfile: "/tmp/infodengue_api.log".to_string(),
            directives: vec![],
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    /**
     * Type of the database (e.g., `PostgreSQL`).
     */
    pub db_type: DatabaseType,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DatabaseType {
    /**
     * `PostgreSQL` database type. Timeouts are in milliseconds.
     */
    #[serde(rename_all = "camelCase")]
    Postgresql { connection_string: String, max_connections: u32, min_connections: u32, acquire_timeout: u64, acquire_slow_threshold: u64, idle_timeout: u64, max_lifetime: u64 },
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSecurity {
    /**
     * Token signing and lifetime.
     */
    pub jwt: JwtConfig,
    /**
     * The single credential pair accepted by the login endpoint.
     */
    pub administrator: AdministratorCredential,
    /**
     * Require a bearer token on the epidemiological data and log endpoints as well.
     * Off by default, which leaves those endpoints public.
     */
    #[serde(default)]
    pub protect_data_endpoints: bool,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtConfig {
    /**
     * Shared secret used for signing and verifying tokens.
     */
    pub secret: String,
    /**
     * HMAC algorithm, one of HS256, HS384 or HS512.
     */
    pub algorithm: String,
    /**
     * Token lifetime in minutes.
     */
    pub expiration_minutes: i64,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AdministratorCredential {
    pub email: String,
    pub password: String,
    /**
     * Role claim put into issued tokens.
     */
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "admin".to_string()
}

/**
 * Represents the server configuration for the application.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    /**
     * Number of worker threads for the server.
     */
    pub workers: usize,
    /**
     * HTTP port for the server.
     */
    pub http_port: Option<u16>,
    /**
     * HTTPS configuration for the server.
     */
    pub https_config: Option<HttpsConfig>,
}

/**
 * Represents the HTTPS configuration for the server.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpsConfig {
    /**
     * Port for the HTTPS server.
     */
    pub port: u16,
    /**
     * Path to the certificate file.
     */
    pub certificate_file: String,
    /**
     * Path to the private key file.
     */
    pub private_key_file: String,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upstream {
    /**
     * Endpoint of the external epidemiological data API. Query parameters are appended to it.
     */
    pub base_url: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = Config {
            logging: LoggingConfig::default(),
            database: Database {
                db_type: DatabaseType::Postgresql {
                    connection_string: "".to_string(),
                    max_connections: 5,
                    min_connections: 1,
                    acquire_timeout: 30,
                    acquire_slow_threshold: 60,
                    idle_timeout: 300,
                    max_lifetime: 3600,
                },
            },
            security: AppSecurity {
                jwt: JwtConfig { secret: "secret".to_string(), algorithm: "HS256".to_string(), expiration_minutes: 60 },
                administrator: AdministratorCredential { email: "admin@infodengue.org".to_string(), password: "password".to_string(), role: "admin".to_string() },
                protect_data_endpoints: true,
            },
            server: Server { workers: 4, http_port: Some(8080), https_config: None },
            upstream: Upstream { base_url: "https://info.dengue.mat.br/api/alertcity".to_string() },
        };
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config.logging.target, deserialized.logging.target);
        assert_eq!(config.logging.logfile, deserialized.logging.logfile);
        assert_eq!(config.logging.directives, deserialized.logging.directives);
        assert_eq!(config.server.workers, deserialized.server.workers);
        assert_eq!(config.server.http_port, deserialized.server.http_port);
        assert!(deserialized.server.https_config.is_none());
        assert_eq!(deserialized.security.jwt.expiration_minutes, 60);
        assert_eq!(deserialized.security.administrator, config.security.administrator);
        assert!(deserialized.security.protect_data_endpoints);
        assert_eq!(deserialized.upstream.base_url, config.upstream.base_url);
    }

    #[test]
    fn test_config_defaults() {
        let config: Config = toml::from_str(
            r#"
            [logging]
            target = true
            thread_ids = false
            thread_names = false
            line_number = false
            level = true
            ansi = false
            file = false
            logfile = ""
            directives = []

            [security.jwt]
            secret = "secret"
            algorithm = "HS256"
            expirationMinutes = 30

            [security.administrator]
            email = "admin@infodengue.org"
            password = "password"

            [server]
            workers = 2
            httpPort = 8080

            [database.dbType.postgresql]
            connectionString = "postgres://localhost/infodengue"
            maxConnections = 5
            minConnections = 1
            acquireTimeout = 3000
            acquireSlowThreshold = 1000
            idleTimeout = 60000
            maxLifetime = 600000

            [upstream]
            baseUrl = "http://localhost:9000/dados"
            "#,
        )
        .unwrap();
        assert_eq!(config.security.administrator.role, "admin");
        assert!(!config.security.protect_data_endpoints);
        assert_eq!(config.server.http_port, Some(8080));
    }
}
