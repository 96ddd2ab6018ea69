use std::env;

#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database_url: String,
    pub jwt_secret: String,
    pub advisor: AdvisorConfig,
    pub blob: BlobConfig,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct AdvisorConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
}

/// S3-compatible blob store holding attachment payloads. Uploads happen out
/// of band; the service only removes objects on attachment deletion, so an
/// unset endpoint just disables that cleanup.
#[derive(Clone)]
pub struct BlobConfig {
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("invalid SERVER_PORT: {e}"))?;

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://desk:@localhost:5432/deskserver".to_string());

        // Tokens are issued by the identity provider with this shared secret.
        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;

        let advisor = AdvisorConfig {
            api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            model: env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            base_url: env::var("GEMINI_BASE_URL").ok(),
        };

        let blob = BlobConfig {
            endpoint: env::var("STORAGE_ENDPOINT").ok(),
            access_key: env::var("STORAGE_ACCESS_KEY").unwrap_or_default(),
            secret_key: env::var("STORAGE_SECRET_KEY").unwrap_or_default(),
            bucket: env::var("STORAGE_BUCKET").unwrap_or_else(|_| "attachments".to_string()),
        };

        Ok(Self {
            server: ServerConfig { host, port },
            database_url,
            jwt_secret,
            advisor,
            blob,
        })
    }
}
