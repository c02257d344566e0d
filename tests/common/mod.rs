//! Common test utilities for E2E tests

use chrono::{Duration, Utc};
use rowboard::auth::session::{Session, create_session_token};
use rowboard::data::{NewUser, User};
use rowboard::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        rowboard::metrics::init_metrics();

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                public_url: "http://localhost:3000".to_string(),
            },
            database: config::DatabaseConfig {
                url: format!("sqlite:{}", db_path.display()),
            },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_max_age: 86_400,
                google: config::GoogleOAuthConfig {
                    client_id: "test-client-id".to_string(),
                    client_secret: "test-client-secret".to_string(),
                },
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = rowboard::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a test user row in the database
    pub async fn create_test_user(&self) -> User {
        self.state
            .db
            .upsert_user(&NewUser {
                email: "tester@example.com".to_string(),
                name: Some("Test User".to_string()),
                picture: Some("https://example.com/avatar.png".to_string()),
            })
            .await
            .expect("user can be upserted")
    }

    /// Create a signed session cookie for the given user
    pub fn session_cookie_for(&self, user: &User) -> String {
        let now = Utc::now();
        let session = Session {
            email: user.email.clone(),
            name: user.name.clone(),
            picture: user.picture.clone(),
            created_at: now,
            expires_at: now + Duration::seconds(self.state.config.auth.session_max_age),
        };

        let token = create_session_token(&session, &self.state.config.auth.session_secret)
            .expect("session token can be created");

        format!("{}={}", rowboard::auth::SESSION_COOKIE, token)
    }
}
