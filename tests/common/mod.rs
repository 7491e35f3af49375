use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use autoapply::config::Config;
use autoapply::models::{ApplicationTask, Platform, TimelineEntry};
use autoapply::notify::Notifier;
use autoapply::session::{AutomationSession, SessionError, SessionFactory};
use autoapply::state::SharedState;
use autoapply::worker;

/// A running test server with a dedicated test database, a scripted
/// automation-session fake, and a recording notifier.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub state: SharedState,
    pub sessions: Arc<ScriptedSessionFactory>,
    pub notifier: Arc<RecordingNotifier>,
}

// ── Scripted automation session ─────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub enum FakeOutcome {
    Submit,
    Captcha,
    NetworkError,
    PostingClosed,
    AccountRequired,
    /// `submit` never resolves, to exercise the attempt timeout.
    Hang,
}

/// Hands each opened session the next scripted outcome; defaults to a clean
/// submission when the script runs dry. Counts opened and closed sessions.
pub struct ScriptedSessionFactory {
    script: Mutex<VecDeque<FakeOutcome>>,
    pub opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

impl ScriptedSessionFactory {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn push(&self, outcome: FakeOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for ScriptedSessionFactory {
    async fn open(&self, _platform: Platform) -> Result<Box<dyn AutomationSession>, SessionError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FakeOutcome::Submit);
        Ok(Box::new(FakeSession {
            behavior,
            closed: self.closed.clone(),
        }))
    }
}

struct FakeSession {
    behavior: FakeOutcome,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl AutomationSession for FakeSession {
    async fn navigate(&self, _url: &str) -> Result<(), SessionError> {
        match self.behavior {
            FakeOutcome::PostingClosed => Err(SessionError::PostingClosed),
            FakeOutcome::NetworkError => Err(SessionError::Network("connection reset".to_string())),
            _ => Ok(()),
        }
    }

    async fn fill_field(&self, _selector: &str, _value: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn submit(&self) -> Result<(), SessionError> {
        match self.behavior {
            FakeOutcome::AccountRequired => Err(SessionError::AccountRequired),
            FakeOutcome::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            _ => Ok(()),
        }
    }

    async fn screenshot(&self) -> Result<String, SessionError> {
        Ok("blob://test/shot".to_string())
    }

    async fn detect_captcha(&self) -> Result<bool, SessionError> {
        Ok(matches!(self.behavior, FakeOutcome::Captcha))
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Recording notifier ──────────────────────────────────────────

pub struct RecordingNotifier {
    events: Mutex<Vec<(Uuid, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<(Uuid, String)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn task_terminal(&self, task: &ApplicationTask) {
        self.events
            .lock()
            .unwrap()
            .push((task.id, task.status.clone()));
    }
}

// ── Harness ─────────────────────────────────────────────────────

fn test_config(database_url: String) -> Config {
    Config {
        database_url,
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to a random port
        log_level: "warn".to_string(),
        session_base_url: None,
        notify_url: None,
        worker_count: 1,
        poll_interval: Duration::from_millis(50),
        session_timeout: Duration::from_secs(30),
        lease_duration: Duration::from_secs(300),
        max_attempts: 5,
        // Zero backoff keeps retried tasks immediately eligible in tests.
        backoff_base: Duration::ZERO,
        backoff_cap: Duration::from_secs(3600),
        captcha_retry_delay: Duration::ZERO,
        rate_denied_delay: Duration::from_secs(60),
        rate_capacity: 100,
        rate_refill_per_minute: 0.0,
        rate_overrides: HashMap::new(),
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Spawn a test app with a fresh temporary database.
pub async fn spawn_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let db_name = format!("autoapply_test_{}", Uuid::now_v7().to_string().replace('-', ""));

    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    let mut config = test_config(test_url);
    configure(&mut config);

    let sessions = Arc::new(ScriptedSessionFactory::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let (app, state) = autoapply::build_app(
        pool.clone(),
        config,
        sessions.clone(),
        notifier.clone(),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::new();

    TestApp {
        addr,
        pool,
        client,
        db_name,
        state,
        sessions,
        notifier,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Seed a settings row the way the external settings store would.
    pub async fn seed_settings(&self, user_id: Uuid, enabled: bool, cap: i32) {
        sqlx::query(
            "INSERT INTO auto_apply_settings
                 (user_id, enabled, resume_id, max_applications_per_day)
             VALUES ($1, $2, 'R9', $3)",
        )
        .bind(user_id)
        .bind(enabled)
        .bind(cap)
        .execute(&self.pool)
        .await
        .expect("Failed to seed settings");
    }

    pub async fn start(&self, user_id: Uuid) -> StatusCode {
        self.client
            .post(self.url(&format!("/api/v1/users/{user_id}/auto-apply/start")))
            .send()
            .await
            .expect("start request failed")
            .status()
    }

    pub async fn stop(&self, user_id: Uuid) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(&format!("/api/v1/users/{user_id}/auto-apply/stop")))
            .send()
            .await
            .expect("stop request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Create a task via the intake endpoint, return (body, status).
    pub async fn create_task(
        &self,
        user_id: Uuid,
        job_id: &str,
        apply_url: &str,
    ) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/v1/tasks"))
            .json(&json!({
                "user_id": user_id,
                "job_id": job_id,
                "job_snapshot": { "apply_url": apply_url, "title": "Engineer" },
                "resume_snapshot": { "full_name": "Ada Lovelace", "email": "ada@example.com" },
            }))
            .send()
            .await
            .expect("create task failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Drive the worker loop deterministically for the given platforms.
    pub async fn run_workers(&self, platforms: &[Platform]) -> usize {
        worker::process_ready(&self.state, platforms)
            .await
            .expect("worker processing failed")
    }

    pub async fn task_row(&self, id: Uuid) -> ApplicationTask {
        sqlx::query_as::<_, ApplicationTask>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .expect("task not found")
    }

    pub async fn timeline(&self, id: Uuid) -> Vec<TimelineEntry> {
        sqlx::query_as::<_, TimelineEntry>(
            "SELECT * FROM task_timeline WHERE task_id = $1 ORDER BY seq ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .expect("timeline query failed")
    }

    pub async fn get_json(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

/// Drop the test database after tests complete.
pub async fn cleanup(app: TestApp) {
    let db_name = app.db_name.clone();
    app.pool.close().await;

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}
