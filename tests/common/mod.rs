#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use rusqlite::Connection;
use bus_attendance::db;
use bus_attendance::models::detection::{BoundingBox, Detection, Frame};
use bus_attendance::models::label::FeeStatus;
use bus_attendance::pipeline::notify::{Notifier, NotifyError, UnpaidNotice};
use bus_attendance::pipeline::session::{Registration, SessionConfig};
use bus_attendance::stats::Stats;
use bus_attendance::{AppPaths, AppState};

pub const DIM: usize = 128;

/// Create a temporary SQLite database for testing
pub fn setup_test_db() -> (TempDir, PathBuf, Connection) {
    let tmp = TempDir::new().unwrap();
    let db_dir = tmp.path().join("db");
    std::fs::create_dir_all(&db_dir).unwrap();
    let db_path = db_dir.join("attendance.db");
    let conn = db::open_or_create(&db_path).unwrap();
    (tmp, db_path, conn)
}

/// Records every notice; fails while `fail` is set. Each send takes
/// `delay_ms` to complete.
#[derive(Default)]
pub struct MockNotifier {
    pub sent: Mutex<Vec<UnpaidNotice>>,
    pub attempts: Mutex<usize>,
    pub fail: AtomicBool,
    pub delay_ms: AtomicU64,
}

impl MockNotifier {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn slow(delay_ms: u64) -> Self {
        let notifier = Self::default();
        notifier.delay_ms.store(delay_ms, Ordering::SeqCst);
        notifier
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_unpaid_notice(&self, notice: &UnpaidNotice) -> Result<(), NotifyError> {
        *self.attempts.lock() += 1;
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected { status: 500, body: "mock failure".to_string() });
        }
        self.sent.lock().push(notice.clone());
        Ok(())
    }
}

/// Create AppState for testing
pub fn create_test_app_state(tmp: &TempDir, db_path: PathBuf, conn: Connection, notifier: Arc<MockNotifier>) -> Arc<AppState> {
    let paths = AppPaths { data: tmp.path().to_path_buf(), db_path };
    let stats = Arc::new(Stats::new());
    Arc::new(AppState::new(paths, conn, SessionConfig::default(), notifier, stats).unwrap())
}

/// A descriptor whose components all equal `seed`. Seeds 0.1 apart are
/// more than 1.1 apart in Euclidean distance at 128 dims.
pub fn descriptor(seed: f32) -> Vec<f32> {
    vec![seed; DIM]
}

pub fn registration(name: &str, fee: FeeStatus, email: &str, seed: f32) -> Registration {
    Registration {
        name: name.to_string(),
        email: email.to_string(),
        fee,
        descriptor: Some(descriptor(seed)),
    }
}

pub fn frame_of(seeds: &[f32]) -> Frame {
    Frame {
        detections: seeds
            .iter()
            .enumerate()
            .map(|(i, &seed)| Detection {
                bbox: BoundingBox { x: 10.0 + 60.0 * i as f32, y: 20.0, width: 48.0, height: 48.0 },
                descriptor: descriptor(seed),
            })
            .collect(),
    }
}

/// Wait for a condition to become true
pub async fn wait_for_condition<F>(mut condition: F, max_attempts: usize, delay_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    use tokio::time::{sleep, Duration};
    for _ in 0..max_attempts {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(delay_ms)).await;
    }
    condition()
}

/// Helper to make HTTP requests to test server
pub struct TestClient {
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestClient {
    pub fn new(port: u16) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
        }
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(&format!("{}{}", self.base_url, path)).send().await
    }

    pub async fn post(&self, path: &str, json: &serde_json::Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(&format!("{}{}", self.base_url, path))
            .json(json)
            .send()
            .await
    }

    pub async fn delete(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.delete(&format!("{}{}", self.base_url, path)).send().await
    }
}
