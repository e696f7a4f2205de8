pub mod utils;
pub mod stats;
pub mod models;
pub mod db;
pub mod pipeline;
pub mod api;

use std::path::PathBuf;
use std::sync::Arc;
use parking_lot::Mutex;

use crate::pipeline::notify::Notifier;
use crate::pipeline::session::{RecognitionSession, SessionConfig};
use crate::pipeline::store::SqliteStorage;

#[derive(Clone)]
pub struct AppPaths {
    pub data: PathBuf,
    pub db_path: PathBuf,
}

#[derive(Clone)]
pub struct AppState {
    pub started_at: std::time::Instant,
    pub paths: AppPaths,
    pub stats: Arc<stats::Stats>,
    pub db: Arc<Mutex<rusqlite::Connection>>,
    pub session: Arc<RecognitionSession>,
}

impl AppState {
    pub fn new(
        paths: AppPaths,
        db: rusqlite::Connection,
        session_config: SessionConfig,
        notifier: Arc<dyn Notifier>,
        stats: Arc<stats::Stats>,
    ) -> anyhow::Result<Self> {
        let db = Arc::new(Mutex::new(db));
        let storage = Arc::new(SqliteStorage::new(db.clone()));
        let session = RecognitionSession::open(session_config, storage, notifier, stats.clone())?;
        Ok(Self {
            started_at: std::time::Instant::now(),
            paths,
            stats,
            db,
            session,
        })
    }
}
