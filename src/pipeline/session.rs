use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::db::FACES_STORAGE_KEY;
use crate::models::detection::{Alert, Frame, LogEntry, Overlay, RegisteredFace};
use crate::models::label::{self, FeeStatus, Identity};
use crate::pipeline::matcher::{FaceMatch, FaceMatcher, DEFAULT_MATCH_THRESHOLD};
use crate::pipeline::notify::{Notifier, UnpaidNotice};
use crate::pipeline::policy::{self, Verdict};
use crate::pipeline::store::{BlobStorage, DescriptorStore, StoreError};
use crate::pipeline::throttle::{NotificationThrottle, DEFAULT_EMAIL_COOLDOWN_SECS};
use crate::stats::Stats;
use crate::utils::config::Config;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub storage_key: String,
    pub match_threshold: f32,
    pub email_cooldown: chrono::Duration,
    pub descriptor_dim: usize,
    pub default_interval: Duration,
    pub activity_log_cap: usize,
    pub alert_visible_for: chrono::Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_key: FACES_STORAGE_KEY.to_string(),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            email_cooldown: chrono::Duration::seconds(DEFAULT_EMAIL_COOLDOWN_SECS),
            descriptor_dim: 128,
            default_interval: Duration::from_millis(2000),
            activity_log_cap: 500,
            alert_visible_for: chrono::Duration::milliseconds(4500),
        }
    }
}

impl SessionConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            match_threshold: cfg.match_threshold,
            email_cooldown: chrono::Duration::seconds(cfg.email_cooldown_secs),
            descriptor_dim: cfg.descriptor_dim,
            default_interval: Duration::from_millis(cfg.recognition_interval_ms),
            activity_log_cap: cfg.activity_log_cap,
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Enter name and parent email before capture.")]
    MissingIdentity,
    #[error("No face found. Please try again.")]
    NoFaceFound,
    #[error("No registered faces found. Register some faces first.")]
    NoRegisteredFaces,
    #[error(transparent)]
    InvalidDescriptor(StoreError),
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Storage(inner) => SessionError::Storage(inner),
            other => SessionError::InvalidDescriptor(other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub fee: FeeStatus,
    /// Absent when the detector found no face in the capture.
    pub descriptor: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutcome {
    pub label: String,
    pub name: String,
    pub fee: FeeStatus,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotifyOutcome {
    MissingEmail,
    Throttled,
    /// Handed to a background send; the activity log records the result.
    Queued,
    Sent,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Recognition {
    pub overlay: Overlay,
    pub best: FaceMatch,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotifyOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub started: bool,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecognitionStatus {
    pub running: bool,
    pub interval_ms: Option<u64>,
    pub labels: usize,
    pub throttled_recipients: usize,
    pub frame_pending: bool,
}

struct RecognitionTimer {
    handle: JoinHandle<()>,
    interval: Duration,
}

/// Everything the attendance loop needs, in one place: registered faces,
/// the matcher built from them, the email throttle, the activity log and
/// the recognition timer.
pub struct RecognitionSession {
    config: SessionConfig,
    storage: Arc<dyn BlobStorage>,
    notifier: Arc<dyn Notifier>,
    stats: Arc<Stats>,
    store: Mutex<DescriptorStore>,
    matcher: Mutex<Option<Arc<FaceMatcher>>>,
    throttle: Mutex<NotificationThrottle>,
    activity: Mutex<VecDeque<LogEntry>>,
    alert: Mutex<Option<Alert>>,
    alerts_tx: broadcast::Sender<Alert>,
    latest_frame: Mutex<Option<Frame>>,
    timer: Mutex<Option<RecognitionTimer>>,
}

impl RecognitionSession {
    pub fn open(
        config: SessionConfig,
        storage: Arc<dyn BlobStorage>,
        notifier: Arc<dyn Notifier>,
        stats: Arc<Stats>,
    ) -> anyhow::Result<Arc<Self>> {
        let store = DescriptorStore::load(storage.as_ref(), &config.storage_key, config.descriptor_dim)?;
        let (alerts_tx, _) = broadcast::channel(32);
        let session = Arc::new(Self {
            throttle: Mutex::new(NotificationThrottle::new(config.email_cooldown)),
            store: Mutex::new(store),
            matcher: Mutex::new(None),
            activity: Mutex::new(VecDeque::new()),
            alert: Mutex::new(None),
            latest_frame: Mutex::new(None),
            timer: Mutex::new(None),
            alerts_tx,
            config,
            storage,
            notifier,
            stats,
        });
        session.rebuild_matcher();
        Ok(session)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn rebuild_matcher(&self) {
        let matcher = {
            let store = self.store.lock();
            FaceMatcher::build(store.entries(), self.config.match_threshold)
        };
        match &matcher {
            Some(m) => info!(labels = m.label_count(), "face matcher built"),
            None => debug!("no registered faces; matcher cleared"),
        }
        *self.matcher.lock() = matcher.map(Arc::new);
    }

    fn current_matcher(&self) -> Option<Arc<FaceMatcher>> {
        self.matcher.lock().clone()
    }

    pub fn register(&self, reg: Registration) -> Result<RegistrationOutcome, SessionError> {
        let name = reg.name.trim().to_string();
        let email = reg.email.trim().to_string();
        if name.is_empty() || email.is_empty() {
            return Err(SessionError::MissingIdentity);
        }
        let descriptor = reg.descriptor.ok_or(SessionError::NoFaceFound)?;
        let identity = Identity { name, fee: reg.fee, email };
        let label = identity.label();

        let samples = {
            let mut store = self.store.lock();
            let samples = store.add_sample(&label, descriptor)?;
            store.save(self.storage.as_ref(), &self.config.storage_key)?;
            samples
        };
        self.rebuild_matcher();
        info!(name = %identity.name, fee = %identity.fee, samples, "registered face");

        Ok(RegistrationOutcome { label, name: identity.name, fee: identity.fee, samples })
    }

    pub fn registered(&self) -> Vec<RegisteredFace> {
        let store = self.store.lock();
        store
            .entries()
            .iter()
            .map(|entry| {
                let decoded = label::decode(&entry.label);
                RegisteredFace {
                    name: decoded.name().to_string(),
                    fee: decoded.fee().cloned(),
                    email: decoded.email().map(str::to_string),
                    samples: entry.descriptors.len(),
                }
            })
            .collect()
    }

    pub fn sample_count(&self, identity: &Identity) -> usize {
        self.store.lock().sample_count(&identity.label())
    }

    pub fn clear_all(&self) -> Result<(), SessionError> {
        {
            let mut store = self.store.lock();
            store.clear(self.storage.as_ref(), &self.config.storage_key)?;
        }
        self.rebuild_matcher();
        info!("cleared all registered faces");
        Ok(())
    }

    pub fn start_recognition(self: &Arc<Self>, interval: Option<Duration>) -> Result<StartOutcome, SessionError> {
        if self.current_matcher().is_none() {
            return Err(SessionError::NoRegisteredFaces);
        }
        let mut timer = self.timer.lock();
        if let Some(existing) = timer.as_ref() {
            return Ok(StartOutcome { started: false, interval_ms: existing.interval.as_millis() as u64 });
        }
        let period = interval.filter(|d| !d.is_zero()).unwrap_or(self.config.default_interval);
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(run_timer(weak, period));
        *timer = Some(RecognitionTimer { handle, interval: period });
        drop(timer);

        self.push_log("Recognition started", Utc::now());
        info!(interval_ms = period.as_millis() as u64, "recognition started");
        Ok(StartOutcome { started: true, interval_ms: period.as_millis() as u64 })
    }

    /// Returns false if recognition was not running. Stops future ticks
    /// only; notices already being sent run to completion.
    pub fn stop_recognition(&self) -> bool {
        let Some(timer) = self.timer.lock().take() else {
            return false;
        };
        timer.handle.abort();
        self.push_log("Recognition stopped", Utc::now());
        info!("recognition stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.timer.lock().is_some()
    }

    pub fn status(&self) -> RecognitionStatus {
        let interval_ms = self.timer.lock().as_ref().map(|t| t.interval.as_millis() as u64);
        RecognitionStatus {
            running: interval_ms.is_some(),
            interval_ms,
            labels: self.store.lock().len(),
            throttled_recipients: self.throttle.lock().tracked(),
            frame_pending: self.latest_frame.lock().is_some(),
        }
    }

    /// Replaces the frame the next timer tick will scan.
    pub fn submit_frame(&self, frame: Frame) {
        *self.latest_frame.lock() = Some(frame);
    }

    /// One timer cycle. No pending frame means the camera is idle and the
    /// tick does nothing. Notices go out on detached tasks that outlive
    /// a stop.
    pub async fn tick(self: &Arc<Self>) -> Option<Vec<Recognition>> {
        self.stats.inc_ticks();
        let pending = self.latest_frame.lock().take();
        let frame = pending?;
        let now = Utc::now();
        match self.scan(&frame, now) {
            Ok((mut results, notices)) => {
                for (idx, notice) in notices {
                    let session = Arc::clone(self);
                    tokio::spawn(async move {
                        session.deliver(notice, now).await;
                    });
                    results[idx].notification = Some(NotifyOutcome::Queued);
                }
                Some(results)
            }
            Err(e) => {
                debug!("tick skipped: {}", e);
                None
            }
        }
    }

    /// Scans one frame and waits for any notices it triggers.
    pub async fn process_frame(&self, frame: &Frame, now: DateTime<Utc>) -> Result<Vec<Recognition>, SessionError> {
        let (mut results, notices) = self.scan(frame, now)?;
        for (idx, notice) in notices {
            results[idx].notification = Some(self.deliver(notice, now).await);
        }
        Ok(results)
    }

    /// Matching, alerts and logging for a frame. Unpaid notices that pass
    /// the throttle are claimed and handed back with their result index.
    fn scan(&self, frame: &Frame, now: DateTime<Utc>) -> Result<(Vec<Recognition>, Vec<(usize, UnpaidNotice)>), SessionError> {
        let matcher = self.current_matcher().ok_or(SessionError::NoRegisteredFaces)?;
        self.stats.inc_faces_seen(frame.detections.len() as u64);

        let mut results = Vec::with_capacity(frame.detections.len());
        let mut notices = Vec::new();
        for det in &frame.detections {
            let best = matcher.find_best_match(&det.descriptor);
            let verdict = policy::decide(&best);
            let overlay = policy::overlay(det.bbox, &verdict);
            if let Some(message) = verdict.alert_message() {
                self.raise_alert(&message, now);
            }
            let mut notification = None;
            match &verdict {
                Verdict::Unknown => self.stats.inc_unknown_alerts(),
                Verdict::Unpaid { name, email } => {
                    self.stats.inc_unpaid_alerts();
                    match self.claim_notice(name, email.as_deref(), now) {
                        Ok(notice) => notices.push((results.len(), notice)),
                        Err(outcome) => notification = Some(outcome),
                    }
                }
                Verdict::Cleared { name, fee } => {
                    let fee_text = fee.as_ref().map(|f| f.as_str()).unwrap_or("");
                    self.push_log(&format!("OK: {} ({})", name, fee_text), now);
                }
            }
            results.push(Recognition { overlay, best, verdict, notification });
        }
        Ok((results, notices))
    }

    pub async fn maybe_send_unpaid(&self, student_name: &str, to_email: Option<&str>, now: DateTime<Utc>) -> NotifyOutcome {
        match self.claim_notice(student_name, to_email, now) {
            Ok(notice) => self.deliver(notice, now).await,
            Err(outcome) => outcome,
        }
    }

    fn claim_notice(&self, student_name: &str, to_email: Option<&str>, now: DateTime<Utc>) -> Result<UnpaidNotice, NotifyOutcome> {
        let Some(to_email) = to_email.filter(|e| !e.is_empty()) else {
            warn!(student = %student_name, "no email stored");
            self.push_log(&format!("No email on file for {}", student_name), now);
            return Err(NotifyOutcome::MissingEmail);
        };
        let claimed = self.throttle.lock().try_claim(to_email, now);
        if !claimed {
            self.stats.inc_emails_throttled();
            return Err(NotifyOutcome::Throttled);
        }
        Ok(UnpaidNotice { student_name: student_name.to_string(), to_email: to_email.to_string() })
    }

    /// Sends a claimed notice and settles the throttle either way.
    async fn deliver(&self, notice: UnpaidNotice, now: DateTime<Utc>) -> NotifyOutcome {
        let UnpaidNotice { student_name, to_email } = &notice;
        match self.notifier.send_unpaid_notice(&notice).await {
            Ok(()) => {
                self.throttle.lock().record_success(to_email, now);
                self.stats.inc_emails_sent();
                self.push_log(&format!("Email sent to {} for {}", to_email, student_name), now);
                info!(to = %to_email, student = %student_name, "unpaid notice sent");
                NotifyOutcome::Sent
            }
            Err(e) => {
                self.throttle.lock().release(to_email);
                self.stats.inc_emails_failed();
                self.push_log(&format!("Email failed for {} ({})", student_name, to_email), now);
                error!(to = %to_email, student = %student_name, "unpaid notice failed: {}", e);
                NotifyOutcome::Failed { error: e.to_string() }
            }
        }
    }

    fn raise_alert(&self, message: &str, now: DateTime<Utc>) {
        let alert = Alert { message: message.to_string(), raised_at: now };
        warn!(alert = %message, "alert raised");
        *self.alert.lock() = Some(alert.clone());
        // No subscribers is fine.
        let _ = self.alerts_tx.send(alert);
    }

    /// The most recent alert while it is still on screen.
    pub fn current_alert(&self, now: DateTime<Utc>) -> Option<Alert> {
        let alert = self.alert.lock();
        alert
            .as_ref()
            .filter(|a| now - a.raised_at < self.config.alert_visible_for)
            .cloned()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts_tx.subscribe()
    }

    fn push_log(&self, text: &str, at: DateTime<Utc>) {
        let mut log = self.activity.lock();
        log.push_front(LogEntry { at, text: text.to_string() });
        log.truncate(self.config.activity_log_cap);
    }

    /// Newest first.
    pub fn activity_log(&self) -> Vec<LogEntry> {
        self.activity.lock().iter().cloned().collect()
    }

    pub fn last_sent(&self, recipient: &str) -> Option<DateTime<Utc>> {
        self.throttle.lock().last_sent(recipient)
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.handle.abort();
        }
    }
}

async fn run_timer(session: Weak<RecognitionSession>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick resolves immediately; the first scan waits one period.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(session) = session.upgrade() else {
            break;
        };
        if let Some(results) = session.tick().await {
            debug!(faces = results.len(), "recognition tick");
        }
    }
}
