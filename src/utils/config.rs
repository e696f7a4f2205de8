use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub api_url: String,
    pub service_id: String,
    pub template_id: String,
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    pub sender_name: String,
    pub reply_email: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub data: PathBuf,
    pub port: u16,
    pub match_threshold: f32,
    pub email_cooldown_secs: i64,
    pub recognition_interval_ms: u64,
    pub descriptor_dim: usize,
    pub activity_log_cap: usize,
    pub email: EmailConfig,
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        let data = env::var("BUS_DATA").unwrap_or_else(|_| "./bus-data".to_string());
        let port = env::var("BUS_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(9170);
        let match_threshold = env::var("BUS_MATCH_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(0.6);
        let email_cooldown_secs = env::var("BUS_EMAIL_COOLDOWN_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(300);
        let recognition_interval_ms = env::var("BUS_RECOGNITION_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).filter(|v| *v > 0).unwrap_or(2000);
        let descriptor_dim = env::var("BUS_DESCRIPTOR_DIM").ok().and_then(|v| v.parse().ok()).unwrap_or(128);
        let activity_log_cap = env::var("BUS_ACTIVITY_LOG_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(500);
        let email = EmailConfig {
            api_url: env::var("EMAILJS_API_URL").unwrap_or_else(|_| "https://api.emailjs.com".to_string()),
            service_id: non_empty("EMAILJS_SERVICE_ID").unwrap_or_default(),
            template_id: non_empty("EMAILJS_TEMPLATE_ID").unwrap_or_default(),
            public_key: non_empty("EMAILJS_PUBLIC_KEY"),
            private_key: non_empty("EMAILJS_PRIVATE_KEY"),
            sender_name: env::var("BUS_SENDER_NAME").unwrap_or_else(|_| "Bus Attendance System".to_string()),
            reply_email: env::var("BUS_REPLY_EMAIL").unwrap_or_else(|_| "noreply@kongu.edu".to_string()),
            timeout_secs: env::var("EMAILJS_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(15),
        };
        Self {
            data: PathBuf::from(data),
            port,
            match_threshold,
            email_cooldown_secs,
            recognition_interval_ms,
            descriptor_dim,
            activity_log_cap,
            email,
        }
    }
}
