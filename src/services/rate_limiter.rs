//! Sliding-window limits on login attempts
//!
//! Failed logins are limited per email (5 per 15 minutes) and login
//! requests per client IP (10 per minute).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

const EMAIL_LIMIT: usize = 5;
const EMAIL_WINDOW_MINUTES: i64 = 15;
const IP_LIMIT: usize = 10;
const IP_WINDOW_MINUTES: i64 = 1;

type Attempts<K> = Arc<RwLock<HashMap<K, Vec<DateTime<Utc>>>>>;

pub struct LoginRateLimiter {
    email_attempts: Attempts<String>,
    ip_attempts: Attempts<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            email_attempts: Arc::new(RwLock::new(HashMap::new())),
            ip_attempts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Whether the email has used up its failed attempts
    pub async fn is_email_limited(&self, email: &str) -> bool {
        let cutoff = Utc::now() - Duration::minutes(EMAIL_WINDOW_MINUTES);
        let mut attempts = self.email_attempts.write().await;
        match attempts.get_mut(&email.to_lowercase()) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= EMAIL_LIMIT
            }
            None => false,
        }
    }

    pub async fn record_failed_attempt(&self, email: &str) {
        let mut attempts = self.email_attempts.write().await;
        attempts
            .entry(email.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures after a successful login
    pub async fn clear_email_attempts(&self, email: &str) {
        self.email_attempts
            .write()
            .await
            .remove(&email.to_lowercase());
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        let cutoff = Utc::now() - Duration::minutes(IP_WINDOW_MINUTES);
        let mut attempts = self.ip_attempts.write().await;
        match attempts.get_mut(&ip) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= IP_LIMIT
            }
            None => false,
        }
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        let mut attempts = self.ip_attempts.write().await;
        attempts.entry(ip).or_default().push(Utc::now());
    }

    /// Drop timestamps outside their windows and empty entries
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let email_cutoff = now - Duration::minutes(EMAIL_WINDOW_MINUTES);
        let ip_cutoff = now - Duration::minutes(IP_WINDOW_MINUTES);

        self.email_attempts.write().await.retain(|_, times| {
            times.retain(|t| *t > email_cutoff);
            !times.is_empty()
        });
        self.ip_attempts.write().await.retain(|_, times| {
            times.retain(|t| *t > ip_cutoff);
            !times.is_empty()
        });
    }

    /// Number of emails and IPs currently tracked
    pub async fn tracked(&self) -> (usize, usize) {
        (
            self.email_attempts.read().await.len(),
            self.ip_attempts.read().await.len(),
        )
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
