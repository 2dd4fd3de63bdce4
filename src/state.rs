//! Process-wide mutable state: runtime settings, activity counters and the
//! broadcast recipient registry. Nothing here survives a restart.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use teloxide::types::ChatId;

use crate::config::Config;

/// Runtime settings. Only the booleans are mutable; footer and welcome
/// template are fixed at startup. Reads are always fresh atomic loads, so a
/// toggle between schedule-fire and send is observed at send time.
pub struct Settings {
    silent_post: AtomicBool,
    anti_ban_delay: AtomicBool,
    pub forward_footer: Option<String>,
    pub welcome_message: Option<String>,
}

impl Settings {
    fn new(config: &Config) -> Self {
        Self {
            silent_post: AtomicBool::new(false),
            anti_ban_delay: AtomicBool::new(true),
            forward_footer: config.forward_footer.clone(),
            welcome_message: config.welcome_message.clone(),
        }
    }

    pub fn silent_post(&self) -> bool {
        self.silent_post.load(Ordering::Relaxed)
    }

    /// Flips the flag and returns the new value.
    pub fn toggle_silent_post(&self) -> bool {
        !self.silent_post.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn anti_ban_delay(&self) -> bool {
        self.anti_ban_delay.load(Ordering::Relaxed)
    }
}

/// Monotonic activity counters, each bumped exactly once per successful
/// operation and never on a failure path.
pub struct Stats {
    ads_sent: AtomicU64,
    forwards_done: AtomicU64,
    welcomes_sent: AtomicU64,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub ads_sent: u64,
    pub forwards_done: u64,
    pub welcomes_sent: u64,
    pub uptime: chrono::Duration,
}

impl Stats {
    fn new() -> Self {
        Self {
            ads_sent: AtomicU64::new(0),
            forwards_done: AtomicU64::new(0),
            welcomes_sent: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_ad(&self) {
        self.ads_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forward(&self) {
        self.forwards_done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_welcome(&self) {
        self.welcomes_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ads_sent: self.ads_sent.load(Ordering::Relaxed),
            forwards_done: self.forwards_done.load(Ordering::Relaxed),
            welcomes_sent: self.welcomes_sent.load(Ordering::Relaxed),
            uptime: Utc::now() - self.started_at,
        }
    }
}

pub struct AppState {
    pub config: Config,
    pub settings: Settings,
    pub stats: Stats,
    known_users: DashSet<ChatId>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let settings = Settings::new(&config);
        Self {
            config,
            settings,
            stats: Stats::new(),
            known_users: DashSet::new(),
        }
    }

    /// Registers a chat for broadcasts. Returns `true` if it was new.
    pub fn register_user(&self, chat_id: ChatId) -> bool {
        self.known_users.insert(chat_id)
    }

    pub fn user_count(&self) -> usize {
        self.known_users.len()
    }

    pub fn broadcast_recipients(&self) -> Vec<ChatId> {
        self.known_users.iter().map(|entry| *entry).collect()
    }
}
