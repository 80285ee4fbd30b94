// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The single conversational session slot.
//!
//! The engine issues session ids; the relay remembers the latest one so the
//! next message resumes the same conversation. A session that has been idle
//! longer than the timeout is dropped the next time it is read.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

/// An active engine conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Engine-issued session id, passed back on resume.
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Successful engine replies in this session, at least 1.
    pub message_count: u32,
}

impl Session {
    /// Whole seconds since the session started, as of `now`.
    pub fn age_secs_at(&self, now: DateTime<Utc>) -> i64 {
        let millis = (now - self.started_at).num_milliseconds();
        (millis as f64 / 1000.0).round() as i64
    }
}

/// Holds at most one [`Session`] and expires it lazily on idle timeout.
#[derive(Debug)]
pub struct SessionManager {
    timeout: TimeDelta,
    current: Option<Session>,
}

impl SessionManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX),
            current: None,
        }
    }

    /// The active session, unless it has been idle past the timeout.
    pub fn get_session(&mut self) -> Option<&Session> {
        self.get_session_at(Utc::now())
    }

    /// [`get_session`](Self::get_session) as of `now`. Idle for exactly the
    /// timeout is still active.
    pub fn get_session_at(&mut self, now: DateTime<Utc>) -> Option<&Session> {
        let idle = now - self.current.as_ref()?.last_activity;
        if idle > self.timeout {
            info!(
                idle_secs = idle.num_seconds(),
                "session expired after inactivity"
            );
            self.current = None;
            return None;
        }
        self.current.as_ref()
    }

    pub fn start_session(&mut self, id: &str) {
        self.start_session_at(id, Utc::now());
    }

    /// Replaces any existing session with a fresh one for `id`.
    pub fn start_session_at(&mut self, id: &str, now: DateTime<Utc>) {
        self.current = Some(Session {
            id: id.to_string(),
            started_at: now,
            last_activity: now,
            message_count: 1,
        });
        info!(session_id = %id, "new session started");
    }

    pub fn update_session(&mut self, id: Option<&str>) {
        self.update_session_at(id, Utc::now());
    }

    /// Records another reply in the active session. A non-empty `id`
    /// replaces the stored one. Does nothing without an active session.
    pub fn update_session_at(&mut self, id: Option<&str>, now: DateTime<Utc>) {
        let Some(session) = self.current.as_mut() else {
            return;
        };
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            session.id = id.to_string();
        }
        session.last_activity = now;
        session.message_count += 1;
        debug!(messages = session.message_count, "session updated");
    }

    /// Clears the slot and returns what was in it.
    pub fn end_session(&mut self) -> Option<Session> {
        let session = self.current.take();
        if let Some(s) = &session {
            info!(messages = s.message_count, "session ended");
        }
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn manager() -> SessionManager {
        SessionManager::new(Duration::from_secs(30))
    }

    #[test]
    fn empty_manager_has_no_session() {
        assert!(manager().get_session_at(t0()).is_none());
    }

    #[test]
    fn start_installs_session_with_count_one() {
        let mut mgr = manager();
        mgr.start_session_at("s-1", t0());
        let session = mgr.get_session_at(t0()).unwrap();
        assert_eq!(session.id, "s-1");
        assert_eq!(session.message_count, 1);
        assert_eq!(session.started_at, t0());
    }

    #[test]
    fn session_survives_just_under_timeout() {
        let mut mgr = manager();
        mgr.start_session_at("s-1", t0());
        let now = t0() + TimeDelta::milliseconds(29_999);
        assert!(mgr.get_session_at(now).is_some());
    }

    #[test]
    fn session_at_exact_timeout_is_still_active() {
        let mut mgr = manager();
        mgr.start_session_at("s-1", t0());
        assert!(mgr.get_session_at(t0() + TimeDelta::seconds(30)).is_some());
    }

    #[test]
    fn session_expires_past_timeout_and_stays_gone() {
        let mut mgr = manager();
        mgr.start_session_at("s-1", t0());
        let now = t0() + TimeDelta::milliseconds(30_001);
        assert!(mgr.get_session_at(now).is_none());
        // Cleared, not just hidden.
        assert!(mgr.get_session_at(t0()).is_none());
    }

    #[test]
    fn update_refreshes_activity_and_counts() {
        let mut mgr = manager();
        mgr.start_session_at("s-1", t0());
        mgr.update_session_at(Some("s-2"), t0() + TimeDelta::seconds(20));

        // 45s after start but only 25s idle.
        let session = mgr
            .get_session_at(t0() + TimeDelta::seconds(45))
            .unwrap()
            .clone();
        assert_eq!(session.id, "s-2");
        assert_eq!(session.message_count, 2);
        assert_eq!(session.started_at, t0());
    }

    #[test]
    fn update_without_id_keeps_existing_id() {
        let mut mgr = manager();
        mgr.start_session_at("s-1", t0());
        mgr.update_session_at(None, t0());
        mgr.update_session_at(Some(""), t0());
        let session = mgr.get_session_at(t0()).unwrap();
        assert_eq!(session.id, "s-1");
        assert_eq!(session.message_count, 3);
    }

    #[test]
    fn update_without_session_is_a_no_op() {
        let mut mgr = manager();
        mgr.update_session_at(Some("s-1"), t0());
        assert!(mgr.get_session_at(t0()).is_none());
    }

    #[test]
    fn end_returns_and_clears() {
        let mut mgr = manager();
        assert!(mgr.end_session().is_none());

        mgr.start_session_at("s-1", t0());
        let ended = mgr.end_session().unwrap();
        assert_eq!(ended.id, "s-1");
        assert!(mgr.get_session_at(t0()).is_none());
    }

    #[test]
    fn age_rounds_to_whole_seconds() {
        let mut mgr = manager();
        mgr.start_session_at("s-1", t0());
        let session = mgr.get_session_at(t0()).unwrap();
        assert_eq!(session.age_secs_at(t0() + TimeDelta::milliseconds(12_600)), 13);
    }
}
