//! Per-session serialization of keystroke delivery.
//!
//! A nudge types a message into an agent's pane. Two nudges to the same
//! session must never interleave their keystrokes, so each session gets a
//! single-slot lock. Slots are created on first use and kept for the life of
//! the registry; session names are reused, so the map stays small.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::backend::SessionBackend;
use crate::error::SessionError;

/// How long a nudge waits for a previous nudge to the same session.
pub const DEFAULT_NUDGE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct Slot {
    held: Mutex<bool>,
    released: Condvar,
}

impl Slot {
    fn state(&self) -> MutexGuard<'_, bool> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry of nudge locks keyed by session name.
#[derive(Debug, Default)]
pub struct NudgeLocks {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl NudgeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, session: &str) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(session.to_string()).or_default())
    }

    /// Take the session's slot, waiting at most `timeout`.
    ///
    /// Returns `false` on timeout, leaving the slot untouched.
    pub fn acquire(&self, session: &str, timeout: Duration) -> bool {
        let slot = self.slot(session);
        let held = slot.state();
        let (mut held, _) = slot
            .released
            .wait_timeout_while(held, timeout, |held| *held)
            .unwrap_or_else(PoisonError::into_inner);
        if *held {
            return false;
        }
        *held = true;
        true
    }

    /// Free the session's slot. No-op when it is not held.
    pub fn release(&self, session: &str) {
        let slot = self.slot(session);
        let mut held = slot.state();
        if *held {
            *held = false;
            slot.released.notify_one();
        }
    }

    /// Scoped acquire: the slot is released when the guard drops.
    pub fn lock(&self, session: &str, timeout: Duration) -> Option<NudgeGuard<'_>> {
        self.acquire(session, timeout).then(|| NudgeGuard {
            locks: self,
            session: session.to_string(),
        })
    }

    /// Number of sessions that have ever been locked.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holds a session's nudge slot until dropped.
#[must_use = "the nudge lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct NudgeGuard<'a> {
    locks: &'a NudgeLocks,
    session: String,
}

impl Drop for NudgeGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.session);
    }
}

/// Deliver `message` to `session` without interleaving with other nudges.
///
/// The lock is released whether or not delivery succeeds.
pub fn nudge(
    backend: &dyn SessionBackend,
    locks: &NudgeLocks,
    session: &str,
    message: &str,
    timeout: Duration,
) -> Result<(), SessionError> {
    let _guard = locks
        .lock(session, timeout)
        .ok_or_else(|| SessionError::LockTimeout {
            session: session.to_string(),
        })?;
    tracing::debug!(session, bytes = message.len(), "nudging session");
    backend.send_keys(session, message)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Instant;

    use super::*;
    use crate::types::{BackendKind, EnvironmentOverlay, SessionDescriptor};

    const MS_100: Duration = Duration::from_millis(100);
    const MS_1: Duration = Duration::from_millis(1);

    #[test]
    fn held_lock_blocks_second_acquire() {
        let locks = NudgeLocks::new();
        let session = "test-nudge-lock";

        assert!(locks.acquire(session, MS_100), "first acquire");
        assert!(!locks.acquire(session, MS_1), "acquire while held");

        locks.release(session);
        assert!(locks.acquire(session, MS_100), "acquire after release");
        locks.release(session);
    }

    #[test]
    fn release_without_hold_is_noop() {
        let locks = NudgeLocks::new();
        locks.release("never-locked");
        locks.release("never-locked");
        assert!(locks.acquire("never-locked", MS_1));
    }

    #[test]
    fn sessions_are_independent() {
        let locks = NudgeLocks::new();
        assert!(locks.acquire("a", MS_1));
        assert!(locks.acquire("b", MS_1));
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn guard_releases_on_drop() {
        let locks = NudgeLocks::new();
        {
            let _guard = locks.lock("s", MS_1).expect("free slot");
            assert!(!locks.acquire("s", MS_1));
        }
        assert!(locks.acquire("s", MS_1));
    }

    #[test]
    fn waiter_wakes_when_holder_releases() {
        let locks = Arc::new(NudgeLocks::new());
        assert!(locks.acquire("s", MS_1));

        let waiter = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || locks.acquire("s", Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(50));
        locks.release("s");
        assert!(waiter.join().expect("waiter thread"));
    }

    #[test]
    fn timeout_is_honored() {
        let locks = NudgeLocks::new();
        assert!(locks.acquire("s", MS_1));
        let start = Instant::now();
        assert!(!locks.acquire("s", Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    /// Backend that only counts keystroke deliveries.
    struct KeysOnly {
        calls: AtomicUsize,
        fail: bool,
    }

    impl SessionBackend for KeysOnly {
        fn kind(&self) -> BackendKind {
            BackendKind::Tmux
        }
        fn create_session(&self, _: &str, _: &Path) -> Result<(), SessionError> {
            unimplemented!()
        }
        fn create_session_with_command(&self, _: &str, _: &Path, _: &str) -> Result<(), SessionError> {
            unimplemented!()
        }
        fn create_session_with_command_and_env(
            &self,
            _: &str,
            _: &Path,
            _: &str,
            _: &EnvironmentOverlay,
        ) -> Result<(), SessionError> {
            unimplemented!()
        }
        fn destroy_session(&self, _: &str) -> Result<(), SessionError> {
            unimplemented!()
        }
        fn destroy_session_with_processes(&self, _: &str) -> Result<(), SessionError> {
            unimplemented!()
        }
        fn session_exists(&self, _: &str) -> Result<bool, SessionError> {
            Ok(true)
        }
        fn list_session_names(&self) -> Result<Vec<String>, SessionError> {
            Ok(Vec::new())
        }
        fn list_session_details(&self) -> Result<Vec<SessionDescriptor>, SessionError> {
            Ok(Vec::new())
        }
        fn send_keys(&self, _: &str, _: &str) -> Result<(), SessionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SessionError::SessionNotFound)
            } else {
                Ok(())
            }
        }
        fn capture_pane(&self, _: &str, _: u32) -> Result<String, SessionError> {
            Ok(String::new())
        }
        fn set_environment(&self, _: &str, _: &str, _: &str) -> Result<(), SessionError> {
            Ok(())
        }
        fn get_environment(&self, _: &str, _: &str) -> Result<String, SessionError> {
            Ok(String::new())
        }
        fn is_agent_alive(&self, _: &str) -> bool {
            true
        }
        fn session_idle(&self, _: &str) -> Option<Duration> {
            None
        }
        fn is_available(&self) -> bool {
            true
        }
    }

    #[test]
    fn nudge_delivers_and_releases() {
        let backend = KeysOnly {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let locks = NudgeLocks::new();
        nudge(&backend, &locks, "s", "hello", MS_100).expect("delivered");
        nudge(&backend, &locks, "s", "again", MS_100).expect("delivered");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_delivery_still_releases() {
        let backend = KeysOnly {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let locks = NudgeLocks::new();
        let err = nudge(&backend, &locks, "s", "hello", MS_100).unwrap_err();
        assert!(err.is_not_found());
        assert!(locks.acquire("s", MS_1), "lock leaked after failure");
    }

    #[test]
    fn held_lock_reports_timeout_naming_session() {
        let backend = KeysOnly {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let locks = NudgeLocks::new();
        assert!(locks.acquire("busy", MS_1));
        let err = nudge(&backend, &locks, "busy", "hello", MS_1).unwrap_err();
        assert!(matches!(err, SessionError::LockTimeout { ref session } if session == "busy"));
        assert!(err.to_string().contains("previous nudge may be hung"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}
