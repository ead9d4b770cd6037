//! The single mutual-exclusion slot.
//!
//! At most one remote peer holds the lock. A holder stays valid while it
//! keeps refreshing; once `timeout` passes without a refresh the lock is
//! stale and the next acquisition attempt (or an explicit
//! [`LockManager::check_and_expire`]) clears it.
//!
//! Queries never mutate. Every mutation, including expiry, happens under the
//! same mutex, so a peer can never be granted a lock that another thread is
//! expiring at the same moment.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crypta_types::PeerAddress;
use tracing::{debug, info};
use uuid::Uuid;

/// Default validity of a lock without refresh.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
struct Holder {
    address: PeerAddress,
    session: Uuid,
    last_refresh: Instant,
}

#[derive(Debug, Default)]
struct LockState {
    // Locked iff a holder is present.
    holder: Option<Holder>,
}

/// Outcome of [`LockManager::try_set_lock`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acquisition {
    /// The caller now holds the lock. `expired` is a previous holder whose
    /// stale lock was cleared to make room.
    Granted {
        session: Uuid,
        expired: Option<PeerAddress>,
    },
    /// Another peer validly holds the lock.
    Denied { holder: PeerAddress },
}

impl Acquisition {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Point-in-time view of the lock, for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockSnapshot {
    pub holder: Option<PeerAddress>,
    pub session: Option<Uuid>,
    pub since_refresh: Option<Duration>,
    pub valid: bool,
}

pub struct LockManager {
    timeout: Duration,
    state: Mutex<LockState>,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            state: Mutex::new(LockState::default()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        // Every critical section leaves the state consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_valid(&self, holder: &Holder, now: Instant) -> bool {
        now.saturating_duration_since(holder.last_refresh) < self.timeout
    }

    fn expire(&self, state: &mut LockState, now: Instant) -> Option<PeerAddress> {
        let stale = state
            .holder
            .as_ref()
            .is_some_and(|h| !self.is_valid(h, now));
        if !stale {
            return None;
        }
        let expired = state.holder.take()?;
        info!(
            peer = %expired.address.short(),
            session = %expired.session,
            "sync lock expired"
        );
        Some(expired.address)
    }

    /// True iff a holder is set and it refreshed within the timeout.
    pub fn is_locked(&self) -> bool {
        let state = self.state();
        state
            .holder
            .as_ref()
            .is_some_and(|h| self.is_valid(h, Instant::now()))
    }

    /// True iff the lock is valid and held by `address`.
    pub fn is_holder(&self, address: &PeerAddress) -> bool {
        let state = self.state();
        state
            .holder
            .as_ref()
            .is_some_and(|h| h.address == *address && self.is_valid(h, Instant::now()))
    }

    /// Current holder, even if its lock went stale and was not cleared yet.
    pub fn holder(&self) -> Option<PeerAddress> {
        self.state().holder.as_ref().map(|h| h.address.clone())
    }

    /// Clear a stale lock. Returns the evicted holder.
    pub fn check_and_expire(&self) -> Option<PeerAddress> {
        let mut state = self.state();
        self.expire(&mut state, Instant::now())
    }

    /// Grant the lock to `address` unless another peer validly holds it.
    ///
    /// Re-locking by the current holder refreshes its timer and keeps the
    /// session.
    pub fn try_set_lock(&self, address: &PeerAddress) -> Acquisition {
        let now = Instant::now();
        let mut state = self.state();
        let expired = self.expire(&mut state, now);

        if let Some(holder) = state.holder.as_mut() {
            if holder.address != *address {
                return Acquisition::Denied {
                    holder: holder.address.clone(),
                };
            }
            holder.last_refresh = now;
            return Acquisition::Granted {
                session: holder.session,
                expired,
            };
        }

        let session = Uuid::now_v7();
        state.holder = Some(Holder {
            address: address.clone(),
            session,
            last_refresh: now,
        });
        info!(peer = %address.short(), %session, "sync lock granted");
        Acquisition::Granted { session, expired }
    }

    /// Slide the window for `address` if it is the holder.
    ///
    /// Does not check the timeout: a confirmed holder may run past it as
    /// long as no rival acquisition intervened.
    pub fn refresh(&self, address: &PeerAddress) -> bool {
        let mut state = self.state();
        match state.holder.as_mut() {
            Some(h) if h.address == *address => {
                h.last_refresh = Instant::now();
                true
            }
            _ => false,
        }
    }

    /// Clear the lock iff `address` is the holder.
    pub fn release(&self, address: &PeerAddress) -> bool {
        let mut state = self.state();
        if !state.holder.as_ref().is_some_and(|h| h.address == *address) {
            return false;
        }
        if let Some(h) = state.holder.take() {
            debug!(peer = %address.short(), session = %h.session, "sync lock released");
        }
        true
    }

    /// Unconditionally unlock. Returns the previous holder.
    pub fn clear(&self) -> Option<PeerAddress> {
        self.state().holder.take().map(|h| h.address)
    }

    pub fn snapshot(&self) -> LockSnapshot {
        let now = Instant::now();
        let state = self.state();
        match &state.holder {
            Some(h) => LockSnapshot {
                holder: Some(h.address.clone()),
                session: Some(h.session),
                since_refresh: Some(now.saturating_duration_since(h.last_refresh)),
                valid: self.is_valid(h, now),
            },
            None => LockSnapshot {
                holder: None,
                session: None,
                since_refresh: None,
                valid: false,
            },
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("timeout", &self.timeout)
            .field("holder", &self.holder())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread::sleep;

    fn addr(s: &str) -> PeerAddress {
        PeerAddress::new(s).unwrap()
    }

    #[test]
    fn starts_unlocked() {
        let lock = LockManager::default();
        assert!(!lock.is_locked());
        assert!(lock.holder().is_none());
        assert!(!lock.snapshot().valid);
    }

    #[test]
    fn grant_then_deny_rival() {
        let lock = LockManager::default();
        let a = addr("peer-a");
        let b = addr("peer-b");
        assert!(lock.try_set_lock(&a).is_granted());
        assert_eq!(lock.try_set_lock(&b), Acquisition::Denied { holder: a.clone() });
        assert!(lock.is_holder(&a));
        assert!(!lock.is_holder(&b));
    }

    #[test]
    fn relock_keeps_session() {
        let lock = LockManager::default();
        let a = addr("peer-a");
        let Acquisition::Granted { session: first, .. } = lock.try_set_lock(&a) else {
            panic!("expected grant");
        };
        let Acquisition::Granted { session: second, expired } = lock.try_set_lock(&a) else {
            panic!("expected grant");
        };
        assert_eq!(first, second);
        assert!(expired.is_none());
    }

    #[test]
    fn lock_expires_without_refresh() {
        let lock = LockManager::new(Duration::from_millis(30));
        let a = addr("peer-a");
        lock.try_set_lock(&a);
        sleep(Duration::from_millis(60));
        assert!(!lock.is_locked());
        assert!(!lock.is_holder(&a));
        // Queries do not clear; the explicit expiry does.
        assert_eq!(lock.holder(), Some(a.clone()));
        assert_eq!(lock.check_and_expire(), Some(a));
        assert!(lock.holder().is_none());
        assert!(lock.check_and_expire().is_none());
    }

    #[test]
    fn stale_holder_is_evicted_by_rival() {
        let lock = LockManager::new(Duration::from_millis(30));
        let a = addr("peer-a");
        let b = addr("peer-b");
        lock.try_set_lock(&a);
        sleep(Duration::from_millis(60));
        match lock.try_set_lock(&b) {
            Acquisition::Granted { expired, .. } => assert_eq!(expired, Some(a)),
            other => panic!("expected grant, got {other:?}"),
        }
        assert!(lock.is_holder(&b));
    }

    #[test]
    fn refresh_extends_validity() {
        let lock = LockManager::new(Duration::from_millis(200));
        let a = addr("peer-a");
        lock.try_set_lock(&a);
        for _ in 0..6 {
            sleep(Duration::from_millis(50));
            assert!(lock.refresh(&a));
        }
        assert!(lock.is_locked());
        assert!(lock.is_holder(&a));
    }

    #[test]
    fn refresh_by_non_holder_is_noop() {
        let lock = LockManager::default();
        let a = addr("peer-a");
        let b = addr("peer-b");
        assert!(!lock.refresh(&a));
        assert!(lock.holder().is_none());
        lock.try_set_lock(&a);
        let before = lock.snapshot();
        assert!(!lock.refresh(&b));
        assert_eq!(lock.snapshot().session, before.session);
        assert_eq!(lock.holder(), Some(a));
    }

    #[test]
    fn refresh_revives_stale_holder_without_rival() {
        let lock = LockManager::new(Duration::from_millis(30));
        let a = addr("peer-a");
        lock.try_set_lock(&a);
        sleep(Duration::from_millis(60));
        assert!(lock.refresh(&a));
        assert!(lock.is_holder(&a));
    }

    #[test]
    fn release_only_by_holder() {
        let lock = LockManager::default();
        let a = addr("peer-a");
        let b = addr("peer-b");
        lock.try_set_lock(&a);
        assert!(!lock.release(&b));
        assert!(lock.is_holder(&a));
        assert!(lock.release(&a));
        assert!(!lock.is_locked());
    }

    #[test]
    fn clear_is_idempotent() {
        let lock = LockManager::default();
        let a = addr("peer-a");
        lock.try_set_lock(&a);
        assert_eq!(lock.clear(), Some(a));
        assert_eq!(lock.clear(), None);
    }

    #[test]
    fn concurrent_requests_grant_exactly_one() {
        use std::sync::Arc;
        use std::thread;

        let lock = Arc::new(LockManager::default());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || lock.try_set_lock(&addr(&format!("peer-{i}"))).is_granted())
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|g| *g)
            .count();
        assert_eq!(granted, 1);
        assert!(lock.is_locked());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Acquire(usize),
        Release(usize),
        Refresh(usize),
        Clear,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..4usize).prop_map(Op::Acquire),
            (0..4usize).prop_map(Op::Release),
            (0..4usize).prop_map(Op::Refresh),
            Just(Op::Clear),
        ]
    }

    proptest! {
        #[test]
        fn at_most_one_holder(ops in prop::collection::vec(op(), 0..64)) {
            let lock = LockManager::default();
            let peers: Vec<PeerAddress> = (0..4).map(|i| addr(&format!("peer-{i}"))).collect();
            let mut model: Option<usize> = None;

            for op in ops {
                match op {
                    Op::Acquire(i) => {
                        let granted = lock.try_set_lock(&peers[i]).is_granted();
                        let expected = model.map_or(true, |h| h == i);
                        prop_assert_eq!(granted, expected);
                        if granted {
                            model = Some(i);
                        }
                    }
                    Op::Release(i) => {
                        let released = lock.release(&peers[i]);
                        prop_assert_eq!(released, model == Some(i));
                        if released {
                            model = None;
                        }
                    }
                    Op::Refresh(i) => {
                        prop_assert_eq!(lock.refresh(&peers[i]), model == Some(i));
                    }
                    Op::Clear => {
                        prop_assert_eq!(lock.clear(), model.map(|h| peers[h].clone()));
                        model = None;
                    }
                }
                let holders = peers.iter().filter(|p| lock.is_holder(p)).count();
                prop_assert!(holders <= 1);
                prop_assert_eq!(holders == 1, model.is_some());
            }
        }
    }
}
