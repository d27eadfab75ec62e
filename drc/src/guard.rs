//! Ownership, the pause switch and the reentrancy lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Two-step ownership plus a global pause flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGuard {
    owner: Address,
    pending_owner: Option<Address>,
    paused: bool,
}

impl AccessGuard {
    /// Creates an unpaused guard owned by `owner`.
    #[must_use]
    pub const fn new(owner: Address) -> Self {
        Self {
            owner,
            pending_owner: None,
            paused: false,
        }
    }

    /// Current owner.
    #[must_use]
    pub const fn owner(&self) -> Address {
        self.owner
    }

    /// Proposed owner awaiting acceptance.
    #[must_use]
    pub const fn pending_owner(&self) -> Option<Address> {
        self.pending_owner
    }

    /// Returns `true` while paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Fails unless `caller` is the owner.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::CallerIsNotOwner`].
    pub fn only_owner(&self, caller: Address) -> Result<(), GuardError> {
        if caller != self.owner {
            return Err(GuardError::CallerIsNotOwner {
                caller,
                owner: self.owner,
            });
        }
        Ok(())
    }

    /// Fails while paused.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Paused`].
    pub const fn when_not_paused(&self) -> Result<(), GuardError> {
        if self.paused {
            return Err(GuardError::Paused);
        }
        Ok(())
    }

    /// Pauses request creation and fulfillment.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::CallerIsNotOwner`] or [`GuardError::Paused`].
    pub fn pause(&mut self, caller: Address) -> Result<(), GuardError> {
        self.only_owner(caller)?;
        self.when_not_paused()?;
        self.paused = true;
        Ok(())
    }

    /// Lifts the pause.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::CallerIsNotOwner`] or [`GuardError::NotPaused`].
    pub fn unpause(&mut self, caller: Address) -> Result<(), GuardError> {
        self.only_owner(caller)?;
        if !self.paused {
            return Err(GuardError::NotPaused);
        }
        self.paused = false;
        Ok(())
    }

    /// Proposes `to` as the next owner.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::CallerIsNotOwner`] or
    /// [`GuardError::CannotTransferToSelf`].
    pub fn transfer_ownership(&mut self, caller: Address, to: Address) -> Result<(), GuardError> {
        self.only_owner(caller)?;
        if to == caller {
            return Err(GuardError::CannotTransferToSelf);
        }
        self.pending_owner = Some(to);
        Ok(())
    }

    /// Completes a transfer; returns the previous owner.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::CallerIsNotPendingOwner`].
    pub fn accept_ownership(&mut self, caller: Address) -> Result<Address, GuardError> {
        if self.pending_owner != Some(caller) {
            return Err(GuardError::CallerIsNotPendingOwner(caller));
        }
        let previous = self.owner;
        self.owner = caller;
        self.pending_owner = None;
        Ok(previous)
    }
}

/// Non-reentrant entry lock.
///
/// Threads entering concurrently queue on the lock. While the holder has
/// control handed away to external code (see [`Entered::dispatch`]) every
/// entry fails immediately, whichever thread it comes from, and so does a
/// nested entry from the holding thread itself.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entry: Mutex<()>,
    holder: Mutex<Option<ThreadId>>,
    dispatching: AtomicBool,
}

/// Proof of having entered a [`ReentrancyGuard`]; leaves on drop.
#[derive(Debug)]
#[must_use = "the guard is released as soon as the entry is dropped"]
pub struct Entered<'a> {
    guard: &'a ReentrancyGuard,
    _entry: MutexGuard<'a, ()>,
}

/// An external call in flight under an [`Entered`] guard; ends on drop.
#[derive(Debug)]
#[must_use = "the dispatch window closes as soon as this is dropped"]
pub struct Dispatching<'a> {
    guard: &'a ReentrancyGuard,
}

impl ReentrancyGuard {
    /// Creates an unlocked guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters the guard, waiting for other threads to leave it.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::ReentrantCall`] while an external call is being
    /// dispatched, or if the current thread already holds the guard.
    pub fn enter(&self) -> Result<Entered<'_>, GuardError> {
        if self.dispatching.load(Ordering::Acquire) {
            return Err(GuardError::ReentrantCall);
        }
        let current = thread::current().id();
        if *self.holder() == Some(current) {
            return Err(GuardError::ReentrantCall);
        }
        let entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        *self.holder() = Some(current);
        Ok(Entered {
            guard: self,
            _entry: entry,
        })
    }

    #[cfg(test)]
    fn is_entered(&self) -> bool {
        self.holder().is_some()
    }

    fn holder(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Entered<'_> {
    /// Opens the window in which control is handed to external code.
    ///
    /// Until the returned value is dropped, [`ReentrancyGuard::enter`] fails
    /// fast instead of queueing behind this entry.
    pub fn dispatch(&self) -> Dispatching<'_> {
        self.guard.dispatching.store(true, Ordering::Release);
        Dispatching { guard: self.guard }
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        *self.guard.holder() = None;
    }
}

impl Drop for Dispatching<'_> {
    fn drop(&mut self) {
        self.guard.dispatching.store(false, Ordering::Release);
    }
}

/// Errors of the access guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    /// The caller is not the owner.
    #[error("caller {caller} is not the owner {owner}")]
    CallerIsNotOwner {
        /// Calling account.
        caller: Address,
        /// Current owner.
        owner: Address,
    },
    /// The caller is not the proposed owner.
    #[error("caller {0} is not the pending owner")]
    CallerIsNotPendingOwner(Address),
    /// Ownership cannot be proposed to the current owner.
    #[error("cannot transfer ownership to self")]
    CannotTransferToSelf,
    /// The coordinator is paused.
    #[error("paused")]
    Paused,
    /// The coordinator is not paused.
    #[error("not paused")]
    NotPaused,
    /// An entry point was re-entered from within a callback.
    #[error("reentrant call")]
    ReentrantCall,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const OWNER: Address = address!("0x0000000000000000000000000000000000000001");
    const NEXT: Address = address!("0x0000000000000000000000000000000000000002");

    #[test]
    fn test_two_step_ownership() {
        let mut guard = AccessGuard::new(OWNER);
        assert_eq!(
            guard.transfer_ownership(NEXT, NEXT),
            Err(GuardError::CallerIsNotOwner {
                caller: NEXT,
                owner: OWNER
            })
        );
        guard.transfer_ownership(OWNER, NEXT).unwrap();
        assert_eq!(guard.owner(), OWNER);
        assert_eq!(
            guard.accept_ownership(OWNER),
            Err(GuardError::CallerIsNotPendingOwner(OWNER))
        );
        assert_eq!(guard.accept_ownership(NEXT), Ok(OWNER));
        assert_eq!(guard.owner(), NEXT);
        assert_eq!(guard.pending_owner(), None);
    }

    #[test]
    fn test_pause_toggles() {
        let mut guard = AccessGuard::new(OWNER);
        assert_eq!(guard.unpause(OWNER), Err(GuardError::NotPaused));
        guard.pause(OWNER).unwrap();
        assert_eq!(guard.when_not_paused(), Err(GuardError::Paused));
        assert_eq!(guard.pause(OWNER), Err(GuardError::Paused));
        guard.unpause(OWNER).unwrap();
        assert!(!guard.is_paused());
    }

    #[test]
    fn test_nested_entry_is_rejected() {
        let guard = ReentrancyGuard::new();
        let entered = guard.enter().unwrap();
        assert!(guard.is_entered());
        assert_eq!(guard.enter().unwrap_err(), GuardError::ReentrantCall);
        drop(entered);
        assert!(!guard.is_entered());
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn test_entry_fails_fast_from_any_thread_while_dispatching() {
        let guard = Arc::new(ReentrancyGuard::new());
        let entered = guard.enter().unwrap();
        let dispatching = entered.dispatch();

        let other = {
            let guard = Arc::clone(&guard);
            thread::spawn(move || guard.enter().map(drop))
        };
        assert_eq!(other.join().unwrap(), Err(GuardError::ReentrantCall));

        drop(dispatching);
        drop(entered);
        let other = {
            let guard = Arc::clone(&guard);
            thread::spawn(move || guard.enter().map(drop))
        };
        assert_eq!(other.join().unwrap(), Ok(()));
    }

    #[test]
    fn test_other_threads_wait() {
        let guard = Arc::new(ReentrancyGuard::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    let _entered = guard.enter().unwrap();
                    let seen = counter.fetch_add(1, Ordering::SeqCst);
                    thread::yield_now();
                    assert_eq!(counter.load(Ordering::SeqCst), seen + 1);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }
}
