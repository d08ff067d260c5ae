//! The trap state machine shared by every thread of the process.

use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

/// Where the process-wide trap currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrapState {
    /// No fault is being handled.
    Idle = 0,
    /// A thread has claimed the trap for a fault.
    Faulted = 1,
    /// The faulting page is being redirected.
    Redirecting = 2,
    /// Redirection finished; the faulting instruction is about to resume.
    Resumed = 3,
}

impl TrapState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Faulted,
            2 => Self::Redirecting,
            3 => Self::Resumed,
            _ => Self::Idle,
        }
    }
}

/// Why a claim on the trap was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClaimError {
    /// The claiming thread already holds the trap.
    Reentrant,
}

/// Single-owner trap guarding redirection.
///
/// `Idle -> Faulted -> Redirecting -> Resumed -> Idle`. Other threads spin
/// until the trap is idle; the owning thread faulting again is refused.
pub(crate) struct Trap {
    state: AtomicU8,
    owner: AtomicI64,
}

impl Trap {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU8::new(TrapState::Idle as u8),
            owner: AtomicI64::new(0),
        }
    }

    pub(crate) fn state(&self) -> TrapState {
        TrapState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move `Idle -> Faulted` on behalf of thread `tid`, waiting for other
    /// owners to release.
    pub(crate) fn claim(&self, tid: i64) -> Result<(), ClaimError> {
        loop {
            match self.state.compare_exchange(
                TrapState::Idle as u8,
                TrapState::Faulted as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.owner.store(tid, Ordering::Release);
                    return Ok(());
                }
                Err(_) => {
                    if self.owner.load(Ordering::Acquire) == tid {
                        return Err(ClaimError::Reentrant);
                    }
                    std::hint::spin_loop();
                    std::thread::yield_now();
                }
            }
        }
    }

    /// Step from `from` to `to`. Returns false if the trap was elsewhere.
    pub(crate) fn advance(&self, from: TrapState, to: TrapState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Hand the trap back to `Idle`.
    pub(crate) fn release(&self) {
        self.owner.store(0, Ordering::Release);
        self.state.store(TrapState::Idle as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[test]
    fn full_cycle() {
        let trap = Trap::new();
        assert_eq!(trap.state(), TrapState::Idle);

        trap.claim(11).unwrap();
        assert_eq!(trap.state(), TrapState::Faulted);
        assert!(trap.advance(TrapState::Faulted, TrapState::Redirecting));
        assert!(!trap.advance(TrapState::Faulted, TrapState::Redirecting));
        assert!(trap.advance(TrapState::Redirecting, TrapState::Resumed));
        assert_eq!(trap.state(), TrapState::Resumed);

        trap.release();
        assert_eq!(trap.state(), TrapState::Idle);
    }

    #[test]
    fn owner_cannot_claim_twice() {
        let trap = Trap::new();
        trap.claim(42).unwrap();
        assert_eq!(trap.claim(42), Err(ClaimError::Reentrant));
    }

    #[test]
    fn other_thread_waits_for_release() {
        let trap = Arc::new(Trap::new());
        trap.claim(1).unwrap();

        let acquired = Arc::new(AtomicBool::new(false));
        let handle = {
            let trap = Arc::clone(&trap);
            let acquired = Arc::clone(&acquired);
            std::thread::spawn(move || {
                trap.claim(2).unwrap();
                acquired.store(true, Ordering::SeqCst);
                trap.release();
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        trap.release();
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert_eq!(trap.state(), TrapState::Idle);
    }
}
