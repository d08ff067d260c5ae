//! Write-fault interception for read-only mapped regions.
//!
//! [`FaultInterceptor::install`] registers a process-wide `SIGSEGV` handler
//! with `SA_SIGINFO`. When a thread writes to a watched read-only region the
//! handler claims the trap, hands the page-aligned faulting address to the
//! [`PageRedirector`] and returns, so the faulting instruction retries against
//! the redirected page.
//!
//! Faults outside watched regions, and faults that are not permission
//! violations, are not ours. The handler restores the disposition that was
//! active before installation and returns, letting the instruction fault again
//! under the previous handler.
//!
//! The handler never allocates, logs or locks. Failures are fatal: a fixed
//! message goes to stderr through `write(2)` and the process ends with
//! `_exit(1)`.

mod registry;
mod state;

pub use registry::{MAX_REDIRECTED_PAGES, MAX_REGIONS};
pub use state::TrapState;

use crate::error::{Result, ShadowError};
use crate::redirect::PageRedirector;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use parking_lot::Mutex;
use registry::{PageSet, RegionTable};
use state::Trap;
use std::cell::Cell;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// `si_code` of a SIGSEGV caused by a permission violation on a mapped page.
const SEGV_ACCERR: libc::c_int = 2;

static INTERCEPTOR: OnceLock<FaultInterceptor> = OnceLock::new();
static INSTALL_LOCK: Mutex<()> = Mutex::new(());
static REGIONS: RegionTable = RegionTable::new();
static REDIRECTED: PageSet = PageSet::new();

thread_local! {
    /// Last already-redirected page this thread was allowed to retry.
    static RETRIED_PAGE: Cell<usize> = const { Cell::new(0) };
}

/// Snapshot of interceptor counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterceptorStats {
    /// Every SIGSEGV delivered to the handler.
    pub faults: u64,
    /// Pages redirected.
    pub redirects: u64,
    /// Foreign faults passed to the previous disposition.
    pub forwarded: u64,
}

#[derive(Default)]
struct Counters {
    faults: AtomicU64,
    redirects: AtomicU64,
    forwarded: AtomicU64,
}

/// The process-wide write-fault interceptor.
pub struct FaultInterceptor {
    redirector: PageRedirector,
    previous: SigAction,
    trap: Trap,
    counters: Counters,
}

impl FaultInterceptor {
    /// Install the interceptor for this process.
    ///
    /// The first call installs the handler and keeps `redirector`. Later calls
    /// return the already-installed interceptor and drop their argument.
    pub fn install(redirector: PageRedirector) -> Result<&'static FaultInterceptor> {
        let _guard = INSTALL_LOCK.lock();
        if let Some(existing) = INTERCEPTOR.get() {
            tracing::debug!("Fault interceptor already installed");
            return Ok(existing);
        }

        let action = SigAction::new(
            SigHandler::SigAction(handle_fault),
            SaFlags::SA_SIGINFO,
            SigSet::empty(),
        );
        // SAFETY: the handler only touches atomics, the installed redirector
        // and async-signal-safe calls.
        let previous = unsafe { sigaction(Signal::SIGSEGV, &action) }.map_err(|e| {
            ShadowError::InterceptorInstall {
                cause: e.to_string(),
            }
        })?;

        let rebinder = redirector.rebinder_name();
        let interceptor = INTERCEPTOR.get_or_init(|| FaultInterceptor {
            redirector,
            previous,
            trap: Trap::new(),
            counters: Counters::default(),
        });

        tracing::info!(rebinder, "Installed write-fault interceptor");
        Ok(interceptor)
    }

    /// The installed interceptor, if any.
    pub fn installed() -> Option<&'static FaultInterceptor> {
        INTERCEPTOR.get()
    }

    /// Name of the rebinder used for redirection.
    pub fn rebinder_name(&self) -> &'static str {
        self.redirector.rebinder_name()
    }

    /// Current trap state.
    pub fn trap_state(&self) -> TrapState {
        self.trap.state()
    }

    /// Counters since installation.
    pub fn stats(&self) -> InterceptorStats {
        InterceptorStats {
            faults: self.counters.faults.load(Ordering::Relaxed),
            redirects: self.counters.redirects.load(Ordering::Relaxed),
            forwarded: self.counters.forwarded.load(Ordering::Relaxed),
        }
    }

    /// Start intercepting write faults in `[base, base + len)`.
    pub(crate) fn watch(&self, base: usize, len: usize) -> Result<()> {
        if !REGIONS.insert(base, len) {
            return Err(ShadowError::RegionTableFull {
                base,
                capacity: MAX_REGIONS,
            });
        }
        tracing::debug!(base = format_args!("{:#x}", base), len, "Watching region");
        Ok(())
    }

    /// Stop intercepting `[base, base + len)` and forget its redirected pages.
    pub(crate) fn unwatch(&self, base: usize, len: usize) {
        REGIONS.remove(base);
        let forgotten = REDIRECTED.remove_range(base, len);
        tracing::trace!(
            base = format_args!("{:#x}", base),
            forgotten,
            "Stopped watching region"
        );
    }

    /// Number of regions currently watched.
    pub fn watched_regions(&self) -> usize {
        REGIONS.len()
    }

    fn forward(&self) {
        self.counters.forwarded.fetch_add(1, Ordering::Relaxed);
        // SAFETY: restoring the disposition captured at installation.
        unsafe {
            let _ = sigaction(Signal::SIGSEGV, &self.previous);
        }
    }

    /// Handle one fault inside a watched region. Never returns on failure.
    fn redirect_fault(&self, addr: usize) {
        let page = self.redirector.layout().align_down(addr);

        if self.trap.claim(current_tid()).is_err() {
            fatal("pageshadow: fatal: write fault while redirecting on the same thread\n");
        }

        if REDIRECTED.contains(page) {
            // Another thread may have redirected the page while this one
            // waited for the trap. A second fault after that retry is a real
            // refault.
            if RETRIED_PAGE.with(Cell::get) == page {
                fatal("pageshadow: fatal: write fault on an already redirected page\n");
            }
            RETRIED_PAGE.with(|retried| retried.set(page));
            self.trap.release();
            return;
        }

        self.trap.advance(TrapState::Faulted, TrapState::Redirecting);
        // SAFETY: `page` lies inside a watched region, which is a live
        // mapping owned by a `MappedRegion`.
        if let Err(fault) = unsafe { self.redirector.redirect(page) } {
            fatal(fault.message());
        }
        if !REDIRECTED.insert(page) {
            fatal("pageshadow: fatal: redirected page table is full\n");
        }
        RETRIED_PAGE.with(|retried| retried.set(0));
        self.counters.redirects.fetch_add(1, Ordering::Relaxed);

        self.trap.advance(TrapState::Redirecting, TrapState::Resumed);
        self.trap.release();
    }
}

impl std::fmt::Debug for FaultInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultInterceptor")
            .field("redirector", &self.redirector)
            .field("trap", &self.trap.state())
            .field("stats", &self.stats())
            .finish()
    }
}

extern "C" fn handle_fault(_signal: libc::c_int, info: *mut libc::siginfo_t, _ctx: *mut libc::c_void) {
    let Some(interceptor) = INTERCEPTOR.get() else {
        // A fault between sigaction and publication of the interceptor.
        // SAFETY: resetting to the default action is async-signal-safe.
        unsafe {
            let _ = sigaction(
                Signal::SIGSEGV,
                &SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty()),
            );
        }
        return;
    };
    interceptor.counters.faults.fetch_add(1, Ordering::Relaxed);

    // SAFETY: the kernel passes a valid siginfo for SA_SIGINFO handlers.
    let (addr, code) = unsafe { ((*info).si_addr() as usize, (*info).si_code) };

    if code != SEGV_ACCERR || !REGIONS.contains(addr) {
        interceptor.forward();
        return;
    }

    interceptor.redirect_fault(addr);
}

fn current_tid() -> i64 {
    // SAFETY: gettid has no preconditions.
    unsafe { libc::syscall(libc::SYS_gettid) as i64 }
}

fn fatal(message: &str) -> ! {
    // SAFETY: write(2) and _exit(2) are async-signal-safe.
    unsafe {
        libc::write(libc::STDERR_FILENO, message.as_ptr().cast(), message.len());
        libc::_exit(1)
    }
}
