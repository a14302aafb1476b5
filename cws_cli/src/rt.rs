//! Real-time scheduling helpers (Linux SCHED_FIFO / mlockall).
//!
//! Echo edges are timed by busy polling, so preemption during a pulse shows
//! up directly as distance error.

use crate::cli::RtLock;

#[cfg(target_os = "linux")]
pub fn setup_rt_once(rt: bool, prio: Option<i32>, lock: RtLock) {
    use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param};
    use std::sync::OnceLock;
    use tracing::{info, warn};
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !rt {
        return;
    }

    #[inline]
    fn is_retryable_memlock_error(err: &std::io::Error) -> bool {
        matches!(err.raw_os_error(), Some(code) if code == libc::EPERM || code == libc::ENOMEM)
    }

    #[inline]
    fn memlock_limit_hint() -> Option<String> {
        let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
        // SAFETY: getrlimit only writes into the provided rlimit.
        let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
        if rc != 0 {
            return None;
        }
        // SAFETY: rc == 0 means the struct was initialized.
        let cur = unsafe { rlim.assume_init() }.rlim_cur;
        if cur == libc::RLIM_INFINITY {
            Some("memlock limit: unlimited".to_string())
        } else {
            Some(format!("memlock limit: {} KiB", cur / 1024))
        }
    }

    fn mlockall(flags: libc::c_int) -> std::io::Result<()> {
        // SAFETY: mlockall has no memory-safety preconditions.
        let rc = unsafe { libc::mlockall(flags) };
        if rc != 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    // Apply process memory locking according to the selected mode.
    fn try_apply_mem_lock(lock: RtLock) -> eyre::Result<()> {
        let result = match lock {
            RtLock::None => return Ok(()),
            RtLock::Current => mlockall(libc::MCL_CURRENT),
            RtLock::All => mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE),
        };
        let Err(err) = result else {
            return Ok(());
        };

        // All failed on permission or memory: settle for Current
        let attempted_all = matches!(lock, RtLock::All);
        let mut fallback_err = None;
        if attempted_all && is_retryable_memlock_error(&err) {
            match mlockall(libc::MCL_CURRENT) {
                Ok(()) => {
                    warn!(error = %err, "mlockall(current|future) failed, locked current pages only");
                    return Ok(());
                }
                Err(e2) => fallback_err = Some(e2),
            }
        }

        let mut msg = format!(
            "mlockall({}) failed: {err}",
            if attempted_all { "current|future" } else { "current" }
        );
        if is_retryable_memlock_error(&err) {
            if let Some(h) = memlock_limit_hint() {
                msg.push_str(&format!("; {h}"));
            }
            msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
            if let Some(e2) = fallback_err {
                msg.push_str(&format!("; fallback mlockall(current) also failed: {e2}"));
            }
        }
        Err(eyre::eyre!(msg))
    }

    // Apply SCHED_FIFO priority, clamped to the system range.
    fn try_apply_fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
        // SAFETY: plain queries without pointers.
        let (min, max) = unsafe {
            let min = sched_get_priority_min(SCHED_FIFO);
            let max = sched_get_priority_max(SCHED_FIFO);
            if min < 0 || max < 0 { (1, 99) } else { (min, max) }
        };
        let prio_val = prio.unwrap_or(max).clamp(min, max);
        let param = sched_param {
            sched_priority: prio_val,
        };
        // SAFETY: param outlives the call.
        let rc = unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            // SAFETY: geteuid cannot fail.
            let euid = unsafe { libc::geteuid() };
            return Err(eyre::eyre!(
                "{err}; needs CAP_SYS_NICE or root (euid {euid}). \
                 Hint: 'sudo setcap cap_sys_nice=ep /path/to/cws'"
            ));
        }
        Ok(prio_val)
    }

    RT_ONCE.get_or_init(|| {
        match try_apply_mem_lock(lock) {
            Ok(()) => info!(mode = ?lock, "RT: memory lock applied"),
            Err(err) => warn!(error = %err, "RT: mlockall failed"),
        }
        match try_apply_fifo_priority(prio) {
            Ok(p) => info!(prio = p, "RT: SCHED_FIFO enabled"),
            Err(err) => warn!(error = %err, ?prio, "RT: sched_setscheduler(SCHED_FIFO) failed"),
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(rt: bool, _prio: Option<i32>, _lock: RtLock) {
    if rt {
        tracing::warn!("real-time mode is only supported on Linux; ignoring --rt");
    }
}
