use crate::utils::error::{QuerentError, Result};
use once_cell::sync::OnceCell;
use tokio::runtime::{Builder, Runtime};

/// Process-wide multi-thread runtime, built on first use.
pub fn tokio_runtime() -> Result<&'static Runtime> {
    static RUNTIME: OnceCell<Runtime> = OnceCell::new();

    RUNTIME.get_or_try_init(|| {
        Builder::new_multi_thread()
            .enable_all()
            .thread_name("querent-worker")
            .on_thread_unpark(busy_detector::thread_unpark)
            .on_thread_park(busy_detector::thread_park)
            .build()
            .map_err(|err| QuerentError::internal(err.to_string()))
    })
}

/// Flags worker threads that stay busy for too long between parks.
pub mod busy_detector {
    use once_cell::sync::Lazy;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Instant;

    static TIME_REF: Lazy<Instant> = Lazy::new(Instant::now);
    static ENABLED: AtomicBool = AtomicBool::new(false);

    const ALLOWED_DELAY_MICROS: u64 = 5_000;
    const DEBUG_SUPPRESSION_MICROS: u64 = 30_000_000;

    thread_local!(static LAST_UNPARK_TIMESTAMP: AtomicU64 = const { AtomicU64::new(0) });
    static NEXT_DEBUG_TIMESTAMP: AtomicU64 = AtomicU64::new(0);
    static SUPPRESSED_DEBUG_COUNT: AtomicU64 = AtomicU64::new(0);

    pub fn set_enabled(enabled: bool) {
        ENABLED.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled() -> bool {
        ENABLED.load(Ordering::Relaxed)
    }

    fn now_micros() -> u64 {
        Instant::now()
            .checked_duration_since(*TIME_REF)
            .unwrap_or_default()
            .as_micros() as u64
    }

    pub fn thread_unpark() {
        LAST_UNPARK_TIMESTAMP.with(|time| time.store(now_micros(), Ordering::Relaxed));
    }

    pub fn thread_park() {
        if !is_enabled() {
            return;
        }

        LAST_UNPARK_TIMESTAMP.with(|time| {
            let now = now_micros();
            let delta = now.saturating_sub(time.load(Ordering::Relaxed));
            if delta > ALLOWED_DELAY_MICROS {
                report(delta, now);
            }
        })
    }

    /// Returns true when a message was logged, false when it was suppressed.
    fn report(delta: u64, now: u64) -> bool {
        let window_open = NEXT_DEBUG_TIMESTAMP
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next_debug| {
                (next_debug < now).then_some(now + DEBUG_SUPPRESSION_MICROS)
            })
            .is_ok();

        if !window_open {
            SUPPRESSED_DEBUG_COUNT.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let suppressed = SUPPRESSED_DEBUG_COUNT.swap(0, Ordering::Relaxed);
        if suppressed == 0 {
            tracing::debug!("thread wasn't parked for {delta}µs, is the runtime too busy?");
        } else {
            tracing::debug!(
                "thread wasn't parked for {delta}µs, is the runtime too busy? \
                 ({suppressed} similar messages suppressed)"
            );
        }
        true
    }

}
