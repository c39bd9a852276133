//! Host frame hook
//!
//! Called once per host tick from the main thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

use crate::config::DispatcherConfig;
use crate::dispatcher;

new_key_type! {
    /// Key for registered frame callbacks
    pub struct FrameCallbackKey;
}

/// Callback type for frame listeners, receives the frame number
pub type FrameCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Frame callback registry
struct FrameRegistry {
    callbacks: SlotMap<FrameCallbackKey, FrameCallback>,
}

static REGISTRY: LazyLock<RwLock<FrameRegistry>> = LazyLock::new(|| {
    RwLock::new(FrameRegistry {
        callbacks: SlotMap::with_key(),
    })
});

/// Frame counter (increments every host tick)
static FRAME_COUNT: AtomicU64 = AtomicU64::new(0);

/// Last tick's processing time for performance monitoring (nanoseconds)
static LAST_FRAME_TIME_NS: AtomicU64 = AtomicU64::new(0);

/// Register a callback to be called every host tick
///
/// # Returns
/// A key that can be used to unregister the callback
pub fn register_frame_callback<F>(callback: F) -> FrameCallbackKey
where
    F: Fn(u64) + Send + Sync + 'static,
{
    REGISTRY.write().callbacks.insert(Arc::new(callback))
}

/// Unregister a frame callback
///
/// # Returns
/// `true` if the callback was found and removed
pub fn unregister_frame_callback(key: FrameCallbackKey) -> bool {
    REGISTRY.write().callbacks.remove(key).is_some()
}

/// Get the current frame count
pub fn frame_count() -> u64 {
    FRAME_COUNT.load(Ordering::Relaxed)
}

/// Get the last frame processing time in nanoseconds
pub fn last_frame_time_ns() -> u64 {
    LAST_FRAME_TIME_NS.load(Ordering::Relaxed)
}

/// Called by the host every tick
///
/// Advances the active dispatcher's scheduler by one pass, drains its queue
/// and fires registered frame callbacks. The pass runs before the drain so a
/// sequence started by this tick's drain first resumes on the next tick.
pub fn on_host_tick() {
    let start = std::time::Instant::now();

    let frame = FRAME_COUNT.fetch_add(1, Ordering::Relaxed) + 1;

    let slow_tick_warn_us = match dispatcher::try_current() {
        Some(dispatcher) => {
            let advanced = dispatcher.scheduler().advance();
            if advanced.resumed > 0 {
                tracing::trace!("Resumed {} sequences", advanced.resumed);
            }

            let drained = dispatcher.tick();
            if drained.faulted > 0 {
                tracing::debug!("{} queued work items faulted", drained.faulted);
            }

            dispatcher.config().slow_tick_warn_us
        }
        None => DispatcherConfig::default().slow_tick_warn_us,
    };

    // Snapshot so callbacks may register or unregister
    let callbacks: Vec<FrameCallback> = REGISTRY.read().callbacks.values().cloned().collect();
    for callback in callbacks {
        callback(frame);
    }

    let elapsed = start.elapsed().as_nanos() as u64;
    LAST_FRAME_TIME_NS.store(elapsed, Ordering::Relaxed);

    if elapsed > slow_tick_warn_us.saturating_mul(1_000) {
        tracing::warn!(
            "Host tick took {}us (frame {})",
            elapsed / 1_000,
            frame
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use tickdispatch_host::SharedEnvironment;

    use crate::dispatcher::Dispatcher;
    use crate::sequence;
    use crate::test_support::serial;

    #[test]
    fn test_host_tick_resumes_sequence_once_per_tick() {
        let _guard = serial();
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(SharedEnvironment::default())));
        dispatcher.activate().unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let steps: Vec<Box<dyn FnOnce() + Send>> = (0..3)
            .map(|_| {
                let count = Arc::clone(&count);
                Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }) as Box<dyn FnOnce() + Send>
            })
            .collect();
        dispatcher::queue_suspendable(sequence::steps(steps)).unwrap();

        // Drain starts the sequence; each yield holds until the next tick
        on_host_tick();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.scheduler().live_count(), 1);

        on_host_tick();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.scheduler().live_count(), 1);

        on_host_tick();
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(dispatcher.scheduler().live_count(), 0);

        assert!(dispatcher.deactivate());
    }

    #[test]
    fn test_frame_callbacks_fire_until_unregistered() {
        let _guard = serial();
        let seen = Arc::new(AtomicU64::new(0));
        let hits = Arc::new(AtomicUsize::new(0));

        let key = {
            let seen = Arc::clone(&seen);
            let hits = Arc::clone(&hits);
            register_frame_callback(move |frame| {
                seen.store(frame, Ordering::SeqCst);
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        let before = frame_count();
        on_host_tick();
        assert_eq!(frame_count(), before + 1);
        assert_eq!(seen.load(Ordering::SeqCst), before + 1);

        assert!(unregister_frame_callback(key));
        assert!(!unregister_frame_callback(key));
        on_host_tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
