//! Host integration hooks
//!
//! - frame: per-tick entry point driving the active dispatcher

mod frame;

pub use frame::{
    frame_count, last_frame_time_ns, on_host_tick, register_frame_callback,
    unregister_frame_callback, FrameCallback, FrameCallbackKey,
};
