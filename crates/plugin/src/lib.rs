//! tickdispatch - C ABI Layer
//!
//! This crate provides the FFI boundary between a native host loop and the
//! Rust dispatcher. It compiles to a cdylib (.so/.dll); `build.rs` writes the
//! matching C header to `include/tickdispatch.h`.

pub mod ffi;

pub use tickdispatch_core::shutdown;
