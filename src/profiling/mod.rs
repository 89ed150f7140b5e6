//! Chrome Trace (flame-style) execution profiler.
//!
//! Feature-gated profiling for the ECM runtime. When the `profiling` feature
//! is enabled, the engine records execution spans around query dispatch and
//! worker-pool bursts and emits a **Chrome Trace Event JSON** file viewable
//! in `chrome://tracing` or <https://ui.perfetto.dev>.
//!
//! When the feature is disabled (the default), every call compiles to a
//! no-op.
//!
//! ## Usage
//!
//! ```no_run
//! use ecm_framework::profiling::profiler;
//!
//! profiler::init("profile/trace.json");
//!
//! {
//!     let _g = profiler::span("tick");
//!     // run queries
//! }
//!
//! profiler::shutdown();
//! ```

pub mod profiler;
