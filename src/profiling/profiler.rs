//! Span recording and Chrome Trace JSON output.
//!
//! Usage:
//!   ecm_framework::profiling::profiler::init("profile/trace.json");
//!   {
//!     let _g = profiler::span("EcmManager::for_matching_signature");
//!     // dispatch...
//!   }
//!   ecm_framework::profiling::profiler::shutdown();

use std::borrow::Cow;
use std::path::Path;

#[cfg(feature = "profiling")]
mod enabled {
    use std::fs::File;
    use std::io::{BufWriter, Write};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Mutex, OnceLock};
    use std::time::Instant;

    use super::*;

    /// A Chrome Trace complete event (`ph:"X"`).
    struct TraceEvent {
        name: String,
        ts_us: u64,
        dur_us: u64,
        tid: u64,
        entities: Option<u64>,
    }

    struct ProfilerState {
        start: Instant,
        out_path: PathBuf,
        is_on: AtomicBool,
        events: Mutex<Vec<TraceEvent>>,
    }

    static STATE: OnceLock<ProfilerState> = OnceLock::new();
    static NEXT_TID: AtomicU64 = AtomicU64::new(1);

    thread_local! {
        static TID: u64 = NEXT_TID.fetch_add(1, Ordering::Relaxed);
    }

    fn now_us(state: &ProfilerState) -> u64 {
        state.start.elapsed().as_micros() as u64
    }

    /// Initialize the profiler and set the output path.
    pub fn init<P: AsRef<Path>>(path: P) {
        let _ = STATE.set(ProfilerState {
            start: Instant::now(),
            out_path: path.as_ref().to_path_buf(),
            is_on: AtomicBool::new(true),
            events: Mutex::new(Vec::new()),
        });
    }

    /// Stop recording and write the Chrome Trace JSON.
    pub fn shutdown() {
        if let Some(state) = STATE.get() {
            state.is_on.store(false, Ordering::Release);
            if let Err(e) = write_trace_file(state) {
                eprintln!("profiler::shutdown failed to write trace: {e}");
            }
        }
    }

    fn write_trace_file(state: &ProfilerState) -> std::io::Result<()> {
        let events = {
            let mut guard = state.events.lock().unwrap();
            std::mem::take(&mut *guard)
        };

        if let Some(parent) = state.out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&state.out_path)?;
        let mut w = BufWriter::new(file);

        write!(w, "{{\"traceEvents\":[")?;
        let mut first = true;
        for event in events {
            if !first {
                write!(w, ",")?;
            }
            first = false;
            write!(w, "{{\"name\":")?;
            write_json_string(&mut w, &event.name)?;
            write!(
                w,
                ",\"cat\":\"ecm\",\"ph\":\"X\",\"ts\":{},\"dur\":{},\"pid\":1,\"tid\":{}",
                event.ts_us, event.dur_us, event.tid
            )?;
            if let Some(entities) = event.entities {
                write!(w, ",\"args\":{{\"entities\":{}}}", entities)?;
            }
            write!(w, "}}")?;
        }
        write!(w, "]}}")?;
        w.flush()
    }

    fn write_json_string<W: Write>(w: &mut W, s: &str) -> std::io::Result<()> {
        write!(w, "\"")?;
        for ch in s.chars() {
            match ch {
                '"' => write!(w, "\\\"")?,
                '\\' => write!(w, "\\\\")?,
                c if c.is_control() => write!(w, "\\u{:04x}", c as u32)?,
                c => write!(w, "{c}")?,
            }
        }
        write!(w, "\"")
    }

    /// Create a profiling span; the span ends when the guard drops.
    pub fn span(name: impl Into<super::SpanName>) -> SpanGuard {
        let Some(state) = STATE.get() else {
            return SpanGuard::disabled();
        };
        if !state.is_on.load(Ordering::Acquire) {
            return SpanGuard::disabled();
        }
        SpanGuard {
            name: name.into().0.into_owned(),
            ts0: now_us(state),
            tid: TID.with(|t| *t),
            entities: None,
            active: true,
        }
    }

    /// RAII guard recording one complete event on drop.
    pub struct SpanGuard {
        name: String,
        ts0: u64,
        tid: u64,
        entities: Option<u64>,
        active: bool,
    }

    impl SpanGuard {
        fn disabled() -> Self {
            Self {
                name: String::new(),
                ts0: 0,
                tid: 0,
                entities: None,
                active: false,
            }
        }

        /// Attach the number of entities visited to this span.
        #[inline]
        pub fn entities(mut self, count: u64) -> Self {
            if self.active {
                self.entities = Some(count);
            }
            self
        }
    }

    impl Drop for SpanGuard {
        fn drop(&mut self) {
            if !self.active {
                return;
            }
            let Some(state) = STATE.get() else { return };
            if !state.is_on.load(Ordering::Acquire) {
                return;
            }
            let ts1 = now_us(state);
            let mut guard = state.events.lock().unwrap();
            guard.push(TraceEvent {
                name: std::mem::take(&mut self.name),
                ts_us: self.ts0,
                dur_us: ts1.saturating_sub(self.ts0),
                tid: self.tid,
                entities: self.entities.take(),
            });
        }
    }
}

#[cfg(not(feature = "profiling"))]
mod disabled {
    use super::*;

    /// Initialize the profiler (no-op when profiling is disabled).
    #[inline]
    pub fn init<P: AsRef<Path>>(_path: P) {}

    /// Write the trace file (no-op).
    #[inline]
    pub fn shutdown() {}

    /// Create a profiling span (no-op).
    #[inline]
    pub fn span(_name: impl Into<super::SpanName>) -> SpanGuard {
        SpanGuard
    }

    /// No-op span guard.
    pub struct SpanGuard;

    impl SpanGuard {
        /// Attach the number of entities visited (no-op).
        #[inline]
        pub fn entities(self, _count: u64) -> Self {
            self
        }
    }
}

/// A span name; accepts `&'static str` or `String`.
pub struct SpanName(pub Cow<'static, str>);

impl From<&'static str> for SpanName {
    fn from(s: &'static str) -> Self {
        SpanName(Cow::Borrowed(s))
    }
}

impl From<String> for SpanName {
    fn from(s: String) -> Self {
        SpanName(Cow::Owned(s))
    }
}

#[cfg(feature = "profiling")]
pub use enabled::{init, shutdown, span, SpanGuard};

#[cfg(not(feature = "profiling"))]
pub use disabled::{init, shutdown, span, SpanGuard};
