//! Nested transform tracing.
//!
//! Every transform attempt, and every availability check that precedes one,
//! pushes a frame onto the per-call [`TraceStack`]. Frames are addressed by a
//! dotted reference such as `12.3.1`: the 12th top-level call, its 3rd child,
//! that child's 1st child.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use tracing::debug;

use super::format::{ext_column, file_size, ms, options_summary};
use crate::transform::root_cause_message;

/// Failure reason recorded when nothing can perform a transform.
pub const NO_TRANSFORMERS: &str = "No transformers";

const FINISHED_IN: &str = "Finished in ";
const REFERENCE_WIDTH: usize = 13;

/// What a frame was pushed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Only checking whether something can transform.
    AvailabilityOnly,
    /// Running a transformer.
    Transform,
    /// An availability check that went on to run a transformer.
    Both,
}

/// Process-wide tracer settings and the top-level id counter.
#[derive(Debug)]
pub struct TransformTracer {
    enabled: AtomicBool,
    top_level_ids: AtomicU64,
}

impl TransformTracer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            top_level_ids: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn next_top_level_id(&self) -> u64 {
        self.top_level_ids.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// A fresh stack for one call.
    pub fn stack(self: &Arc<Self>) -> TraceStack {
        TraceStack::new(Arc::clone(self))
    }
}

/// Description of the work a frame covers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDetails<'a> {
    pub transformer_name: Option<&'a str>,
    pub source_mimetype: &'a str,
    pub target_mimetype: &'a str,
    pub source_extension: Option<&'a str>,
    pub target_extension: Option<&'a str>,
    pub source_size: i64,
    pub rendition: Option<&'a str>,
    pub source_ref: Option<&'a str>,
}

/// A completed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub reference: String,
    /// Stack depth of the frame, 1 for a root.
    pub depth: usize,
    pub transformer_name: Option<String>,
    pub call_kind: CallKind,
    pub source_mimetype: String,
    pub target_mimetype: String,
    pub source_size: i64,
    pub rendition: Option<String>,
    pub source_ref: Option<String>,
    pub failure: Option<String>,
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
}

impl TraceRecord {
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

#[derive(Debug)]
struct Frame {
    id: u64,
    call_kind: CallKind,
    transformer_name: Option<String>,
    source_mimetype: String,
    target_mimetype: String,
    source_extension: Option<String>,
    target_extension: Option<String>,
    source_size: i64,
    rendition: Option<String>,
    source_ref: Option<String>,
    failure: Option<String>,
    children: u64,
    started: Instant,
    started_at: DateTime<Utc>,
}

/// Per-call stack of trace frames.
#[derive(Debug)]
pub struct TraceStack {
    tracer: Arc<TransformTracer>,
    frames: Vec<Frame>,
    records: Vec<TraceRecord>,
    capture: Option<Vec<String>>,
    previous_reference: Option<String>,
}

impl TraceStack {
    pub fn new(tracer: Arc<TransformTracer>) -> Self {
        Self {
            tracer,
            frames: Vec::new(),
            records: Vec::new(),
            capture: None,
            previous_reference: None,
        }
    }

    /// Pushes a frame for an availability check.
    pub fn push_available(&mut self, details: FrameDetails<'_>) {
        self.push(CallKind::AvailabilityOnly, details);
    }

    /// Pushes a frame for a transform. A pending availability frame on top is
    /// upgraded to [`CallKind::Both`].
    pub fn push_transform(&mut self, details: FrameDetails<'_>, options: &HashMap<String, String>) {
        if let Some(top) = self.frames.last_mut() {
            if top.call_kind == CallKind::AvailabilityOnly {
                top.call_kind = CallKind::Both;
                top.transformer_name = details.transformer_name.map(str::to_string);
                top.source_size = details.source_size;
            }
        }
        self.push(CallKind::Transform, details);

        if !self.is_logging() {
            return;
        }
        let first_level = self.first_transform_level();
        let mut line = format!(
            "{}{}{} ",
            ext_column(details.source_extension),
            ext_column(details.target_extension),
            file_size(details.source_size)
        );
        if first_level {
            if let Some(rendition) = details.rendition {
                line.push_str(&format!("-- {} -- ", rendition));
            }
        }
        line.push_str(details.transformer_name.unwrap_or("?"));
        self.log(&line);

        let summary = options_summary(options);
        if !summary.is_empty() {
            self.log(&format!("  options: {}", summary));
        }
        if first_level {
            if let Some(source_ref) = details.source_ref {
                self.log(source_ref);
            }
        }
    }

    fn push(&mut self, call_kind: CallKind, details: FrameDetails<'_>) {
        let id = match self.frames.last_mut() {
            Some(parent) => {
                parent.children += 1;
                parent.children
            }
            None => self.tracer.next_top_level_id(),
        };
        self.frames.push(Frame {
            id,
            call_kind,
            transformer_name: details.transformer_name.map(str::to_string),
            source_mimetype: details.source_mimetype.to_string(),
            target_mimetype: details.target_mimetype.to_string(),
            source_extension: details.source_extension.map(str::to_string),
            target_extension: details.target_extension.map(str::to_string),
            source_size: details.source_size,
            rendition: details.rendition.map(str::to_string),
            source_ref: details.source_ref.map(str::to_string),
            failure: None,
            children: 0,
            started: Instant::now(),
            started_at: Utc::now(),
        });
    }

    /// Pops the top frame, logging its outcome and keeping a record of it.
    pub fn pop(&mut self) {
        let depth = self.frames.len();
        if depth == 0 {
            return;
        }
        let reference = self.reference();
        let elapsed = match self.frames.last() {
            Some(frame) => frame.started.elapsed(),
            None => return,
        };
        let elapsed_ms = ms(elapsed.as_millis());

        if self.is_logging() {
            self.log_outcome(&elapsed_ms);
            if depth == 1 {
                self.log(&format!("{}{}", FINISHED_IN, elapsed_ms));
            }
        }

        let Some(frame) = self.frames.pop() else {
            return;
        };
        self.records.push(TraceRecord {
            reference: reference.clone(),
            depth,
            transformer_name: frame.transformer_name,
            call_kind: frame.call_kind,
            source_mimetype: frame.source_mimetype,
            target_mimetype: frame.target_mimetype,
            source_size: frame.source_size,
            rendition: frame.rendition,
            source_ref: frame.source_ref,
            failure: frame.failure,
            elapsed,
            started_at: frame.started_at,
        });
        if self.frames.is_empty() {
            self.previous_reference = Some(reference);
        }
    }

    fn log_outcome(&mut self, elapsed_ms: &str) {
        let Some(frame) = self.frames.last() else {
            return;
        };
        let failure = frame.failure.as_deref();
        let level = match (frame.call_kind, failure) {
            (_, Some(NO_TRANSFORMERS)) => "INFO",
            (CallKind::Transform, None) => "INFO",
            (CallKind::Transform, Some(_)) => "ERROR",
            // Availability frames only report when nothing could be found
            _ => return,
        };
        let mut line = format!(
            "{}{}{} {} {}",
            ext_column(frame.source_extension.as_deref()),
            ext_column(frame.target_extension.as_deref()),
            level,
            file_size(frame.source_size),
            elapsed_ms
        );
        if let Some(name) = &frame.transformer_name {
            line.push(' ');
            line.push_str(name);
        }
        if let Some(reason) = failure {
            line.push(' ');
            line.push_str(reason.trim());
        }
        self.log(&line);
    }

    /// Records why the top frame failed and logs `message` with the error.
    pub fn fail(&mut self, message: &str, err: &(dyn StdError + 'static)) {
        let text = err.to_string();
        let text = match text.find(": \n") {
            Some(i) => &text[..i],
            None => text.as_str(),
        };
        if self.is_logging() {
            self.log(&format!("{} {}", message, text));
        }
        let reason = format!("{} {}", message, root_cause_message(err));
        if let Some(top) = self.frames.last_mut() {
            top.failure = Some(reason);
        }
    }

    /// Sets the failure reason of the top frame without an error.
    pub fn set_failure_reason(&mut self, reason: &str) {
        if let Some(top) = self.frames.last_mut() {
            top.failure = Some(reason.to_string());
        }
    }

    /// Logs a message tagged with the current reference.
    pub fn debug(&mut self, message: &str) {
        if self.is_logging() {
            self.log(message);
        }
    }

    /// Logs a message tagged with the last completed top-level reference.
    pub fn debug_with_previous_reference(&mut self, message: &str) {
        if !self.is_logging() {
            return;
        }
        let reference = self.previous_reference.clone().unwrap_or_default();
        self.emit(&reference, message);
    }

    /// Dotted reference of the top frame, empty when the stack is empty.
    pub fn reference(&self) -> String {
        self.frames
            .iter()
            .map(|f| f.id.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Reference of the most recently completed top-level frame.
    pub fn previous_reference(&self) -> Option<&str> {
        self.previous_reference.as_deref()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Completed frames in pop order.
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn take_records(&mut self) -> Vec<TraceRecord> {
        std::mem::take(&mut self.records)
    }

    /// Starts collecting logged lines, even when tracing is disabled.
    pub fn start_capture(&mut self) {
        self.capture = Some(Vec::new());
    }

    /// Stops collecting and returns the captured text. The trailing
    /// "Finished in" line and the leading top-level number of each reference
    /// are removed.
    pub fn take_capture(&mut self) -> Option<String> {
        let lines = self.capture.take()?;
        let mut text = lines.join("\n");
        if let Some(i) = text.rfind(FINISHED_IN) {
            text.truncate(i);
            let end = text.rfind('\n').unwrap_or(0);
            text.truncate(end);
        }
        match Regex::new(r"(?m)^\d+\.") {
            Ok(leading) => Some(leading.replace_all(&text, "").into_owned()),
            Err(_) => Some(text),
        }
    }

    fn is_logging(&self) -> bool {
        self.tracer.is_enabled() || self.capture.is_some()
    }

    // The first transform frame of a call is either the root or sits
    // directly on the root availability frame.
    fn first_transform_level(&self) -> bool {
        match self.frames.len() {
            1 => true,
            2 => self.frames[0].call_kind != CallKind::Transform,
            _ => false,
        }
    }

    fn log(&mut self, message: &str) {
        let reference = self.reference();
        self.emit(&reference, message);
    }

    fn emit(&mut self, reference: &str, message: &str) {
        if self.tracer.is_enabled() {
            let line = format!("{:<width$}{}", reference, message, width = REFERENCE_WIDTH);
            debug!(target: "transform_core::debug", "{}", line);
        }
        if let Some(capture) = &mut self.capture {
            capture.push(format!("{} {}", reference, message));
        }
    }
}
