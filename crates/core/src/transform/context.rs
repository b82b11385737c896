//! Per-call execution state.

use std::sync::Arc;

use crate::debug::{TraceRecord, TraceStack, TransformTracer};

/// State owned by one top-level transform call and threaded through every
/// nested step. Never shared between calls.
#[derive(Debug)]
pub struct TransformContext {
    pub(crate) depth: usize,
    pub(crate) trace: TraceStack,
}

impl TransformContext {
    pub fn new(tracer: &Arc<TransformTracer>) -> Self {
        Self {
            depth: 0,
            trace: tracer.stack(),
        }
    }

    /// Current nesting depth, 0 outside any transform.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn trace(&self) -> &TraceStack {
        &self.trace
    }

    pub fn trace_mut(&mut self) -> &mut TraceStack {
        &mut self.trace
    }

    /// Completed trace frames so far.
    pub fn records(&self) -> &[TraceRecord] {
        self.trace.records()
    }
}
