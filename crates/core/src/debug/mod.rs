//! Diagnostic tracing of nested transforms.

mod format;
mod tracer;

pub use format::{ext_column, file_size, is_loggable_option, loggable_options, ms, options_summary};
pub use tracer::{CallKind, FrameDetails, TraceRecord, TraceStack, TransformTracer, NO_TRANSFORMERS};
