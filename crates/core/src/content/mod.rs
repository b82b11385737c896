//! Content access seams.
//!
//! The engine never touches storage directly. It reads source bytes through a
//! [`ContentReader`] and writes results through a [`ContentWriter`]. Memory and
//! file implementations are provided, plus [`SpoolProvider`] for the temporary
//! files pipelines use between steps.

mod error;
mod file;
mod memory;
mod spool;
mod traits;

pub use error::ContentError;
pub use file::{FileContentReader, FileContentWriter};
pub use memory::{MemoryContentReader, MemoryContentWriter};
pub use spool::{SpoolContentWriter, SpoolFile, SpoolProvider};
pub use traits::{relabel, ContentInputStream, ContentOutputStream, ContentReader, ContentWriter};
