//! Where a finished run ends up.
//!
//! - [`json`]: the [`json::SnapshotSink`] seam and its JSON file writer
//!
//! Rendering the files into pages is left to whatever reads them.

pub mod json;
