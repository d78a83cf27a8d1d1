//! Issue reporting: highlight ranges, reporters and the batch summary.

/// Highlight range arithmetic and rendering.
pub mod highlight;
/// In-memory reporter.
pub mod recording;
/// Reporter trait and the console reporter.
pub mod reporter;
/// Batch-wide issue tally.
pub mod summary;

pub use highlight::{
    coalesce, highlight, render, resolve, singletons, HighlightGroup, HighlightSpec, Painter,
    RangeResolutionError, ResolvedHighlights, Selection, TextRange,
};
pub use recording::{RecordedIssue, RecordingReporter};
pub use reporter::{ConsoleReporter, Issue, ReportError, Reporter, SummaryFormat};
pub use summary::IssueSummary;
