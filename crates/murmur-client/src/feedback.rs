//! Post-session feedback analysis seam.
//!
//! Feedback text the user submits after a session is handed to an analyzer
//! off the session path; analysis latency never blocks returning to idle.

use async_trait::async_trait;
use tracing::info;

/// Result of analyzing one piece of feedback text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackReport {
    /// One-line summary of the feedback.
    pub summary: String,
    /// Concrete improvements extracted from the text, if any.
    pub suggested_improvements: Vec<String>,
}

/// Analyzes free-form feedback text.
#[async_trait]
pub trait FeedbackAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> FeedbackReport;
}

/// Default analyzer: records the feedback in the log and passes the text
/// through as its own summary.
pub struct LoggingAnalyzer;

#[async_trait]
impl FeedbackAnalyzer for LoggingAnalyzer {
    async fn analyze(&self, text: &str) -> FeedbackReport {
        let summary = text.trim().to_string();
        info!(feedback = %summary, "Session feedback received");
        FeedbackReport {
            summary,
            suggested_improvements: Vec::new(),
        }
    }
}
