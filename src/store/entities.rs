use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

/// Fallback category for records the classifier (or a caller) left unlabeled.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One persisted sample of foreground activity. A record is written once per
/// tick and never mutated afterwards.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize, Clone)]
pub struct ActivityRecord {
    /// Store-assigned, monotonically increasing, never reused.
    pub id: u64,
    /// Milliseconds since the Unix epoch at the moment the sample was taken.
    pub timestamp: i64,
    pub app_name: Arc<str>,
    pub window_title: Arc<str>,
    pub category: Arc<str>,
    /// Elapsed milliseconds this sample represents. Always >= 0. A fresh
    /// focus event carries 0; continuations carry the delta since the
    /// previous tick. Totals are sums of these deltas.
    pub duration: i64,
}

/// An unsaved activity sample. The store assigns the id and fills in the
/// defaults for the optional fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub timestamp: i64,
    pub app_name: Arc<str>,
    pub window_title: Arc<str>,
    pub category: Option<Arc<str>>,
    pub duration: Option<i64>,
}

impl NewActivity {
    pub fn new(timestamp: i64, app_name: Arc<str>, window_title: Arc<str>) -> Self {
        Self {
            timestamp,
            app_name,
            window_title,
            category: None,
            duration: None,
        }
    }

    pub fn with_category(self, category: impl Into<Arc<str>>) -> Self {
        Self {
            category: Some(category.into()),
            ..self
        }
    }

    pub fn with_duration(self, duration: i64) -> Self {
        Self {
            duration: Some(duration),
            ..self
        }
    }
}

/// Aggregated usage of a single application over a queried time range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppUsageSummary {
    pub app_name: Arc<str>,
    /// Sum of `duration` over the application's records in range.
    pub total_time: i64,
    /// Number of records in range.
    pub count: u64,
}
