use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Smallest accepted `max_response_bytes`. An empty detail listing always fits.
pub const MIN_RESPONSE_BYTES: usize = 1024;

/// Column names that mark a task as finished.
pub const DEFAULT_COMPLETED_COLUMNS: [&str; 4] = ["Done", "Completed", "Closed", "Finished"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub listing: ListingLimits,
    pub workload: WorkloadConfig,
    pub urgency: UrgencyConfig,
    pub bottleneck: BottleneckConfig,
    pub completion: CompletionConfig,
}

impl AnalyticsConfig {
    /// Load overrides from a JSON file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        anyhow::ensure!(
            config.listing.max_response_bytes >= MIN_RESPONSE_BYTES,
            "listing.max_response_bytes must be at least {MIN_RESPONSE_BYTES}, got {}",
            config.listing.max_response_bytes
        );
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingLimits {
    pub default_limit: usize,
    /// Ceiling on the requested limit in detail mode.
    pub hard_limit: usize,
    /// Ceiling on the requested limit in summary mode.
    pub summary_hard_limit: usize,
    /// Serialized detail-mode payloads are trimmed until they fit in this many
    /// bytes. Values below [`MIN_RESPONSE_BYTES`] are rejected at load time.
    pub max_response_bytes: usize,
}

impl Default for ListingLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            hard_limit: 100,
            summary_hard_limit: 200,
            max_response_bytes: 200 * 1024,
        }
    }
}

impl ListingLimits {
    pub fn effective_limit(&self, requested: usize, summary_mode: bool) -> usize {
        let requested = if requested == 0 {
            self.default_limit
        } else {
            requested
        };
        let ceiling = if summary_mode {
            self.summary_hard_limit
        } else {
            self.hard_limit
        };
        requested.min(ceiling)
    }
}

/// Utilization tiers are strict lower bounds, in percent of weekly capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub weekly_capacity_hours: f64,
    pub severely_overloaded_above: f64,
    pub overloaded_above: f64,
    pub at_capacity_above: f64,
    pub normal_above: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            weekly_capacity_hours: 40.0,
            severely_overloaded_above: 120.0,
            overloaded_above: 100.0,
            at_capacity_above: 80.0,
            normal_above: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrgencyConfig {
    pub urgent_threshold: u32,
    pub max_urgent_items: usize,
    pub has_due_date: u32,
    pub overdue_base: u32,
    /// Overdue by more than 7 days.
    pub overdue_week_plus: u32,
    /// Overdue by more than 3 days.
    pub overdue_days_plus: u32,
    pub overdue_recent: u32,
    pub due_within_day: u32,
    pub due_within_three_days: u32,
    pub due_within_week: u32,
    pub priority_urgent: u32,
    pub priority_high: u32,
    pub priority_normal: u32,
    pub priority_low: u32,
    pub unassigned: u32,
}

impl Default for UrgencyConfig {
    fn default() -> Self {
        Self {
            urgent_threshold: 70,
            max_urgent_items: 10,
            has_due_date: 20,
            overdue_base: 40,
            overdue_week_plus: 30,
            overdue_days_plus: 20,
            overdue_recent: 10,
            due_within_day: 25,
            due_within_three_days: 15,
            due_within_week: 10,
            priority_urgent: 25,
            priority_high: 15,
            priority_normal: 5,
            priority_low: 0,
            unassigned: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BottleneckConfig {
    /// Columns holding fewer tasks than this are never considered.
    pub min_column_tasks: usize,
    /// A task counts as stalled once its last modification is older than this.
    pub stall_days: f64,
    pub min_stalled_tasks: usize,
    pub min_avg_wait_days: f64,
}

impl Default for BottleneckConfig {
    fn default() -> Self {
        Self {
            min_column_tasks: 3,
            stall_days: 2.0,
            min_stalled_tasks: 3,
            min_avg_wait_days: 3.0,
        }
    }
}

/// Decides whether a column name means "finished".
///
/// The task listing (and the priority analysis built on it) has always matched
/// column names case-insensitively, while the trend analysis matches them
/// exactly. Both behaviors are kept as separate rules; neither is assumed to
/// be the intended one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionRule {
    pub columns: Vec<String>,
    pub case_sensitive: bool,
}

impl CompletionRule {
    pub fn case_insensitive() -> Self {
        Self {
            columns: DEFAULT_COMPLETED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            case_sensitive: false,
        }
    }

    pub fn exact() -> Self {
        Self {
            case_sensitive: true,
            ..Self::case_insensitive()
        }
    }

    pub fn is_completed(&self, column: &str) -> bool {
        self.columns.iter().any(|candidate| {
            if self.case_sensitive {
                candidate == column
            } else {
                candidate.to_lowercase() == column.to_lowercase()
            }
        })
    }
}

impl Default for CompletionRule {
    fn default() -> Self {
        Self::case_insensitive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub listing: CompletionRule,
    pub trends: CompletionRule,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            listing: CompletionRule::case_insensitive(),
            trends: CompletionRule::exact(),
        }
    }
}

/// Connection settings for a live Kanboard instance.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub url: String,
    pub username: String,
    pub token: String,
    pub timeout: Duration,
}

impl UpstreamConfig {
    pub fn new(url: String, username: String, token: String, timeout_secs: u64) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            username,
            token,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }
}
