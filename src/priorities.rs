use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collector::{id_list, Collector, SortKey, TaskFilter};
use crate::config::{AnalyticsConfig, BottleneckConfig, UrgencyConfig, WorkloadConfig};
use crate::error::Result;
use crate::models::{days_between, matches_id, Priority, TaskDetail};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "snake_case")]
pub enum TimeHorizon {
    Today,
    #[default]
    Week,
    Month,
}

impl From<String> for TimeHorizon {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "today" => TimeHorizon::Today,
            "month" => TimeHorizon::Month,
            _ => TimeHorizon::Week,
        }
    }
}

impl TimeHorizon {
    /// Tasks due before this instant get a proximity bonus.
    pub fn end(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeHorizon::Today => now + Duration::days(1),
            TimeHorizon::Week => now + Duration::days(7),
            TimeHorizon::Month => now
                .checked_add_months(Months::new(1))
                .unwrap_or(now + Duration::days(30)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityRequest {
    /// Identity whose own workload is reported; the current board user when absent.
    pub user_id: Option<String>,
    #[serde(deserialize_with = "id_list")]
    pub project_ids: Vec<String>,
    pub time_horizon: TimeHorizon,
    pub include_recommendations: bool,
}

impl Default for PriorityRequest {
    fn default() -> Self {
        Self {
            user_id: None,
            project_ids: Vec::new(),
            time_horizon: TimeHorizon::Week,
            include_recommendations: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadStatus {
    SeverelyOverloaded,
    Overloaded,
    AtCapacity,
    Normal,
    Underutilized,
}

impl WorkloadStatus {
    pub fn classify(utilization: f64, config: &WorkloadConfig) -> Self {
        if utilization > config.severely_overloaded_above {
            WorkloadStatus::SeverelyOverloaded
        } else if utilization > config.overloaded_above {
            WorkloadStatus::Overloaded
        } else if utilization > config.at_capacity_above {
            WorkloadStatus::AtCapacity
        } else if utilization > config.normal_above {
            WorkloadStatus::Normal
        } else {
            WorkloadStatus::Underutilized
        }
    }

    pub fn is_overloaded(self) -> bool {
        matches!(
            self,
            WorkloadStatus::Overloaded | WorkloadStatus::SeverelyOverloaded
        )
    }

    /// Members who could take on delegated work.
    pub fn has_headroom(self) -> bool {
        matches!(self, WorkloadStatus::Normal | WorkloadStatus::Underutilized)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkloadStatus::SeverelyOverloaded => "severely_overloaded",
            WorkloadStatus::Overloaded => "overloaded",
            WorkloadStatus::AtCapacity => "at_capacity",
            WorkloadStatus::Normal => "normal",
            WorkloadStatus::Underutilized => "underutilized",
        }
    }
}

impl fmt::Display for WorkloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserWorkload {
    pub user_id: String,
    pub username: String,
    pub name: String,
    pub assigned_tasks: usize,
    pub overdue_tasks: usize,
    pub total_estimated_hours: f64,
    /// Percent of weekly capacity.
    pub capacity_utilization: f64,
    pub status: WorkloadStatus,
}

impl UserWorkload {
    pub fn utilization_label(&self) -> String {
        format!("{:.0}%", self.capacity_utilization)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgentItem {
    pub task_id: String,
    pub title: String,
    pub urgency_score: u32,
    pub reason: String,
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_overdue: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub column: String,
    pub project: String,
    pub project_id: String,
    pub stuck_tasks: usize,
    pub avg_wait_time_days: f64,
    pub task_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Priority,
    Workload,
    Delegation,
    Process,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_tasks: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requesting_user: Option<UserWorkload>,
    pub team_workloads: Vec<UserWorkload>,
    pub urgent_items: Vec<UrgentItem>,
    pub bottlenecks: Vec<Bottleneck>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityReport {
    pub analysis: PriorityAnalysis,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<Recommendation>,
}

/// Per-assignee totals, heaviest first. Unassigned tasks are not counted.
pub fn analyse_team_workloads(tasks: &[TaskDetail], config: &WorkloadConfig) -> Vec<UserWorkload> {
    let mut by_user: BTreeMap<String, UserWorkload> = BTreeMap::new();

    for task in tasks {
        let Some(assignee) = &task.assignee else {
            continue;
        };
        let entry = by_user
            .entry(assignee.id.clone())
            .or_insert_with(|| UserWorkload {
                user_id: assignee.id.clone(),
                username: assignee.username.clone(),
                name: assignee.name.clone(),
                assigned_tasks: 0,
                overdue_tasks: 0,
                total_estimated_hours: 0.0,
                capacity_utilization: 0.0,
                status: WorkloadStatus::Underutilized,
            });
        entry.assigned_tasks += 1;
        if task.is_overdue {
            entry.overdue_tasks += 1;
        }
        entry.total_estimated_hours += task.estimated_hours();
    }

    let mut workloads: Vec<UserWorkload> = by_user
        .into_values()
        .map(|mut workload| {
            workload.capacity_utilization = if config.weekly_capacity_hours > 0.0 {
                workload.total_estimated_hours / config.weekly_capacity_hours * 100.0
            } else {
                0.0
            };
            workload.status = WorkloadStatus::classify(workload.capacity_utilization, config);
            workload
        })
        .collect();

    workloads.sort_by(|a, b| {
        b.total_estimated_hours
            .partial_cmp(&a.total_estimated_hours)
            .unwrap_or(Ordering::Equal)
    });
    workloads
}

pub fn urgency_score(
    task: &TaskDetail,
    now: DateTime<Utc>,
    horizon_end: DateTime<Utc>,
    config: &UrgencyConfig,
) -> u32 {
    let mut score = 0;

    if let Some(due) = task.dates.due {
        score += config.has_due_date;

        if task.is_overdue {
            score += config.overdue_base;
            let days_overdue = -task.days_until_due.unwrap_or(0);
            score += if days_overdue > 7 {
                config.overdue_week_plus
            } else if days_overdue > 3 {
                config.overdue_days_plus
            } else {
                config.overdue_recent
            };
        } else if due < horizon_end && due >= now {
            let days_left = task.days_until_due.unwrap_or(0);
            score += if days_left <= 1 {
                config.due_within_day
            } else if days_left <= 3 {
                config.due_within_three_days
            } else if days_left <= 7 {
                config.due_within_week
            } else {
                0
            };
        }
    }

    score += match task.priority {
        Priority::Urgent => config.priority_urgent,
        Priority::High => config.priority_high,
        Priority::Normal => config.priority_normal,
        Priority::Low => config.priority_low,
    };

    if task.assignee.is_none() {
        score += config.unassigned;
    }

    score
}

/// The single most pressing reason a task needs attention.
pub fn urgency_reason(task: &TaskDetail) -> String {
    if task.is_overdue {
        return match task.days_until_due {
            Some(-1) => "Overdue by 1 day".to_string(),
            Some(days) => format!("Overdue by {} days", -days),
            None => "Task is overdue".to_string(),
        };
    }

    match task.days_until_due {
        Some(0) => return "Due today".to_string(),
        Some(1) => return "Due tomorrow".to_string(),
        Some(days) if days <= 3 => return format!("Due in {days} days"),
        _ => {}
    }

    match task.priority {
        Priority::Urgent => "marked as urgent priority".to_string(),
        Priority::High => "marked as high priority".to_string(),
        _ if task.assignee.is_none() => "unassigned task needs attention".to_string(),
        _ => "High priority task".to_string(),
    }
}

/// Tasks at or above the urgency threshold, highest score first, capped.
pub fn find_urgent_items(
    tasks: &[TaskDetail],
    horizon: TimeHorizon,
    now: DateTime<Utc>,
    config: &UrgencyConfig,
) -> Vec<UrgentItem> {
    let horizon_end = horizon.end(now);
    let mut items: Vec<UrgentItem> = tasks
        .iter()
        .filter_map(|task| {
            let score = urgency_score(task, now, horizon_end, config);
            (score >= config.urgent_threshold).then(|| UrgentItem {
                task_id: task.id.clone(),
                title: task.title.clone(),
                urgency_score: score,
                reason: urgency_reason(task),
                project: task.project.name.clone(),
                days_overdue: if task.is_overdue {
                    task.days_until_due.map(|days| -days)
                } else {
                    None
                },
            })
        })
        .collect();

    // Equal scores rank the longest overdue first, then by task id.
    items.sort_by(|a, b| {
        b.urgency_score
            .cmp(&a.urgency_score)
            .then_with(|| b.days_overdue.cmp(&a.days_overdue))
            .then_with(|| compare_ids(&a.task_id, &b.task_id))
    });
    items.truncate(config.max_urgent_items);
    items
}

fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Board columns where several tasks have sat untouched for days.
pub fn find_bottlenecks(
    tasks: &[TaskDetail],
    now: DateTime<Utc>,
    config: &BottleneckConfig,
) -> Vec<Bottleneck> {
    let mut columns: BTreeMap<(String, String, String), Vec<&TaskDetail>> = BTreeMap::new();
    for task in tasks {
        columns
            .entry((
                task.project.id.clone(),
                task.project.name.clone(),
                task.status.column.clone(),
            ))
            .or_default()
            .push(task);
    }

    let mut bottlenecks = Vec::new();
    for ((project_id, project, column), column_tasks) in columns {
        if column_tasks.len() < config.min_column_tasks {
            continue;
        }

        let mut total_wait = 0.0;
        let mut task_ids = Vec::new();
        for task in column_tasks {
            let Some(modified) = task.dates.modified else {
                continue;
            };
            let wait = days_between(modified, now);
            if wait > config.stall_days {
                total_wait += wait;
                task_ids.push(task.id.clone());
            }
        }

        if task_ids.len() < config.min_stalled_tasks {
            continue;
        }
        let avg_wait = total_wait / task_ids.len() as f64;
        if avg_wait > config.min_avg_wait_days {
            debug!(%project, %column, stuck = task_ids.len(), avg_wait, "bottleneck found");
            bottlenecks.push(Bottleneck {
                column,
                project,
                project_id,
                stuck_tasks: task_ids.len(),
                avg_wait_time_days: avg_wait,
                task_ids,
            });
        }
    }

    bottlenecks.sort_by(|a, b| {
        b.avg_wait_time_days
            .partial_cmp(&a.avg_wait_time_days)
            .unwrap_or(Ordering::Equal)
    });
    bottlenecks
}

pub fn analyse(
    tasks: &[TaskDetail],
    requesting_user_id: Option<&str>,
    horizon: TimeHorizon,
    now: DateTime<Utc>,
    config: &AnalyticsConfig,
) -> PriorityAnalysis {
    let team_workloads = analyse_team_workloads(tasks, &config.workload);
    let requesting_user = requesting_user_id.and_then(|user_id| {
        team_workloads
            .iter()
            .find(|w| matches_id(&w.user_id, user_id))
            .cloned()
    });

    PriorityAnalysis {
        requesting_user,
        urgent_items: find_urgent_items(tasks, horizon, now, &config.urgency),
        bottlenecks: find_bottlenecks(tasks, now, &config.bottleneck),
        team_workloads,
    }
}

pub fn generate_recommendations(
    analysis: &PriorityAnalysis,
    min_stalled_tasks: usize,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if let Some(top) = analysis.urgent_items.first() {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Priority,
            message: format!(
                "Focus on '{}' first - urgency score: {} ({})",
                top.title, top.urgency_score, top.reason
            ),
            task_ids: vec![top.task_id.clone()],
            suggested_assignee: None,
            affected_tasks: Vec::new(),
            confidence: 0.92,
        });
    }

    if let Some(user) = analysis
        .requesting_user
        .as_ref()
        .filter(|user| user.status.is_overloaded())
    {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Workload,
            message: format!(
                "Your workload is {} ({} utilization) - consider delegating or deferring lower priority tasks",
                user.status,
                user.utilization_label()
            ),
            task_ids: Vec::new(),
            suggested_assignee: None,
            affected_tasks: Vec::new(),
            confidence: 0.85,
        });
    }

    // Workloads are sorted heaviest first, so the first overloaded member carries the most hours.
    let source = analysis
        .team_workloads
        .iter()
        .find(|w| w.status.is_overloaded());
    let target = analysis
        .team_workloads
        .iter()
        .filter(|w| w.status.has_headroom())
        .min_by(|a, b| {
            a.capacity_utilization
                .partial_cmp(&b.capacity_utilization)
                .unwrap_or(Ordering::Equal)
        });
    if let (Some(source), Some(target)) = (source, target) {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Delegation,
            message: format!(
                "Consider redistributing tasks from {} ({}) to {} ({})",
                source.name,
                source.utilization_label(),
                target.name,
                target.utilization_label()
            ),
            task_ids: Vec::new(),
            suggested_assignee: Some(target.user_id.clone()),
            affected_tasks: Vec::new(),
            confidence: 0.78,
        });
    }

    for bottleneck in &analysis.bottlenecks {
        if bottleneck.stuck_tasks < min_stalled_tasks {
            continue;
        }
        recommendations.push(Recommendation {
            kind: RecommendationKind::Process,
            message: format!(
                "'{}' column in {} has bottleneck - {} tasks waiting {:.1} days on average",
                bottleneck.column,
                bottleneck.project,
                bottleneck.stuck_tasks,
                bottleneck.avg_wait_time_days
            ),
            task_ids: Vec::new(),
            suggested_assignee: None,
            affected_tasks: bottleneck.task_ids.clone(),
            confidence: 0.85,
        });
    }

    recommendations
}

pub struct PriorityAnalyzer {
    collector: Collector,
}

impl PriorityAnalyzer {
    pub fn new(collector: Collector) -> Self {
        Self { collector }
    }

    pub async fn analyse(
        &self,
        request: &PriorityRequest,
        now: DateTime<Utc>,
    ) -> Result<PriorityReport> {
        let user_id = match &request.user_id {
            Some(id) => Some(id.clone()),
            None => match self.collector.source().fetch_current_user().await {
                Ok(user) => Some(user.id.to_string()),
                Err(e) => {
                    warn!(error = %e, "could not resolve the current user; skipping personal workload");
                    None
                }
            },
        };

        let tasks = self
            .collector
            .gather(
                &request.project_ids,
                &TaskFilter::everything(),
                SortKey::DueDate,
                true,
                now,
            )
            .await?;

        let config = self.collector.config();
        let analysis = analyse(
            &tasks,
            user_id.as_deref(),
            request.time_horizon,
            now,
            config,
        );
        let recommendations = if request.include_recommendations {
            generate_recommendations(&analysis, config.bottleneck.min_stalled_tasks)
        } else {
            Vec::new()
        };

        info!(
            tasks = tasks.len(),
            team = analysis.team_workloads.len(),
            urgent = analysis.urgent_items.len(),
            bottlenecks = analysis.bottlenecks.len(),
            recommendations = recommendations.len(),
            "priority analysis complete"
        );
        Ok(PriorityReport {
            analysis,
            recommendations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::tests::{assigned, now, task, with_due};
    use crate::models::{ProjectRaw, TaskRaw, TimeTracking, UserRaw};
    use crate::source::{ProjectSnapshot, Snapshot, SnapshotSource};
    use std::sync::Arc;

    fn estimated(mut task: TaskDetail, hours: f64) -> TaskDetail {
        task.time_tracking = Some(TimeTracking::new(hours, 0.0));
        task
    }

    fn stalled(mut task: TaskDetail, days: i64) -> TaskDetail {
        task.dates.modified = Some(now() - Duration::days(days));
        task
    }

    fn score(task: &TaskDetail) -> u32 {
        urgency_score(
            task,
            now(),
            TimeHorizon::Week.end(now()),
            &UrgencyConfig::default(),
        )
    }

    #[test]
    fn utilization_boundaries_are_strict() {
        let config = WorkloadConfig::default();
        assert_eq!(WorkloadStatus::classify(100.0, &config), WorkloadStatus::AtCapacity);
        assert_eq!(
            WorkloadStatus::classify(120.01, &config),
            WorkloadStatus::SeverelyOverloaded
        );
        assert_eq!(WorkloadStatus::classify(120.0, &config), WorkloadStatus::Overloaded);
        assert_eq!(WorkloadStatus::classify(80.5, &config), WorkloadStatus::AtCapacity);
        assert_eq!(WorkloadStatus::classify(50.0, &config), WorkloadStatus::Underutilized);
        assert_eq!(WorkloadStatus::classify(50.1, &config), WorkloadStatus::Normal);
    }

    #[test]
    fn team_workloads_sum_hours_and_rank_heaviest_first() {
        let tasks = vec![
            estimated(assigned(task(1, "Doing"), "7"), 30.0),
            estimated(assigned(task(2, "Doing"), "7"), 10.0),
            estimated(assigned(task(3, "Doing"), "8"), 50.0),
            with_due(assigned(task(4, "Doing"), "8"), Duration::days(-1)),
            estimated(task(5, "Doing"), 99.0),
        ];
        let workloads = analyse_team_workloads(&tasks, &WorkloadConfig::default());
        assert_eq!(workloads.len(), 2);
        assert_eq!(workloads[0].user_id, "8");
        assert_eq!(workloads[0].assigned_tasks, 2);
        assert_eq!(workloads[0].overdue_tasks, 1);
        assert_eq!(workloads[0].status, WorkloadStatus::SeverelyOverloaded);
        assert_eq!(workloads[1].capacity_utilization, 100.0);
        assert_eq!(workloads[1].status, WorkloadStatus::AtCapacity);
        assert_eq!(workloads[1].utilization_label(), "100%");
    }

    #[test]
    fn urgency_score_adds_each_condition() {
        let mut urgent = with_due(task(1, "Doing"), Duration::days(-10));
        urgent.priority = Priority::Urgent;
        // due + overdue + >7 days + urgent + unassigned
        assert_eq!(score(&urgent), 20 + 40 + 30 + 25 + 15);

        let plain = assigned(task(2, "Doing"), "7");
        assert_eq!(score(&plain), 5);

        let overdue = with_due(plain.clone(), Duration::days(-10));
        let upcoming = with_due(plain.clone(), Duration::days(10));
        assert!(score(&overdue) > score(&upcoming));
        assert!(score(&upcoming) > score(&plain));

        let mut high = plain.clone();
        high.priority = Priority::High;
        assert!(score(&high) > score(&plain));
        assert!(score(&task(3, "Doing")) > score(&plain));
    }

    #[test]
    fn horizon_controls_proximity_bonus() {
        let due_soon = with_due(assigned(task(1, "Doing"), "7"), Duration::days(5) + Duration::hours(1));
        let config = UrgencyConfig::default();
        let week = urgency_score(&due_soon, now(), TimeHorizon::Week.end(now()), &config);
        let today = urgency_score(&due_soon, now(), TimeHorizon::Today.end(now()), &config);
        assert_eq!(week, 20 + 10 + 5);
        assert_eq!(today, 20 + 5);

        let tomorrow = with_due(assigned(task(2, "Doing"), "7"), Duration::hours(20));
        assert_eq!(score(&tomorrow), 20 + 25 + 5);
    }

    #[test]
    fn unknown_horizon_falls_back_to_week() {
        assert_eq!(TimeHorizon::from("fortnight".to_string()), TimeHorizon::Week);
        let request: PriorityRequest =
            serde_json::from_str(r#"{"time_horizon": "month", "project_ids": [2]}"#).unwrap();
        assert_eq!(request.time_horizon, TimeHorizon::Month);
        assert_eq!(request.project_ids, ["2"]);
        assert!(request.include_recommendations);
    }

    #[test]
    fn reasons_pick_the_most_pressing_condition() {
        assert_eq!(
            urgency_reason(&with_due(task(1, "Doing"), Duration::days(-4))),
            "Overdue by 4 days"
        );
        assert_eq!(
            urgency_reason(&with_due(task(1, "Doing"), Duration::hours(-2))),
            "Overdue by 1 day"
        );
        assert_eq!(
            urgency_reason(&with_due(task(1, "Doing"), Duration::hours(3))),
            "Due today"
        );
        assert_eq!(
            urgency_reason(&with_due(task(1, "Doing"), Duration::hours(30))),
            "Due tomorrow"
        );
        let mut high = assigned(task(2, "Doing"), "7");
        high.priority = Priority::High;
        assert_eq!(urgency_reason(&high), "marked as high priority");
        assert_eq!(urgency_reason(&task(3, "Doing")), "unassigned task needs attention");
        assert_eq!(urgency_reason(&assigned(task(4, "Doing"), "7")), "High priority task");
    }

    #[test]
    fn urgent_items_respect_threshold_and_cap() {
        let mut tasks: Vec<TaskDetail> = (0..15)
            .map(|i| with_due(task(i, "Doing"), Duration::days(-(i as i64) - 1)))
            .collect();
        // 20 + 5 = 25, below the threshold
        tasks.push(with_due(assigned(task(99, "Doing"), "7"), Duration::days(20)));

        let items = find_urgent_items(&tasks, TimeHorizon::Week, now(), &UrgencyConfig::default());
        assert_eq!(items.len(), 10);
        assert!(items.iter().all(|i| i.urgency_score >= 70));
        assert!(items.windows(2).all(|w| w[0].urgency_score >= w[1].urgency_score));
        assert!(items.iter().all(|i| i.task_id != "99"));
        assert_eq!(items[0].urgency_score, 20 + 40 + 30 + 5 + 15);
        assert_eq!(items[0].days_overdue, Some(15));
    }

    #[test]
    fn urgent_ties_do_not_depend_on_input_order() {
        let mut tasks = vec![
            with_due(task(10, "Doing"), Duration::days(-9)),
            with_due(task(9, "Doing"), Duration::days(-9)),
            with_due(task(3, "Doing"), Duration::days(-20)),
        ];
        let config = UrgencyConfig::default();
        let forward = find_urgent_items(&tasks, TimeHorizon::Week, now(), &config);
        tasks.reverse();
        let backward = find_urgent_items(&tasks, TimeHorizon::Week, now(), &config);

        let ids: Vec<&str> = forward.iter().map(|i| i.task_id.as_str()).collect();
        assert_eq!(ids, ["3", "9", "10"]);
        assert!(forward.iter().all(|i| i.urgency_score == forward[0].urgency_score));
        assert_eq!(forward, backward);
    }

    #[test]
    fn three_stalled_tasks_form_a_bottleneck() {
        let tasks = vec![
            stalled(task(1, "Review"), 4),
            stalled(task(2, "Review"), 4),
            stalled(task(3, "Review"), 4),
        ];
        let found = find_bottlenecks(&tasks, now(), &BottleneckConfig::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].column, "Review");
        assert_eq!(found[0].stuck_tasks, 3);
        assert!((found[0].avg_wait_time_days - 4.0).abs() < 1e-9);
    }

    #[test]
    fn too_few_stalled_tasks_is_not_a_bottleneck() {
        let two = vec![stalled(task(1, "Review"), 10), stalled(task(2, "Review"), 10)];
        assert!(find_bottlenecks(&two, now(), &BottleneckConfig::default()).is_empty());

        let one_recent = vec![
            stalled(task(1, "Review"), 10),
            stalled(task(2, "Review"), 10),
            stalled(task(3, "Review"), 1),
            task(4, "Review"),
        ];
        assert!(find_bottlenecks(&one_recent, now(), &BottleneckConfig::default()).is_empty());

        let short_waits = vec![
            stalled(task(1, "Review"), 3),
            stalled(task(2, "Review"), 3),
            stalled(task(3, "Review"), 3),
        ];
        assert!(find_bottlenecks(&short_waits, now(), &BottleneckConfig::default()).is_empty());
    }

    #[test]
    fn recommendations_cover_each_rule() {
        let tasks = vec![
            estimated(assigned(task(1, "Review"), "7"), 50.0),
            estimated(assigned(task(2, "Review"), "8"), 25.0),
            estimated(assigned(task(3, "Review"), "9"), 10.0),
            stalled(with_due(task(4, "Review"), Duration::days(-9)), 5),
            stalled(task(5, "Review"), 5),
            stalled(task(6, "Review"), 5),
        ];
        let analysis = analyse(
            &tasks,
            Some("07"),
            TimeHorizon::Week,
            now(),
            &AnalyticsConfig::default(),
        );
        assert_eq!(analysis.requesting_user.as_ref().unwrap().user_id, "7");

        let recommendations = generate_recommendations(&analysis, 3);
        let kinds: Vec<RecommendationKind> = recommendations.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            [
                RecommendationKind::Priority,
                RecommendationKind::Workload,
                RecommendationKind::Delegation,
                RecommendationKind::Process,
            ]
        );
        assert_eq!(recommendations[0].task_ids, ["4"]);
        assert_eq!(recommendations[2].suggested_assignee.as_deref(), Some("9"));
        assert_eq!(
            recommendations[2].message,
            "Consider redistributing tasks from User 7 (125%) to User 9 (25%)"
        );
        assert_eq!(recommendations[3].affected_tasks, ["4", "5", "6"]);
    }

    #[tokio::test]
    async fn analyzer_resolves_current_user_from_source() {
        let snapshot = Snapshot {
            base_url: "https://board.example.com".to_string(),
            current_user: Some(UserRaw {
                id: 7,
                username: "ana".to_string(),
                name: "Ana".to_string(),
            }),
            projects: vec![ProjectSnapshot {
                project: ProjectRaw {
                    id: 1,
                    name: "Website".to_string(),
                },
                users: vec![UserRaw {
                    id: 7,
                    username: "ana".to_string(),
                    name: "Ana".to_string(),
                }],
                tasks: vec![TaskRaw {
                    id: 1,
                    owner_id: 7,
                    time_estimated: 45.0,
                    date_due: Some(now() - Duration::days(1)),
                    ..TaskRaw::default()
                }],
                ..ProjectSnapshot::default()
            }],
            ..Snapshot::default()
        };
        let collector = Collector::new(
            Arc::new(SnapshotSource::new(snapshot)),
            Arc::new(AnalyticsConfig::default()),
        );
        let report = PriorityAnalyzer::new(collector)
            .analyse(&PriorityRequest::default(), now())
            .await
            .unwrap();

        let me = report.analysis.requesting_user.unwrap();
        assert_eq!(me.username, "ana");
        assert_eq!(me.status, WorkloadStatus::Overloaded);
        // 20 due + 40 overdue + 10 recent + 5 normal
        assert_eq!(report.analysis.urgent_items[0].urgency_score, 75);
        let kinds: Vec<RecommendationKind> =
            report.recommendations.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            [RecommendationKind::Priority, RecommendationKind::Workload]
        );
    }
}
