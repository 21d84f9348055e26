use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::collector::{id_list, Collector, SortKey, TaskFilter};
use crate::config::CompletionRule;
use crate::error::Result;
use crate::models::{days_between, TaskDetail};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum TimeRange {
    #[serde(rename = "7_days")]
    SevenDays,
    #[serde(rename = "14_days")]
    FourteenDays,
    #[default]
    #[serde(rename = "30_days")]
    ThirtyDays,
    #[serde(rename = "60_days")]
    SixtyDays,
    #[serde(rename = "90_days")]
    NinetyDays,
    #[serde(rename = "6_months")]
    SixMonths,
    #[serde(rename = "1_year")]
    OneYear,
}

impl From<String> for TimeRange {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "7_days" => TimeRange::SevenDays,
            "14_days" => TimeRange::FourteenDays,
            "60_days" => TimeRange::SixtyDays,
            "90_days" => TimeRange::NinetyDays,
            "6_months" => TimeRange::SixMonths,
            "1_year" => TimeRange::OneYear,
            _ => TimeRange::ThirtyDays,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::SevenDays => "7_days",
            TimeRange::FourteenDays => "14_days",
            TimeRange::ThirtyDays => "30_days",
            TimeRange::SixtyDays => "60_days",
            TimeRange::NinetyDays => "90_days",
            TimeRange::SixMonths => "6_months",
            TimeRange::OneYear => "1_year",
        }
    }

    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let days = |n| now - Duration::days(n);
        let months = |n| {
            now.checked_sub_months(Months::new(n))
                .unwrap_or(now - Duration::days(30 * i64::from(n)))
        };
        match self {
            TimeRange::SevenDays => days(7),
            TimeRange::FourteenDays => days(14),
            TimeRange::ThirtyDays => days(30),
            TimeRange::SixtyDays => days(60),
            TimeRange::NinetyDays => days(90),
            TimeRange::SixMonths => months(6),
            TimeRange::OneYear => months(12),
        }
    }

    pub fn granularity(self) -> Granularity {
        match self {
            TimeRange::SevenDays | TimeRange::FourteenDays => Granularity::Daily,
            TimeRange::ThirtyDays | TimeRange::SixtyDays | TimeRange::NinetyDays => {
                Granularity::Weekly
            }
            TimeRange::SixMonths | TimeRange::OneYear => Granularity::Monthly,
        }
    }

    /// Spacing of burndown samples.
    pub fn sample_interval(self) -> Duration {
        match self {
            TimeRange::SevenDays
            | TimeRange::FourteenDays
            | TimeRange::ThirtyDays
            | TimeRange::SixtyDays => Duration::days(1),
            _ => Duration::weeks(1),
        }
    }
}

/// Sortable bucket label: `2026-03-10`, `2026-W11` (ISO week) or `2026-03`.
pub fn period_key(at: DateTime<Utc>, range: TimeRange) -> String {
    match range.granularity() {
        Granularity::Daily => at.format("%Y-%m-%d").to_string(),
        Granularity::Weekly => at.format("%G-W%V").to_string(),
        Granularity::Monthly => at.format("%Y-%m").to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    CompletionTrends,
    CycleTime,
    Velocity,
    TaskAging,
    Burndown,
    ProjectHealth,
}

impl AnalysisKind {
    pub const DEFAULTS: [AnalysisKind; 4] = [
        AnalysisKind::CompletionTrends,
        AnalysisKind::CycleTime,
        AnalysisKind::Velocity,
        AnalysisKind::TaskAging,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "completion_trends" => Some(AnalysisKind::CompletionTrends),
            "cycle_time" => Some(AnalysisKind::CycleTime),
            "velocity" => Some(AnalysisKind::Velocity),
            "task_aging" => Some(AnalysisKind::TaskAging),
            "burndown" => Some(AnalysisKind::Burndown),
            "project_health" => Some(AnalysisKind::ProjectHealth),
            _ => None,
        }
    }
}

/// Unknown analysis names are dropped rather than rejected.
fn known_kinds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<AnalysisKind>, D::Error> {
    let names = Vec::<String>::deserialize(deserializer)?;
    Ok(names.iter().filter_map(|n| AnalysisKind::parse(n)).collect())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendRequest {
    #[serde(deserialize_with = "id_list")]
    pub project_ids: Vec<String>,
    pub time_range: TimeRange,
    #[serde(deserialize_with = "known_kinds")]
    pub analysis_types: Vec<AnalysisKind>,
    /// Accepted for compatibility; grouping is fixed per metric.
    pub group_by: String,
}

impl Default for TrendRequest {
    fn default() -> Self {
        Self {
            project_ids: Vec::new(),
            time_range: TimeRange::ThirtyDays,
            analysis_types: AnalysisKind::DEFAULTS.to_vec(),
            group_by: "project".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionTrend {
    pub period: String,
    pub tasks_completed: usize,
    pub tasks_created: usize,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleEfficiency {
    Good,
    Average,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleTimeMetric {
    pub column: String,
    pub project: String,
    pub avg_days: f64,
    pub min_days: f64,
    pub max_days: f64,
    pub task_count: usize,
    pub efficiency: CycleEfficiency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EfficiencyRating {
    Excellent,
    Good,
    Average,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityMetric {
    pub period: String,
    pub tasks_completed: usize,
    /// One point per completed task.
    pub story_points: usize,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub velocity_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efficiency_rating: Option<EfficiencyRating>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingBand {
    pub age_group: String,
    pub task_count: usize,
    pub percentage: f64,
    pub avg_age_days: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_task: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurndownPoint {
    pub date: String,
    pub remaining_tasks: i64,
    pub completed_tasks: i64,
    pub ideal_remaining: i64,
    pub trend_projection: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityIndicator {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectHealth {
    pub project_id: String,
    pub project_name: String,
    pub health_score: f64,
    pub completion_rate: f64,
    pub on_time_delivery: f64,
    pub team_utilisation: f64,
    pub quality_indicator: QualityIndicator,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductivityTrend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub analysis_period: TimeRange,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub overall_velocity: f64,
    pub avg_cycle_time: f64,
    pub productivity_trend: ProductivityTrend,
    pub key_insights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub summary: TrendSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_trends: Option<Vec<CompletionTrend>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_time_metrics: Option<Vec<CycleTimeMetric>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_metrics: Option<Vec<VelocityMetric>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_aging: Option<Vec<AgingBand>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burndown_chart: Option<Vec<BurndownPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_health: Option<Vec<ProjectHealth>>,
}

/// Tasks created at or after `start`. Tasks with no creation date are dropped.
pub fn within_window(tasks: Vec<TaskDetail>, start: DateTime<Utc>) -> Vec<TaskDetail> {
    tasks
        .into_iter()
        .filter(|t| t.dates.created.is_some_and(|created| created >= start))
        .collect()
}

pub fn completion_rate(completed: usize, created: usize) -> f64 {
    if created == 0 {
        0.0
    } else {
        completed as f64 / created as f64 * 100.0
    }
}

pub fn completion_trends(
    tasks: &[TaskDetail],
    range: TimeRange,
    rule: &CompletionRule,
) -> Vec<CompletionTrend> {
    let mut periods: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for task in tasks {
        let Some(created) = task.dates.created else {
            continue;
        };
        let entry = periods.entry(period_key(created, range)).or_default();
        entry.0 += 1;
        if rule.is_completed(&task.status.column) {
            entry.1 += 1;
        }
    }

    periods
        .into_iter()
        .map(|(period, (created, completed))| CompletionTrend {
            period,
            tasks_completed: completed,
            tasks_created: created,
            completion_rate: completion_rate(completed, created),
        })
        .collect()
}

/// Days from start (or creation) to last modification, for a finished task.
fn cycle_days(task: &TaskDetail) -> Option<f64> {
    let start = task.dates.started.or(task.dates.created)?;
    let end = task.dates.modified?;
    let days = days_between(start, end);
    (days > 0.0).then_some(days)
}

pub fn cycle_time(tasks: &[TaskDetail], rule: &CompletionRule) -> Vec<CycleTimeMetric> {
    let mut groups: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
    for task in tasks {
        if !rule.is_completed(&task.status.column) {
            continue;
        }
        if let Some(days) = cycle_days(task) {
            groups
                .entry((task.project.name.clone(), task.status.column.clone()))
                .or_default()
                .push(days);
        }
    }

    let mut metrics: Vec<CycleTimeMetric> = groups
        .into_iter()
        .map(|((project, column), times)| {
            let avg = times.iter().sum::<f64>() / times.len() as f64;
            let min = times.iter().copied().fold(f64::INFINITY, f64::min);
            let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let efficiency = if avg > 14.0 {
                CycleEfficiency::Poor
            } else if avg > 7.0 {
                CycleEfficiency::Average
            } else {
                CycleEfficiency::Good
            };
            CycleTimeMetric {
                column,
                project,
                avg_days: avg,
                min_days: min,
                max_days: max,
                task_count: times.len(),
                efficiency,
            }
        })
        .collect();

    metrics.sort_by(|a, b| {
        b.avg_days
            .partial_cmp(&a.avg_days)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    metrics
}

pub fn efficiency_rating(actual_hours: f64, estimated_hours: f64) -> Option<EfficiencyRating> {
    if estimated_hours <= 0.0 {
        return None;
    }
    let ratio = actual_hours / estimated_hours;
    Some(if ratio <= 1.1 {
        EfficiencyRating::Excellent
    } else if ratio <= 1.3 {
        EfficiencyRating::Good
    } else if ratio <= 1.5 {
        EfficiencyRating::Average
    } else {
        EfficiencyRating::Poor
    })
}

/// Completed tasks grouped by the period of their last modification.
pub fn velocity(tasks: &[TaskDetail], range: TimeRange, rule: &CompletionRule) -> Vec<VelocityMetric> {
    let mut periods: BTreeMap<String, VelocityMetric> = BTreeMap::new();
    for task in tasks {
        if !rule.is_completed(&task.status.column) {
            continue;
        }
        let Some(completed_at) = task.dates.modified else {
            continue;
        };
        let period = period_key(completed_at, range);
        let metric = periods
            .entry(period.clone())
            .or_insert_with(|| VelocityMetric {
                period,
                tasks_completed: 0,
                story_points: 0,
                estimated_hours: 0.0,
                actual_hours: 0.0,
                velocity_score: 0.0,
                efficiency_rating: None,
            });
        metric.tasks_completed += 1;
        metric.story_points += 1;
        metric.estimated_hours += task.estimated_hours();
        metric.actual_hours += task.spent_hours();
    }

    periods
        .into_values()
        .map(|mut metric| {
            metric.velocity_score = metric.tasks_completed as f64;
            metric.efficiency_rating = efficiency_rating(metric.actual_hours, metric.estimated_hours);
            metric
        })
        .collect()
}

const AGE_BANDS: [(&str, f64); 5] = [
    ("0-7 days", 7.0),
    ("8-14 days", 14.0),
    ("15-30 days", 30.0),
    ("31-60 days", 60.0),
    ("60+ days", f64::INFINITY),
];

/// Open tasks bucketed by age. Empty bands are left out.
pub fn task_aging(tasks: &[TaskDetail], now: DateTime<Utc>, rule: &CompletionRule) -> Vec<AgingBand> {
    let mut bands: Vec<AgingBand> = AGE_BANDS
        .iter()
        .map(|(label, _)| AgingBand {
            age_group: label.to_string(),
            task_count: 0,
            percentage: 0.0,
            avg_age_days: 0.0,
            oldest_task: None,
        })
        .collect();

    let mut active = 0usize;
    let mut oldest: Option<(f64, &str)> = None;
    for task in tasks {
        if rule.is_completed(&task.status.column) {
            continue;
        }
        active += 1;
        let Some(created) = task.dates.created else {
            continue;
        };
        let age = days_between(created, now);
        if oldest.map_or(true, |(max, _)| age > max) {
            oldest = Some((age, task.title.as_str()));
        }

        let index = AGE_BANDS
            .iter()
            .position(|(_, upper)| age <= *upper)
            .unwrap_or(AGE_BANDS.len() - 1);
        let band = &mut bands[index];
        band.task_count += 1;
        band.avg_age_days += (age - band.avg_age_days) / band.task_count as f64;
    }

    let last = bands.len() - 1;
    if let Some((_, title)) = oldest {
        if bands[last].task_count > 0 {
            bands[last].oldest_task = Some(title.to_string());
        }
    }
    for band in &mut bands {
        band.percentage = completion_rate(band.task_count, active);
    }
    bands.retain(|band| band.task_count > 0);
    bands
}

/// Remaining-work samples across the window.
///
/// Scope at each sample is the tasks that existed at the window start plus
/// those created since; the ideal line falls linearly from the whole window's
/// scope to zero.
pub fn burndown(
    tasks: &[TaskDetail],
    range: TimeRange,
    now: DateTime<Utc>,
    rule: &CompletionRule,
) -> Vec<BurndownPoint> {
    let start = range.start(now);
    let interval = range.sample_interval();

    let mut samples = Vec::new();
    let mut at = start;
    while at <= now {
        samples.push(at);
        at += interval;
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let baseline = tasks
        .iter()
        .filter(|t| t.dates.created.is_some_and(|c| c <= start))
        .count() as i64;
    let scope = tasks.len() as f64;
    let last_index = samples.len().saturating_sub(1);

    let mut points: Vec<BurndownPoint> = Vec::with_capacity(samples.len());
    for (i, date) in samples.iter().enumerate() {
        let created = tasks
            .iter()
            .filter(|t| t.dates.created.is_some_and(|c| c > start && c <= *date))
            .count() as i64;
        let completed = tasks
            .iter()
            .filter(|t| rule.is_completed(&t.status.column))
            .filter(|t| t.dates.modified.is_some_and(|m| m <= *date))
            .count() as i64;
        let remaining = baseline + created - completed;

        let progress = if last_index == 0 {
            0.0
        } else {
            i as f64 / last_index as f64
        };
        let ideal = (scope * (1.0 - progress)).floor() as i64;

        let projection = match points.last() {
            Some(previous) if i > 0 => {
                let velocity = previous.remaining_tasks - remaining;
                let samples_left = (samples.len() - i - 1) as i64;
                (remaining - velocity * samples_left).max(0)
            }
            _ => remaining,
        };

        points.push(BurndownPoint {
            date: date.format("%Y-%m-%d").to_string(),
            remaining_tasks: remaining,
            completed_tasks: completed,
            ideal_remaining: ideal,
            trend_projection: projection,
        });
    }
    points
}

#[derive(Default)]
struct ProjectTally {
    name: String,
    total: usize,
    completed: usize,
    on_time: usize,
    overdue: usize,
    estimated_hours: f64,
    spent_hours: f64,
}

pub fn project_health(tasks: &[TaskDetail], rule: &CompletionRule) -> Vec<ProjectHealth> {
    let mut projects: BTreeMap<String, ProjectTally> = BTreeMap::new();
    for task in tasks {
        let tally = projects
            .entry(task.project.id.clone())
            .or_insert_with(|| ProjectTally {
                name: task.project.name.clone(),
                ..ProjectTally::default()
            });
        tally.total += 1;
        if rule.is_completed(&task.status.column) {
            tally.completed += 1;
            if let (Some(due), Some(modified)) = (task.dates.due, task.dates.modified) {
                if modified <= due {
                    tally.on_time += 1;
                }
            }
        }
        if task.is_overdue {
            tally.overdue += 1;
        }
        tally.estimated_hours += task.estimated_hours();
        tally.spent_hours += task.spent_hours();
    }

    let mut health: Vec<ProjectHealth> = projects
        .into_iter()
        .map(|(project_id, tally)| {
            let completion = completion_rate(tally.completed, tally.total);
            let on_time = completion_rate(tally.on_time, tally.completed);
            let utilisation = if tally.estimated_hours > 0.0 {
                (tally.spent_hours / tally.estimated_hours * 100.0).min(100.0)
            } else {
                0.0
            };
            let score = completion * 0.4 + on_time * 0.3 + utilisation * 0.3;
            let overdue_pct = completion_rate(tally.overdue, tally.total);

            ProjectHealth {
                project_id,
                project_name: tally.name,
                health_score: score,
                completion_rate: completion,
                on_time_delivery: on_time,
                team_utilisation: utilisation,
                quality_indicator: quality_indicator(score),
                risk_level: risk_level(overdue_pct, score),
            }
        })
        .collect();

    health.sort_by(|a, b| {
        b.health_score
            .partial_cmp(&a.health_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    health
}

pub fn quality_indicator(score: f64) -> QualityIndicator {
    if score >= 90.0 {
        QualityIndicator::Excellent
    } else if score >= 75.0 {
        QualityIndicator::Good
    } else if score >= 60.0 {
        QualityIndicator::Fair
    } else {
        QualityIndicator::Poor
    }
}

pub fn risk_level(overdue_pct: f64, score: f64) -> RiskLevel {
    if overdue_pct > 30.0 || score < 50.0 {
        RiskLevel::High
    } else if overdue_pct > 15.0 || score < 70.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Compares completions in the second half of the window against the first.
pub fn productivity_trend(
    tasks: &[TaskDetail],
    range: TimeRange,
    now: DateTime<Utc>,
    rule: &CompletionRule,
) -> ProductivityTrend {
    let start = range.start(now);
    let midpoint = start + (now - start) / 2;
    let (mut first, mut second) = (0usize, 0usize);
    for task in tasks {
        if !rule.is_completed(&task.status.column) {
            continue;
        }
        match task.dates.modified {
            Some(at) if at >= start && at < midpoint => first += 1,
            Some(at) if at >= midpoint && at <= now => second += 1,
            _ => {}
        }
    }

    if first == 0 {
        return if second > 0 {
            ProductivityTrend::Improving
        } else {
            ProductivityTrend::Stable
        };
    }
    let ratio = second as f64 / first as f64;
    if ratio > 1.1 {
        ProductivityTrend::Improving
    } else if ratio < 0.9 {
        ProductivityTrend::Declining
    } else {
        ProductivityTrend::Stable
    }
}

pub fn summarize(
    tasks: &[TaskDetail],
    range: TimeRange,
    now: DateTime<Utc>,
    rule: &CompletionRule,
) -> TrendSummary {
    let completed: Vec<&TaskDetail> = tasks
        .iter()
        .filter(|t| rule.is_completed(&t.status.column))
        .collect();
    let cycles: Vec<f64> = completed.iter().filter_map(|t| cycle_days(t)).collect();
    let avg_cycle_time = if cycles.is_empty() {
        0.0
    } else {
        cycles.iter().sum::<f64>() / cycles.len() as f64
    };

    let mut key_insights = Vec::new();
    if !tasks.is_empty() {
        let rate = completion_rate(completed.len(), tasks.len());
        if rate > 80.0 {
            key_insights.push("High completion rate indicates strong delivery performance".to_string());
        } else if rate < 50.0 {
            key_insights.push("Low completion rate may indicate process bottlenecks".to_string());
        }
        let overdue = tasks.iter().filter(|t| t.is_overdue).count();
        if overdue > 0 {
            key_insights.push(format!(
                "{overdue} of {} tasks created in this period are overdue",
                tasks.len()
            ));
        }
    }

    TrendSummary {
        analysis_period: range,
        total_tasks: tasks.len(),
        completed_tasks: completed.len(),
        overall_velocity: completed.len() as f64,
        avg_cycle_time,
        productivity_trend: productivity_trend(tasks, range, now, rule),
        key_insights,
    }
}

/// Window the tasks, then compute each requested metric independently.
pub fn analyse(
    tasks: Vec<TaskDetail>,
    request: &TrendRequest,
    now: DateTime<Utc>,
    rule: &CompletionRule,
) -> TrendReport {
    let range = request.time_range;
    let tasks = within_window(tasks, range.start(now));
    debug!(range = range.as_str(), tasks = tasks.len(), "windowed tasks");

    let mut report = TrendReport {
        summary: summarize(&tasks, range, now, rule),
        completion_trends: None,
        cycle_time_metrics: None,
        velocity_metrics: None,
        task_aging: None,
        burndown_chart: None,
        project_health: None,
    };
    for kind in &request.analysis_types {
        match kind {
            AnalysisKind::CompletionTrends => {
                report.completion_trends = Some(completion_trends(&tasks, range, rule))
            }
            AnalysisKind::CycleTime => report.cycle_time_metrics = Some(cycle_time(&tasks, rule)),
            AnalysisKind::Velocity => report.velocity_metrics = Some(velocity(&tasks, range, rule)),
            AnalysisKind::TaskAging => report.task_aging = Some(task_aging(&tasks, now, rule)),
            AnalysisKind::Burndown => {
                report.burndown_chart = Some(burndown(&tasks, range, now, rule))
            }
            AnalysisKind::ProjectHealth => report.project_health = Some(project_health(&tasks, rule)),
        }
    }
    report
}

pub struct TrendAnalyzer {
    collector: Collector,
}

impl TrendAnalyzer {
    pub fn new(collector: Collector) -> Self {
        Self { collector }
    }

    pub async fn analyse(&self, request: &TrendRequest, now: DateTime<Utc>) -> Result<TrendReport> {
        let tasks = self
            .collector
            .gather(
                &request.project_ids,
                &TaskFilter::everything(),
                SortKey::Created,
                true,
                now,
            )
            .await?;
        let report = analyse(tasks, request, now, &self.collector.config().completion.trends);
        info!(
            range = request.time_range.as_str(),
            kinds = request.analysis_types.len(),
            tasks = report.summary.total_tasks,
            "trend analysis complete"
        );
        Ok(report)
    }
}
