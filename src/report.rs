use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::collector::TaskListing;
use crate::models::{TaskSummary, TIMESTAMP_FORMAT};
use crate::priorities::PriorityReport;
use crate::trends::TrendReport;

/// One flattened listing row for spreadsheet export.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: &'a str,
    title: &'a str,
    project: &'a str,
    assignee: &'a str,
    column: &'a str,
    due_date: String,
    is_overdue: bool,
    days_until_due: Option<i64>,
}

impl<'a> From<&'a TaskSummary> for CsvRow<'a> {
    fn from(task: &'a TaskSummary) -> Self {
        Self {
            id: &task.id,
            title: &task.title,
            project: &task.project.name,
            assignee: task.assignee.as_ref().map_or("", |a| a.username.as_str()),
            column: &task.status,
            due_date: task
                .due_date
                .map(|d| d.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_default(),
            is_overdue: task.is_overdue,
            days_until_due: task.days_until_due,
        }
    }
}

/// Write the listing's emitted tasks as CSV and return how many rows were written.
pub fn write_task_csv<W: std::io::Write>(writer: W, listing: &TaskListing) -> csv::Result<usize> {
    let rows: Vec<TaskSummary> = match (&listing.task_summaries, &listing.tasks) {
        (Some(summaries), _) => summaries.clone(),
        (None, Some(tasks)) => tasks.iter().map(TaskSummary::from).collect(),
        (None, None) => Vec::new(),
    };

    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows.iter() {
        csv_writer.serialize(CsvRow::from(row))?;
    }
    csv_writer.flush()?;
    Ok(rows.len())
}

pub fn build_report(
    scope: Option<&str>,
    generated_at: DateTime<Utc>,
    priorities: &PriorityReport,
    trends: &TrendReport,
) -> String {
    let analysis = &priorities.analysis;
    let summary = &trends.summary;
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all accessible projects");

    let _ = writeln!(output, "# Kanboard Insights Report");
    let _ = writeln!(
        output,
        "Generated for {} at {}",
        scope_label,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    if let Some(me) = &analysis.requesting_user {
        let _ = writeln!(
            output,
            "Your workload: {} tasks, {:.1}h estimated ({}, {})",
            me.assigned_tasks,
            me.total_estimated_hours,
            me.utilization_label(),
            me.status
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Urgent Items");

    if analysis.urgent_items.is_empty() {
        let _ = writeln!(output, "Nothing needs immediate attention.");
    } else {
        for item in analysis.urgent_items.iter() {
            let _ = writeln!(
                output,
                "- [{}] {} ({}) score {}: {}",
                item.task_id, item.title, item.project, item.urgency_score, item.reason
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Team Workload");

    if analysis.team_workloads.is_empty() {
        let _ = writeln!(output, "No assigned tasks.");
    } else {
        for workload in analysis.team_workloads.iter() {
            let _ = writeln!(
                output,
                "- {} (@{}): {} tasks, {} overdue, {:.1}h estimated, {} ({})",
                workload.name,
                workload.username,
                workload.assigned_tasks,
                workload.overdue_tasks,
                workload.total_estimated_hours,
                workload.utilization_label(),
                workload.status
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Bottlenecks");

    if analysis.bottlenecks.is_empty() {
        let _ = writeln!(output, "No stalled columns.");
    } else {
        for bottleneck in analysis.bottlenecks.iter() {
            let _ = writeln!(
                output,
                "- {} / {}: {} tasks waiting {:.1} days on average",
                bottleneck.project,
                bottleneck.column,
                bottleneck.stuck_tasks,
                bottleneck.avg_wait_time_days
            );
        }
    }

    if !priorities.recommendations.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Recommendations");
        for recommendation in priorities.recommendations.iter() {
            let _ = writeln!(
                output,
                "- {} (confidence {:.0}%)",
                recommendation.message,
                recommendation.confidence * 100.0
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trends ({})", summary.analysis_period.as_str());
    let _ = writeln!(
        output,
        "{} tasks created, {} completed, average cycle time {:.1} days, productivity {:?}",
        summary.total_tasks, summary.completed_tasks, summary.avg_cycle_time, summary.productivity_trend
    );
    for insight in summary.key_insights.iter() {
        let _ = writeln!(output, "- {insight}");
    }

    if let Some(trends) = trends.completion_trends.as_ref().filter(|t| !t.is_empty()) {
        let _ = writeln!(output);
        let _ = writeln!(output, "### Completion");
        for trend in trends.iter() {
            let _ = writeln!(
                output,
                "- {}: {}/{} completed ({:.1}%)",
                trend.period, trend.tasks_completed, trend.tasks_created, trend.completion_rate
            );
        }
    }

    if let Some(bands) = trends.task_aging.as_ref().filter(|b| !b.is_empty()) {
        let _ = writeln!(output);
        let _ = writeln!(output, "### Open Task Age");
        for band in bands.iter() {
            let _ = write!(
                output,
                "- {}: {} tasks ({:.0}%), avg {:.1} days",
                band.age_group, band.task_count, band.percentage, band.avg_age_days
            );
            if let Some(oldest) = &band.oldest_task {
                let _ = write!(output, ", oldest '{oldest}'");
            }
            let _ = writeln!(output);
        }
    }

    if let Some(health) = trends.project_health.as_ref().filter(|h| !h.is_empty()) {
        let _ = writeln!(output);
        let _ = writeln!(output, "### Project Health");
        for project in health.iter() {
            let _ = writeln!(
                output,
                "- {}: health {:.1} ({:?}), risk {:?}",
                project.project_name,
                project.health_score,
                project.quality_indicator,
                project.risk_level
            );
        }
    }

    output
}
