use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{AnalyticsConfig, CompletionRule, ListingLimits};
use crate::error::{AnalyticsError, Result, UpstreamError};
use crate::models::{
    due_info, matches_id, Assignee, ColumnRaw, ProjectRaw, ProjectRef, SwimlaneRaw, TaskDates,
    TaskDetail, TaskRaw, TaskStatus, TaskSummary, TaskView, TimeTracking, UserRaw,
};
use crate::source::TaskSource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    Active,
    Completed,
    All,
}

impl From<String> for StatusFilter {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "active" => StatusFilter::Active,
            "completed" => StatusFilter::Completed,
            _ => StatusFilter::All,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    DueDate,
    Priority,
    Created,
}

impl From<String> for SortKey {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "priority" => SortKey::Priority,
            "created" => SortKey::Created,
            _ => SortKey::DueDate,
        }
    }
}

/// Inclusive range of due dates; an open end is unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, due: Option<DateTime<Utc>>) -> bool {
        let Some(due) = due else {
            return false;
        };
        let day = due.date_naive();
        self.start.map_or(true, |start| day >= start) && self.end.map_or(true, |end| day <= end)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub status: StatusFilter,
    pub assignee_ids: Vec<String>,
    pub include_overdue: bool,
    pub due_date_range: Option<DateRange>,
}

impl TaskFilter {
    /// Everything, overdue included.
    pub fn everything() -> Self {
        Self {
            status: StatusFilter::All,
            include_overdue: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskListingRequest {
    #[serde(deserialize_with = "id_list")]
    pub project_ids: Vec<String>,
    #[serde(deserialize_with = "id_list")]
    pub assignee_ids: Vec<String>,
    pub status_filter: StatusFilter,
    pub due_date_range: Option<DateRange>,
    pub include_overdue: bool,
    pub include_time_tracking: bool,
    pub sort_by: SortKey,
    pub limit: usize,
    pub summary_mode: bool,
}

impl Default for TaskListingRequest {
    fn default() -> Self {
        Self {
            project_ids: Vec::new(),
            assignee_ids: Vec::new(),
            status_filter: StatusFilter::Active,
            due_date_range: None,
            include_overdue: false,
            include_time_tracking: true,
            sort_by: SortKey::DueDate,
            limit: ListingLimits::default().default_limit,
            summary_mode: true,
        }
    }
}

impl TaskListingRequest {
    pub fn filter(&self) -> TaskFilter {
        TaskFilter {
            status: self.status_filter,
            assignee_ids: self.assignee_ids.clone(),
            include_overdue: self.include_overdue,
            due_date_range: self.due_date_range.clone(),
        }
    }
}

/// Ids may be sent as numbers or strings; both end up as strings.
pub fn id_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub total_tasks: usize,
    pub overdue_tasks: usize,
    pub due_this_week: usize,
    pub unassigned_tasks: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskListing {
    pub summary: ListingSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TaskDetail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_summaries: Option<Vec<TaskSummary>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated_at: Option<usize>,
    /// Size of the detail payload, not counting this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_size_bytes: Option<usize>,
}

#[derive(Clone)]
pub struct Collector {
    source: Arc<dyn TaskSource>,
    config: Arc<AnalyticsConfig>,
}

impl Collector {
    pub fn new(source: Arc<dyn TaskSource>, config: Arc<AnalyticsConfig>) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn source(&self) -> &dyn TaskSource {
        self.source.as_ref()
    }

    /// Accessible projects, narrowed to `project_ids` when it is non-empty.
    pub async fn select_projects(&self, project_ids: &[String]) -> Result<Vec<ProjectRaw>> {
        let projects = self.source.fetch_accessible_projects().await?;
        Ok(projects
            .into_iter()
            .filter(|p| p.is_selected(project_ids))
            .collect())
    }

    /// Fetch and normalize every task of the selected projects.
    ///
    /// Each project is fetched by its own spawned task. Results are merged in
    /// project order whatever order they finish in; if any project fails, the
    /// first failure (in project order) is returned and nothing else is.
    pub async fn collect(
        &self,
        project_ids: &[String],
        include_time_tracking: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskDetail>> {
        let projects = self.select_projects(project_ids).await?;
        let project_count = projects.len();

        let mut set = JoinSet::new();
        for (index, project) in projects.into_iter().enumerate() {
            let source = Arc::clone(&self.source);
            set.spawn(async move {
                let result =
                    fetch_project_tasks(source.as_ref(), &project, include_time_tracking, now)
                        .await;
                (index, project.id, result)
            });
        }

        let mut outcomes = Vec::with_capacity(project_count);
        let mut join_failure = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(error = %e, "project fetch task did not complete");
                    join_failure.get_or_insert(AnalyticsError::Join(e.to_string()));
                }
            }
        }
        if let Some(failure) = join_failure {
            return Err(failure);
        }

        outcomes.sort_by_key(|(index, _, _)| *index);
        let mut tasks = Vec::new();
        for (_, project_id, result) in outcomes {
            match result {
                Ok(project_tasks) => tasks.extend(project_tasks),
                Err(source) => {
                    warn!(project_id, error = %source, "project fetch failed");
                    return Err(AnalyticsError::Upstream { project_id, source });
                }
            }
        }

        info!(projects = project_count, tasks = tasks.len(), "collected tasks");
        Ok(tasks)
    }

    /// Filtered and sorted tasks with no limit applied.
    pub async fn gather(
        &self,
        project_ids: &[String],
        filter: &TaskFilter,
        sort: SortKey,
        include_time_tracking: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskDetail>> {
        let tasks = self.collect(project_ids, include_time_tracking, now).await?;
        let mut tasks = filter_tasks(tasks, filter, &self.config.completion.listing);
        sort_tasks(&mut tasks, sort);
        Ok(tasks)
    }

    pub async fn list_tasks(
        &self,
        request: &TaskListingRequest,
        now: DateTime<Utc>,
    ) -> Result<TaskListing> {
        let limit = self
            .config
            .listing
            .effective_limit(request.limit, request.summary_mode);
        let tasks = self
            .gather(
                &request.project_ids,
                &request.filter(),
                request.sort_by,
                request.include_time_tracking,
                now,
            )
            .await?;

        let listing = build_listing(
            tasks,
            request.summary_mode,
            limit,
            &self.config.listing,
            now,
        )?;
        debug!(
            summary_mode = request.summary_mode,
            limit,
            truncated = listing.truncated,
            "built task listing"
        );
        Ok(listing)
    }
}

async fn fetch_project_tasks(
    source: &dyn TaskSource,
    project: &ProjectRaw,
    include_time_tracking: bool,
    now: DateTime<Utc>,
) -> std::result::Result<Vec<TaskDetail>, UpstreamError> {
    let (tasks, columns, swimlanes, users) = tokio::try_join!(
        source.fetch_tasks(project.id),
        source.fetch_columns(project.id),
        source.fetch_swimlanes(project.id),
        source.fetch_project_users(project.id),
    )?;
    debug!(
        project_id = project.id,
        tasks = tasks.len(),
        columns = columns.len(),
        users = users.len(),
        "fetched project"
    );

    let lookups = BoardLookups::new(&columns, &swimlanes, &users);
    Ok(tasks
        .iter()
        .map(|task| {
            build_task_detail(
                task,
                project,
                &lookups,
                source.base_url(),
                include_time_tracking,
                now,
            )
        })
        .collect())
}

/// Id → name tables for one project's board.
#[derive(Debug, Default)]
pub struct BoardLookups {
    columns: HashMap<i64, String>,
    swimlanes: HashMap<i64, String>,
    users: HashMap<i64, Assignee>,
}

impl BoardLookups {
    pub fn new(columns: &[ColumnRaw], swimlanes: &[SwimlaneRaw], users: &[UserRaw]) -> Self {
        Self {
            columns: columns.iter().map(|c| (c.id, c.title.clone())).collect(),
            swimlanes: swimlanes.iter().map(|s| (s.id, s.name.clone())).collect(),
            users: users
                .iter()
                .map(|u| {
                    (
                        u.id,
                        Assignee {
                            id: u.id.to_string(),
                            username: u.username.clone(),
                            name: u.name.clone(),
                        },
                    )
                })
                .collect(),
        }
    }
}

pub fn build_task_detail(
    task: &TaskRaw,
    project: &ProjectRaw,
    lookups: &BoardLookups,
    base_url: &str,
    include_time_tracking: bool,
    now: DateTime<Utc>,
) -> TaskDetail {
    let (is_overdue, days_until_due) = due_info(task.date_due, now);
    let assignee = if task.owner_id > 0 {
        lookups.users.get(&task.owner_id).cloned()
    } else {
        None
    };

    TaskDetail {
        id: task.id.to_string(),
        title: task.title.clone(),
        description: task.description.clone(),
        project: ProjectRef {
            id: project.id.to_string(),
            name: project.name.clone(),
        },
        assignee,
        status: TaskStatus {
            column: lookups
                .columns
                .get(&task.column_id)
                .cloned()
                .unwrap_or_default(),
            swimlane: lookups
                .swimlanes
                .get(&task.swimlane_id)
                .cloned()
                .unwrap_or_default(),
        },
        dates: TaskDates {
            created: task.date_creation,
            due: task.date_due,
            modified: task.date_modification,
            started: task.date_started,
        },
        time_tracking: include_time_tracking
            .then(|| TimeTracking::new(task.time_estimated, task.time_spent)),
        priority: crate::models::Priority::from_level(task.priority),
        // Category names are not fetched; the board's category id stands in.
        category: (task.category_id > 0).then(|| task.category_id.to_string()),
        tags: task.tags.clone(),
        url: format!(
            "{}/?controller=TaskViewController&action=show&task_id={}&project_id={}",
            base_url.trim_end_matches('/'),
            task.id,
            project.id
        ),
        is_overdue,
        days_until_due,
    }
}

/// Checks run in a fixed order: status, assignee, overdue, due-date range.
pub fn matches_filter<T: TaskView>(task: &T, filter: &TaskFilter, rule: &CompletionRule) -> bool {
    match filter.status {
        StatusFilter::Active if rule.is_completed(task.column()) => return false,
        StatusFilter::Completed if !rule.is_completed(task.column()) => return false,
        _ => {}
    }

    if !filter.assignee_ids.is_empty() {
        let Some(assignee) = task.assignee() else {
            return false;
        };
        if !filter
            .assignee_ids
            .iter()
            .any(|id| matches_id(&assignee.id, id))
        {
            return false;
        }
    }

    if !filter.include_overdue && task.is_overdue() {
        return false;
    }

    if let Some(range) = &filter.due_date_range {
        if !range.contains(task.due()) {
            return false;
        }
    }

    true
}

pub fn filter_tasks<T: TaskView>(tasks: Vec<T>, filter: &TaskFilter, rule: &CompletionRule) -> Vec<T> {
    tasks
        .into_iter()
        .filter(|task| matches_filter(task, filter, rule))
        .collect()
}

/// Stable sort. Tasks without the sort date always go last.
pub fn sort_tasks<T: TaskView>(tasks: &mut [T], key: SortKey) {
    match key {
        SortKey::DueDate => tasks.sort_by(|a, b| match (a.due(), b.due()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }),
        SortKey::Priority => tasks.sort_by(|a, b| b.priority().cmp(&a.priority())),
        SortKey::Created => tasks.sort_by(|a, b| match (a.created(), b.created()) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }),
    }
}

pub fn summarize<T: TaskView>(tasks: &[T], now: DateTime<Utc>) -> ListingSummary {
    let week_ahead = now + Duration::days(7);
    let mut summary = ListingSummary {
        total_tasks: tasks.len(),
        ..ListingSummary::default()
    };
    for task in tasks {
        if task.is_overdue() {
            summary.overdue_tasks += 1;
        }
        if task.assignee().is_none() {
            summary.unassigned_tasks += 1;
        }
        if let Some(due) = task.due() {
            if due > now && due < week_ahead {
                summary.due_this_week += 1;
            }
        }
    }
    summary
}

/// Turn a filtered, sorted task list into the listing payload.
///
/// Summary mode only applies `limit`. Detail mode also drops trailing tasks
/// until the serialized payload fits `limits.max_response_bytes`.
pub fn build_listing(
    mut tasks: Vec<TaskDetail>,
    summary_mode: bool,
    limit: usize,
    limits: &ListingLimits,
    now: DateTime<Utc>,
) -> Result<TaskListing> {
    let summary = summarize(&tasks, now);
    tasks.truncate(limit);

    if summary_mode {
        return Ok(TaskListing {
            summary,
            task_summaries: Some(tasks.iter().map(TaskSummary::from).collect()),
            ..TaskListing::default()
        });
    }

    fit_to_size(summary, tasks, limits.max_response_bytes)
}

fn fit_to_size(
    summary: ListingSummary,
    tasks: Vec<TaskDetail>,
    max_bytes: usize,
) -> Result<TaskListing> {
    let total = tasks.len();
    let mut listing = TaskListing {
        summary,
        tasks: Some(tasks),
        ..TaskListing::default()
    };

    loop {
        let kept = listing.tasks.as_ref().map_or(0, Vec::len);
        listing.truncated = kept < total;
        listing.truncated_at = listing.truncated.then_some(kept);
        listing.response_size_bytes = None;
        let payload = serde_json::to_vec(&listing)?.len();
        listing.response_size_bytes = Some(payload);
        let measured = serde_json::to_vec(&listing)?.len();

        if measured <= max_bytes || kept == 0 {
            if listing.truncated {
                info!(kept, total, bytes = measured, "trimmed listing to fit size ceiling");
            }
            return Ok(listing);
        }
        if let Some(tasks) = listing.tasks.as_mut() {
            tasks.pop();
        }
    }
}
