//! Where task data comes from.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::error::UpstreamError;
use crate::models::{ColumnRaw, ProjectRaw, SwimlaneRaw, TaskRaw, UserListing, UserRaw};

#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Base URL used to build links back to each task.
    fn base_url(&self) -> &str;

    async fn fetch_accessible_projects(&self) -> Result<Vec<ProjectRaw>, UpstreamError>;

    async fn fetch_tasks(&self, project_id: i64) -> Result<Vec<TaskRaw>, UpstreamError>;

    async fn fetch_columns(&self, project_id: i64) -> Result<Vec<ColumnRaw>, UpstreamError>;

    async fn fetch_swimlanes(&self, project_id: i64) -> Result<Vec<SwimlaneRaw>, UpstreamError>;

    async fn fetch_project_users(&self, project_id: i64) -> Result<Vec<UserRaw>, UpstreamError>;

    async fn fetch_current_user(&self) -> Result<UserRaw, UpstreamError>;
}

/// A captured board state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_user: Option<UserRaw>,
    #[serde(default)]
    pub projects: Vec<ProjectSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project: ProjectRaw,
    #[serde(default)]
    pub columns: Vec<ColumnRaw>,
    #[serde(default)]
    pub swimlanes: Vec<SwimlaneRaw>,
    #[serde(default, deserialize_with = "any_user_shape")]
    pub users: Vec<UserRaw>,
    #[serde(default)]
    pub tasks: Vec<TaskRaw>,
}

fn any_user_shape<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<UserRaw>, D::Error> {
    Ok(UserListing::deserialize(deserializer)?.into_users())
}

#[derive(Debug, Clone)]
pub struct SnapshotSource {
    snapshot: Snapshot,
}

impl SnapshotSource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub async fn load(path: &Path) -> Result<Self, UpstreamError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        info!(
            path = %path.display(),
            projects = snapshot.projects.len(),
            "loaded board snapshot"
        );
        Ok(Self::new(snapshot))
    }

    fn project(&self, project_id: i64) -> Result<&ProjectSnapshot, UpstreamError> {
        self.snapshot
            .projects
            .iter()
            .find(|p| p.project.id == project_id)
            .ok_or_else(|| {
                UpstreamError::Snapshot(format!("project {project_id} is not in the snapshot"))
            })
    }
}

#[async_trait]
impl TaskSource for SnapshotSource {
    fn base_url(&self) -> &str {
        &self.snapshot.base_url
    }

    async fn fetch_accessible_projects(&self) -> Result<Vec<ProjectRaw>, UpstreamError> {
        Ok(self
            .snapshot
            .projects
            .iter()
            .map(|p| p.project.clone())
            .collect())
    }

    async fn fetch_tasks(&self, project_id: i64) -> Result<Vec<TaskRaw>, UpstreamError> {
        Ok(self.project(project_id)?.tasks.clone())
    }

    async fn fetch_columns(&self, project_id: i64) -> Result<Vec<ColumnRaw>, UpstreamError> {
        Ok(self.project(project_id)?.columns.clone())
    }

    async fn fetch_swimlanes(&self, project_id: i64) -> Result<Vec<SwimlaneRaw>, UpstreamError> {
        Ok(self.project(project_id)?.swimlanes.clone())
    }

    async fn fetch_project_users(&self, project_id: i64) -> Result<Vec<UserRaw>, UpstreamError> {
        Ok(self.project(project_id)?.users.clone())
    }

    async fn fetch_current_user(&self) -> Result<UserRaw, UpstreamError> {
        self.snapshot
            .current_user
            .clone()
            .ok_or_else(|| UpstreamError::Snapshot("snapshot has no current user".to_string()))
    }
}

/// Copy everything the analytics need for `project_ids` (empty = all
/// accessible projects) out of `source`.
pub async fn capture(
    source: &dyn TaskSource,
    project_ids: &[String],
    now: DateTime<Utc>,
) -> Result<Snapshot, UpstreamError> {
    let current_user = source.fetch_current_user().await.ok();
    let mut projects = Vec::new();

    for project in source.fetch_accessible_projects().await? {
        if !project.is_selected(project_ids) {
            continue;
        }
        debug!(project_id = project.id, "capturing project");
        let (tasks, columns, swimlanes, users) = tokio::try_join!(
            source.fetch_tasks(project.id),
            source.fetch_columns(project.id),
            source.fetch_swimlanes(project.id),
            source.fetch_project_users(project.id),
        )?;
        projects.push(ProjectSnapshot {
            project,
            columns,
            swimlanes,
            users,
            tasks,
        });
    }

    Ok(Snapshot {
        base_url: source.base_url().to_string(),
        captured_at: Some(now),
        current_user,
        projects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot_json() -> &'static str {
        r#"{
            "base_url": "https://board.example.com",
            "current_user": {"id": "4", "username": "ana", "name": "Ana"},
            "projects": [{
                "project": {"id": "1", "name": "Website"},
                "columns": [{"id": 10, "title": "Backlog"}],
                "users": {"4": "ana"},
                "tasks": [{"id": 100, "title": "Fix nav", "column_id": 10}]
            }]
        }"#
    }

    #[tokio::test]
    async fn snapshot_serves_captured_projects() {
        let snapshot: Snapshot = serde_json::from_str(snapshot_json()).unwrap();
        let source = SnapshotSource::new(snapshot);

        let projects = source.fetch_accessible_projects().await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "Website");

        let users = source.fetch_project_users(1).await.unwrap();
        assert_eq!(users[0].id, 4);
        assert_eq!(users[0].username, "ana");

        assert_eq!(source.fetch_tasks(1).await.unwrap()[0].title, "Fix nav");
        assert_eq!(source.fetch_current_user().await.unwrap().id, 4);
        assert!(matches!(
            source.fetch_columns(2).await,
            Err(UpstreamError::Snapshot(_))
        ));
    }

    #[tokio::test]
    async fn capture_filters_projects_and_round_trips() {
        let snapshot: Snapshot = serde_json::from_str(snapshot_json()).unwrap();
        let source = SnapshotSource::new(snapshot);
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();

        let none = capture(&source, &["99".to_string()], now).await.unwrap();
        assert!(none.projects.is_empty());

        let all = capture(&source, &[], now).await.unwrap();
        assert_eq!(all.projects.len(), 1);
        assert_eq!(all.captured_at, Some(now));

        let text = serde_json::to_string(&all).unwrap();
        let reread: Snapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(reread.projects[0].users, all.projects[0].users);
        assert_eq!(reread.base_url, "https://board.example.com");
    }
}
