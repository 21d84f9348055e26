use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectRaw {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
}

impl ProjectRaw {
    /// True when `project_ids` is empty or names this project.
    pub fn is_selected(&self, project_ids: &[String]) -> bool {
        let id = self.id.to_string();
        project_ids.is_empty() || project_ids.iter().any(|wanted| matches_id(&id, wanted))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnRaw {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwimlaneRaw {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRaw {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub username: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRaw {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub project_id: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub column_id: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub swimlane_id: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub owner_id: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub category_id: i64,
    /// Absent when the board leaves the task at its unset priority.
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub priority: Option<i64>,
    #[serde(default, deserialize_with = "lenient_time")]
    pub date_creation: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_time")]
    pub date_due: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_time")]
    pub date_modification: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_time")]
    pub date_started: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub time_estimated: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub time_spent: f64,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,
}

/// `getProjectUsers` answers with a list of user objects on some installs and an
/// `{"<id>": "<username>"}` map on others. The first shape that parses wins.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserListing {
    Records(Vec<UserRaw>),
    Names(BTreeMap<String, String>),
    Loose(BTreeMap<String, Value>),
}

impl UserListing {
    pub fn into_users(self) -> Vec<UserRaw> {
        match self {
            UserListing::Records(users) => users,
            UserListing::Names(names) => names
                .into_iter()
                .map(|(id, username)| user_from_entry(&id, username))
                .collect(),
            UserListing::Loose(entries) => entries
                .into_iter()
                .map(|(id, value)| {
                    let username = match value {
                        Value::String(s) => s,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    user_from_entry(&id, username)
                })
                .collect(),
        }
    }
}

fn user_from_entry(id: &str, username: String) -> UserRaw {
    UserRaw {
        id: id.trim().parse().unwrap_or(0),
        name: username.clone(),
        username,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// Board priorities are small integers, 0 (lowest) to 3. An unset
    /// priority is normal.
    pub fn from_level(level: Option<i64>) -> Self {
        match level {
            Some(0) => Priority::Low,
            Some(2) => Priority::High,
            Some(3) => Priority::Urgent,
            _ => Priority::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    pub id: String,
    pub username: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub column: String,
    pub swimlane: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDates {
    #[serde(default, with = "timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub due: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub started: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeTracking {
    pub estimated_hours: f64,
    pub spent_hours: f64,
    /// Goes negative once more time is spent than estimated.
    pub remaining_hours: f64,
}

impl TimeTracking {
    pub fn new(estimated_hours: f64, spent_hours: f64) -> Self {
        Self {
            estimated_hours,
            spent_hours,
            remaining_hours: estimated_hours - spent_hours,
        }
    }
}

/// A fully resolved task, rebuilt from upstream data on every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDetail {
    pub id: String,
    pub title: String,
    pub description: String,
    pub project: ProjectRef,
    pub assignee: Option<Assignee>,
    pub status: TaskStatus,
    pub dates: TaskDates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_tracking: Option<TimeTracking>,
    pub priority: Priority,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub url: String,
    pub is_overdue: bool,
    pub days_until_due: Option<i64>,
}

impl TaskDetail {
    pub fn estimated_hours(&self) -> f64 {
        self.time_tracking
            .as_ref()
            .map(|t| t.estimated_hours)
            .unwrap_or(0.0)
    }

    pub fn spent_hours(&self) -> f64 {
        self.time_tracking
            .as_ref()
            .map(|t| t.spent_hours)
            .unwrap_or(0.0)
    }
}

/// The reduced record emitted by summary-mode listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub project: ProjectRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Assignee>,
    pub status: String,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_until_due: Option<i64>,
}

impl From<&TaskDetail> for TaskSummary {
    fn from(task: &TaskDetail) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            project: task.project.clone(),
            assignee: task.assignee.clone(),
            status: task.status.column.clone(),
            due_date: task.dates.due,
            is_overdue: task.is_overdue,
            days_until_due: task.days_until_due,
        }
    }
}

/// The fields the listing filters and sorts look at, shared by full and
/// summary records so a listing can be re-run over its own output.
pub trait TaskView {
    fn column(&self) -> &str;
    fn assignee(&self) -> Option<&Assignee>;
    fn is_overdue(&self) -> bool;
    fn due(&self) -> Option<DateTime<Utc>>;
    fn created(&self) -> Option<DateTime<Utc>>;
    fn priority(&self) -> Priority;
}

impl TaskView for TaskDetail {
    fn column(&self) -> &str {
        &self.status.column
    }
    fn assignee(&self) -> Option<&Assignee> {
        self.assignee.as_ref()
    }
    fn is_overdue(&self) -> bool {
        self.is_overdue
    }
    fn due(&self) -> Option<DateTime<Utc>> {
        self.dates.due
    }
    fn created(&self) -> Option<DateTime<Utc>> {
        self.dates.created
    }
    fn priority(&self) -> Priority {
        self.priority
    }
}

// Summaries drop priority and creation date; they read as "normal" and "unknown".
impl TaskView for TaskSummary {
    fn column(&self) -> &str {
        &self.status
    }
    fn assignee(&self) -> Option<&Assignee> {
        self.assignee.as_ref()
    }
    fn is_overdue(&self) -> bool {
        self.is_overdue
    }
    fn due(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }
    fn created(&self) -> Option<DateTime<Utc>> {
        None
    }
    fn priority(&self) -> Priority {
        Priority::Normal
    }
}

/// Overdue flag and whole days left until `due`, rounded toward negative
/// infinity so anything past due reports a negative count.
pub fn due_info(due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> (bool, Option<i64>) {
    match due {
        Some(due) => {
            let days = (due - now).num_seconds().div_euclid(SECONDS_PER_DAY);
            (due < now, Some(days))
        }
        None => (false, None),
    }
}

/// Fractional days between two instants.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / SECONDS_PER_DAY as f64
}

/// Board ids arrive as `7`, `"7"` or `"07"` depending on the endpoint.
pub fn matches_id(candidate: &str, target: &str) -> bool {
    if candidate == target {
        return true;
    }
    match (candidate.trim().parse::<i64>(), target.trim().parse::<i64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Parse a board timestamp. Unparseable or "unset" values (`""`, `"0"`, `0`)
/// come back as `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "0" {
        return None;
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return from_unix(secs);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&parsed));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_i64(&value).unwrap_or(0))
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_i64(&value))
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed.unwrap_or(0.0))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_time<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().and_then(from_unix),
        Value::String(s) => parse_timestamp(&s),
        _ => None,
    })
}

fn lenient_tags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let tags = match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Object(map) => map.get("name").and_then(Value::as_str).map(String::from),
                _ => None,
            })
            .collect(),
        // getTaskTags style: {"<tag id>": "<tag name>"}
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(_, v)| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    };
    Ok(tags)
}

/// `Option<DateTime<Utc>>` as `YYYY-MM-DDTHH:MM:SSZ`, reading back anything
/// [`parse_timestamp`] understands.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    use super::{parse_timestamp, TIMESTAMP_FORMAT};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => parse_timestamp(&s),
            Value::Number(n) => n.as_i64().and_then(|secs| parse_timestamp(&secs.to_string())),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn raw_task_accepts_mixed_encodings() {
        let task: TaskRaw = serde_json::from_value(serde_json::json!({
            "id": "42",
            "title": "Ship it",
            "project_id": 3,
            "column_id": "7",
            "owner_id": "0",
            "priority": "2",
            "date_creation": 1767225600,
            "date_due": "2026-03-12",
            "date_modification": "0",
            "date_started": "not a date",
            "time_estimated": "4.5",
            "time_spent": 1,
        }))
        .unwrap();

        assert_eq!(task.id, 42);
        assert_eq!(task.column_id, 7);
        assert_eq!(task.owner_id, 0);
        assert_eq!(Priority::from_level(task.priority), Priority::High);
        assert!(task.date_creation.is_some());
        assert_eq!(
            task.date_due,
            Some(Utc.with_ymd_and_hms(2026, 3, 12, 0, 0, 0).unwrap())
        );
        assert_eq!(task.date_modification, None);
        assert_eq!(task.date_started, None);
        assert_eq!(task.time_estimated, 4.5);
        assert_eq!(task.time_spent, 1.0);
    }

    #[test]
    fn missing_priority_reads_as_normal() {
        let task: TaskRaw = serde_json::from_value(serde_json::json!({"id": 5})).unwrap();
        assert_eq!(task.priority, None);
        assert_eq!(Priority::from_level(task.priority), Priority::Normal);

        let task: TaskRaw =
            serde_json::from_value(serde_json::json!({"id": 5, "priority": null})).unwrap();
        assert_eq!(Priority::from_level(task.priority), Priority::Normal);

        let task: TaskRaw =
            serde_json::from_value(serde_json::json!({"id": 5, "priority": "0"})).unwrap();
        assert_eq!(Priority::from_level(task.priority), Priority::Low);
        assert_eq!(Priority::from_level(Some(9)), Priority::Normal);
    }

    #[test]
    fn user_listing_falls_back_through_shapes() {
        let records: UserListing =
            serde_json::from_str(r#"[{"id": "7", "username": "ana", "name": "Ana"}]"#).unwrap();
        assert_eq!(records.into_users()[0].id, 7);

        let names: UserListing = serde_json::from_str(r#"{"7": "ana", "9": "bo"}"#).unwrap();
        let users = names.into_users();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "ana");
        assert_eq!(users[0].name, "ana");

        let loose: UserListing = serde_json::from_str(r#"{"x": 12, "3": null}"#).unwrap();
        let users = loose.into_users();
        assert_eq!(users[0].id, 3);
        assert_eq!(users[0].username, "");
        assert_eq!(users[1].id, 0);
        assert_eq!(users[1].username, "12");
    }

    #[test]
    fn overdue_implies_negative_days() {
        let cases = [
            Duration::hours(-1),
            Duration::hours(-30),
            Duration::days(-10),
            Duration::zero(),
            Duration::hours(1),
            Duration::hours(47),
        ];
        for offset in cases {
            let (overdue, days) = due_info(Some(now() + offset), now());
            let days = days.unwrap();
            if overdue {
                assert!(days < 0, "offset {offset:?} gave {days}");
            } else {
                assert!(days >= 0, "offset {offset:?} gave {days}");
            }
        }
        assert_eq!(due_info(Some(now() + Duration::hours(47)), now()), (false, Some(1)));
        assert_eq!(due_info(Some(now() - Duration::hours(1)), now()), (true, Some(-1)));
        assert_eq!(due_info(None, now()), (false, None));
    }

    #[test]
    fn user_ids_match_across_representations() {
        assert!(matches_id("7", "7"));
        assert!(matches_id("07", "7"));
        assert!(matches_id(" 7", "7"));
        assert!(matches_id("ana", "ana"));
        assert!(!matches_id("7", "8"));
        assert!(!matches_id("ana", "7"));
    }

    #[test]
    fn project_selection_tolerates_padded_ids() {
        let project = ProjectRaw {
            id: 3,
            name: "Website".to_string(),
        };
        assert!(project.is_selected(&[]));
        assert!(project.is_selected(&["03".to_string()]));
        assert!(project.is_selected(&["1".to_string(), " 3".to_string()]));
        assert!(!project.is_selected(&["4".to_string()]));
    }

    #[test]
    fn timestamps_serialize_in_board_format() {
        let dates = TaskDates {
            created: Some(now()),
            ..TaskDates::default()
        };
        let json = serde_json::to_value(&dates).unwrap();
        assert_eq!(json["created"], "2026-03-10T12:00:00Z");
        assert!(json["due"].is_null());

        let back: TaskDates = serde_json::from_value(json).unwrap();
        assert_eq!(back, dates);
    }
}
