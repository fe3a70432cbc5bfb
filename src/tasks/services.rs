use std::cmp::Reverse;

use serde::Deserialize;
use time::{
    format_description::{well_known::Rfc3339, FormatItem},
    macros::format_description,
    Date, OffsetDateTime,
};

use crate::tasks::repo_types::{Task, TaskStats, TaskStatus, TaskView};

const ISO_MILLIS: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
const DATE_ONLY: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DISPLAY_DATE: &[FormatItem<'static>] =
    format_description!("[month repr:short] [day padding:none], [year]");

/// Current UTC time as `2024-06-01T09:30:00.000Z`.
pub fn now_iso() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(ISO_MILLIS).unwrap_or_else(|_| now.to_string())
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` taken as midnight UTC.
pub fn parse_due_date(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).ok().or_else(|| {
        Date::parse(raw, DATE_ONLY)
            .ok()
            .map(|d| d.midnight().assume_utc())
    })
}

/// Stable ascending sort by due date. Unparsable dates go after every
/// parsable one and keep their stored order.
pub fn sort_by_due_date(views: &mut [TaskView]) {
    views.sort_by_cached_key(|v| {
        let due = parse_due_date(&v.task.due_date);
        (due.is_none(), due)
    });
}

/// `"Jun 1, 2024"`; `"No date"` for empty input; `"Invalid date"` otherwise.
pub fn format_due_date(raw: &str) -> String {
    if raw.is_empty() {
        return "No date".into();
    }
    parse_due_date(raw)
        .and_then(|dt| dt.format(DISPLAY_DATE).ok())
        .unwrap_or_else(|| "Invalid date".into())
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    #[serde(rename = "dueDate")]
    DueDate,
    #[serde(rename = "priority")]
    Priority,
}

/// Task list view options: status tab, title search, ordering.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskQuery {
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub sort: SortKey,
}

impl TaskQuery {
    fn matches(&self, task: &Task) -> bool {
        let status_ok = match self.status {
            StatusFilter::All => true,
            StatusFilter::Pending => task.status != TaskStatus::Completed,
            StatusFilter::Completed => task.status == TaskStatus::Completed,
        };
        let search_ok = match self.q.as_deref() {
            None | Some("") => true,
            Some(q) => task.title.to_lowercase().contains(&q.to_lowercase()),
        };
        status_ok && search_ok
    }

    /// Filters a due-date-ordered list; priority sort keeps due-date order on ties.
    pub fn apply(&self, views: Vec<TaskView>) -> Vec<TaskView> {
        let mut out: Vec<TaskView> = views.into_iter().filter(|v| self.matches(&v.task)).collect();
        if self.sort == SortKey::Priority {
            out.sort_by_key(|v| Reverse(v.task.priority));
        }
        out
    }
}

pub fn stats(views: &[TaskView]) -> TaskStats {
    views.iter().fold(
        TaskStats {
            total: views.len(),
            ..TaskStats::default()
        },
        |mut acc, v| {
            match v.task.status {
                TaskStatus::Pending => acc.pending += 1,
                TaskStatus::Completed => acc.completed += 1,
            }
            acc
        },
    )
}
