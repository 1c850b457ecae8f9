use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::config::WeeekConfig;

/// Task body for the Weeek task-creation endpoint
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    pub title: String,
    pub description: String,
    /// Due date, `DD.MM.YYYY`
    pub day: String,
    pub parent_id: Option<i64>,
    pub user_id: String,
    pub locations: Vec<TaskLocation>,
    #[serde(rename = "type")]
    pub task_type: String,
    pub priority: u8,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskLocation {
    pub project_id: i64,
    pub board_column_id: i64,
}

/// Everything besides the message text that goes into a payload
#[derive(Debug, Clone)]
pub struct PayloadSettings {
    pub timezone: Tz,
    pub title_max_len: usize,
    pub user_id: String,
    pub project_id: i64,
    pub board_column_id: i64,
}

impl PayloadSettings {
    pub fn new(weeek: &WeeekConfig, timezone: Tz, title_max_len: usize) -> Self {
        Self {
            timezone,
            title_max_len,
            user_id: weeek.user_id.clone(),
            project_id: weeek.project_id,
            board_column_id: weeek.board_column_id,
        }
    }
}

/// Build the task body. `now` is the current instant; the due date is the
/// next calendar day in `settings.timezone`.
pub fn build_payload(
    title_source: &str,
    description: &str,
    settings: &PayloadSettings,
    now: DateTime<Utc>,
) -> TaskPayload {
    TaskPayload {
        title: truncate_title(title_source, settings.title_max_len),
        description: description.trim().to_string(),
        day: due_date(settings.timezone, now),
        parent_id: None,
        user_id: settings.user_id.clone(),
        locations: vec![TaskLocation {
            project_id: settings.project_id,
            board_column_id: settings.board_column_id,
        }],
        task_type: "action".to_string(),
        priority: 0,
    }
}

/// Single-line title of at most `limit` characters, ending in `…` when cut.
pub fn truncate_title(source: &str, limit: usize) -> String {
    let title = source.trim().replace("\r\n", " ").replace('\n', " ");
    if title.chars().count() <= limit {
        return title;
    }

    let mut cut: String = title.chars().take(limit.saturating_sub(1)).collect();
    cut.truncate(cut.trim_end().len());
    cut.push('…');
    cut
}

/// Tomorrow's date in `tz`, formatted `DD.MM.YYYY`.
pub fn due_date(tz: Tz, now: DateTime<Utc>) -> String {
    let today = now.with_timezone(&tz).date_naive();
    today
        .succ_opt()
        .unwrap_or(today)
        .format("%d.%m.%Y")
        .to_string()
}
