//! Due-date reminders.
//!
//! A scan walks every task once and publishes one reminder per open task due
//! today or tomorrow. Nothing records that a reminder went out, so scanning
//! the same window again sends the same reminders again.

use chrono::{Days, NaiveDate};
use std::sync::Arc;

use crate::notify::Notifier;
use crate::task::Task;

/// Format of `Task::due_date`.
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Length of the reminder window after `today`, inclusive.
const WINDOW_DAYS: u64 = 1;

pub struct ReminderScanner {
    notifier: Arc<dyn Notifier>,
}

impl ReminderScanner {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Publishes a reminder for every open task due in `[today, today + 1]`
    /// and returns how many publishes succeeded.
    ///
    /// Tasks with an unparseable due date and failed publishes are logged and
    /// skipped; neither stops the scan.
    #[tracing::instrument(skip(self, tasks), fields(tasks = tasks.len()))]
    pub async fn scan(&self, tasks: &[Task], today: NaiveDate) -> usize {
        let mut reminders_sent = 0;

        for task in tasks {
            let Some(due_date) = reminder_due_date(task) else {
                continue;
            };
            if !is_within_window(due_date, today) {
                continue;
            }

            let (subject, body) = reminder_message(task);
            match self.notifier.publish(&subject, &body).await {
                Ok(()) => reminders_sent += 1,
                Err(err) => {
                    tracing::error!(task_id = %task.id, "Error sending reminder: {}", err);
                }
            }
        }

        tracing::info!("Reminders sent for {} tasks", reminders_sent);
        reminders_sent
    }
}

/// Due date of an open task, or `None` when the task is completed, has no
/// due date, or its due date does not parse.
fn reminder_due_date(task: &Task) -> Option<NaiveDate> {
    if task.completed {
        return None;
    }
    let raw = task.due_date.as_deref()?;
    match NaiveDate::parse_from_str(raw, DUE_DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(err) => {
            tracing::warn!(task_id = %task.id, due_date = raw, "Error parsing due date: {}", err);
            None
        }
    }
}

fn is_within_window(due_date: NaiveDate, today: NaiveDate) -> bool {
    match today.checked_add_days(Days::new(WINDOW_DAYS)) {
        Some(threshold) => today <= due_date && due_date <= threshold,
        None => today <= due_date,
    }
}

fn reminder_message(task: &Task) -> (String, String) {
    let subject = format!("Task Reminder Notification : '{}'", task.description);
    let body = format!(
        "Reminder: Your task '{}' is due on {}.",
        task.description,
        task.due_date.as_deref().unwrap_or_default()
    );
    (subject, body)
}
