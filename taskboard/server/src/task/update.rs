//! Partial updates of stored tasks.
//!
//! A [`TaskUpdate`] is turned into an [`UpdatePlan`]: one assignment per
//! updatable field present in the request, in whitelist order. Presence is
//! what counts, so `{"completed": false}` still yields an assignment.

use serde_json::Value;
use std::fmt;

use super::{Task, TaskUpdate};

/// Fields a client may change, in the order assignments are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatableField {
    Description,
    Completed,
    DueDate,
    Priority,
    Category,
}

impl UpdatableField {
    /// The update whitelist.
    pub const ALL: [UpdatableField; 5] = [
        UpdatableField::Description,
        UpdatableField::Completed,
        UpdatableField::DueDate,
        UpdatableField::Priority,
        UpdatableField::Category,
    ];

    /// Field name as it appears in request and response bodies.
    pub fn name(self) -> &'static str {
        match self {
            UpdatableField::Description => "description",
            UpdatableField::Completed => "completed",
            UpdatableField::DueDate => "dueDate",
            UpdatableField::Priority => "priority",
            UpdatableField::Category => "category",
        }
    }
}

impl fmt::Display for UpdatableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single `field = value` assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Description(String),
    Completed(bool),
    DueDate(Option<String>),
    Priority(Option<Value>),
    Category(Option<Value>),
}

impl Assignment {
    pub fn field(&self) -> UpdatableField {
        match self {
            Assignment::Description(_) => UpdatableField::Description,
            Assignment::Completed(_) => UpdatableField::Completed,
            Assignment::DueDate(_) => UpdatableField::DueDate,
            Assignment::Priority(_) => UpdatableField::Priority,
            Assignment::Category(_) => UpdatableField::Category,
        }
    }

    fn apply(&self, task: &mut Task) {
        match self {
            Assignment::Description(description) => task.description = description.clone(),
            Assignment::Completed(completed) => task.completed = *completed,
            Assignment::DueDate(due_date) => task.due_date = due_date.clone(),
            Assignment::Priority(priority) => task.priority = priority.clone(),
            Assignment::Category(category) => task.category = category.clone(),
        }
    }
}

/// A non-empty list of assignments to apply to one stored task.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    assignments: Vec<Assignment>,
}

impl UpdatePlan {
    /// Builds the plan for an update request, or `None` when the request
    /// names no updatable field.
    pub fn build(update: &TaskUpdate) -> Option<Self> {
        let assignments: Vec<Assignment> = UpdatableField::ALL
            .into_iter()
            .filter_map(|field| assignment_for(update, field))
            .collect();

        if assignments.is_empty() {
            None
        } else {
            Some(Self { assignments })
        }
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Applies every assignment to `task`, leaving other fields untouched.
    pub fn apply_to(&self, task: &mut Task) {
        for assignment in &self.assignments {
            assignment.apply(task);
        }
    }
}

fn assignment_for(update: &TaskUpdate, field: UpdatableField) -> Option<Assignment> {
    match field {
        UpdatableField::Description => update.description.clone().map(Assignment::Description),
        UpdatableField::Completed => update.completed.map(Assignment::Completed),
        UpdatableField::DueDate => update.due_date.clone().map(Assignment::DueDate),
        UpdatableField::Priority => update.priority.clone().map(Assignment::Priority),
        UpdatableField::Category => update.category.clone().map(Assignment::Category),
    }
}
