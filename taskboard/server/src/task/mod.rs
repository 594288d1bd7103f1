use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::entities::task;

pub mod api;
pub mod store;
pub mod update;

pub use store::{InMemoryTaskStore, SeaOrmTaskStore, StoreError, TaskStore};
pub use update::{Assignment, UpdatableField, UpdatePlan};

/// A stored task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Server-generated identifier, immutable once assigned
    pub id: String,
    pub description: String,
    /// Due date as `YYYY-MM-DD`; `null` means no deadline
    pub due_date: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub priority: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub category: Option<Value>,
    pub completed: bool,
}

impl Task {
    /// Creates a task from a client payload, assigning a fresh id and the
    /// creation defaults.
    pub fn create(new_task: NewTask) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: new_task.description.unwrap_or_default(),
            due_date: new_task.due_date,
            priority: new_task.priority,
            category: new_task.category,
            completed: false,
        }
    }
}

impl From<task::Model> for Task {
    fn from(model: task::Model) -> Self {
        Self {
            id: model.id,
            description: model.description,
            due_date: model.due_date,
            priority: model.priority,
            category: model.category,
            completed: model.completed,
        }
    }
}

/// Client payload for `POST /tasks`. Unknown fields, including `id` and
/// `completed`, are ignored.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub priority: Option<Value>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub category: Option<Value>,
}

/// Client payload for `PUT /tasks/{id}`.
///
/// Each field is `None` when the key is absent from the body and `Some` when
/// it is present, whatever its value. For nullable fields an explicit `null`
/// arrives as `Some(None)`. `description` and `completed` are not nullable, so
/// a `null` for either fails deserialization instead of reading as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default, deserialize_with = "present_non_null")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "present_non_null")]
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<Object>)]
    pub priority: Option<Option<Value>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<Object>)]
    pub category: Option<Option<Value>>,
}

/// Marks a key as present, keeping an explicit `null` distinguishable from absence.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Marks a key as present and requires a non-null value for it.
fn present_non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
