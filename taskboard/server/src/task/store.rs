use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, EntityTrait};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::update::{Assignment, UpdatePlan};
use super::Task;
use crate::entities::task;

/// Error type for TaskStore operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    /// Represents a task not found error.
    #[error("Task with ID {0} not found")]
    TaskNotFound(String),
}

/// Keyed collection of task records.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Returns every stored task.
    async fn scan_all(&self) -> Result<Vec<Task>, StoreError>;

    /// Returns the task with the given id, if any.
    async fn get(&self, id: &str) -> Result<Option<Task>, StoreError>;

    /// Inserts a task, replacing any record with the same id.
    async fn put(&self, task: Task) -> Result<(), StoreError>;

    /// Applies the plan to the stored task and returns the updated record.
    async fn update_partial(&self, id: &str, plan: &UpdatePlan) -> Result<Task, StoreError>;

    /// Removes the task with the given id.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Process-local store, used when no database is configured.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<BTreeMap<String, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn scan_all(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.tasks.read().await.values().cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn put(&self, task: Task) -> Result<(), StoreError> {
        self.tasks.write().await.insert(task.id.clone(), task);
        Ok(())
    }

    async fn update_partial(&self, id: &str, plan: &UpdatePlan) -> Result<Task, StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
        plan.apply_to(task);
        Ok(task.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.tasks
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))
    }
}

/// Postgres-backed store.
pub struct SeaOrmTaskStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmTaskStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskStore for SeaOrmTaskStore {
    #[tracing::instrument(skip(self))]
    async fn scan_all(&self) -> Result<Vec<Task>, StoreError> {
        let tasks = task::Entity::find()
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(Task::from)
            .collect();
        Ok(tasks)
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let model = task::Entity::find_by_id(id.to_string())
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Task::from))
    }

    #[tracing::instrument(skip(self, task), fields(id = %task.id))]
    async fn put(&self, task: Task) -> Result<(), StoreError> {
        let active_model = task::ActiveModel {
            id: ActiveValue::Set(task.id),
            description: ActiveValue::Set(task.description),
            due_date: ActiveValue::Set(task.due_date),
            priority: ActiveValue::Set(task.priority),
            category: ActiveValue::Set(task.category),
            completed: ActiveValue::Set(task.completed),
        };
        task::Entity::insert(active_model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(task::Column::Id)
                    .update_columns([
                        task::Column::Description,
                        task::Column::DueDate,
                        task::Column::Priority,
                        task::Column::Category,
                        task::Column::Completed,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, plan))]
    async fn update_partial(&self, id: &str, plan: &UpdatePlan) -> Result<Task, StoreError> {
        let existing = task::Entity::find_by_id(id.to_string())
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;

        let mut active_model: task::ActiveModel = existing.into();
        for assignment in plan.assignments() {
            match assignment {
                Assignment::Description(description) => {
                    active_model.description = ActiveValue::Set(description.clone())
                }
                Assignment::Completed(completed) => {
                    active_model.completed = ActiveValue::Set(*completed)
                }
                Assignment::DueDate(due_date) => {
                    active_model.due_date = ActiveValue::Set(due_date.clone())
                }
                Assignment::Priority(priority) => {
                    active_model.priority = ActiveValue::Set(priority.clone())
                }
                Assignment::Category(category) => {
                    active_model.category = ActiveValue::Set(category.clone())
                }
            }
        }

        let updated_model = active_model
            .update(self.db.as_ref())
            .await
            .map_err(|err| update_error(id, err))?;
        Ok(Task::from(updated_model))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let result = task::Entity::delete_by_id(id.to_string())
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::TaskNotFound(id.to_string()));
        }
        Ok(())
    }
}

/// A row deleted between the lookup and the update surfaces as
/// `RecordNotUpdated`; report it the same way as a missing row.
fn update_error(id: &str, err: sea_orm::DbErr) -> StoreError {
    match err {
        sea_orm::DbErr::RecordNotUpdated => StoreError::TaskNotFound(id.to_string()),
        other => StoreError::Database(other),
    }
}
