use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{NewTask, StoreError, Task, TaskStore, TaskUpdate, UpdatePlan};
use crate::auth::{CurrentUser, ErrorResponse};
use crate::notify::Notifier;
use crate::reminder::ReminderScanner;

/// Shared state of the task handlers.
#[derive(Clone)]
pub struct TaskState {
    pub store: Arc<dyn TaskStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl TaskState {
    pub fn new(store: Arc<dyn TaskStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of a reminder scan.
#[derive(Debug, Serialize, ToSchema)]
pub struct RemindersResponse {
    message: String,
    /// Number of reminders published
    count: usize,
}

/// Custom error type for task handler operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskApiError {
    /// The update body named no updatable field.
    #[error("No update parameters provided")]
    EmptyUpdate,
    /// Represents a task not found error.
    #[error("Task with ID {0} not found")]
    NotFound(String),
    /// Represents a store error.
    #[error("Store error")]
    Store(#[source] StoreError),
}

impl From<StoreError> for TaskApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TaskNotFound(id) => TaskApiError::NotFound(id),
            other => TaskApiError::Store(other),
        }
    }
}

impl IntoResponse for TaskApiError {
    fn into_response(self) -> Response {
        match self {
            TaskApiError::EmptyUpdate => (
                StatusCode::BAD_REQUEST,
                Json(MessageResponse::new("No update parameters provided")),
            )
                .into_response(),
            TaskApiError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "NotFound".to_string(),
                    message: format!("Task with ID {} not found", id),
                }),
            )
                .into_response(),
            TaskApiError::Store(err) => {
                tracing::error!("Task store failure: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "InternalServerError".to_string(),
                        message: "An unexpected error occurred while processing your request. Please try again later.".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Handler for GET /tasks - Returns every stored task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/tasks",
    responses(
        (status = 200, description = "All stored tasks", body = Vec<Task>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn list_tasks_handler(
    State(state): State<Arc<TaskState>>,
) -> Result<Json<Vec<Task>>, TaskApiError> {
    Ok(Json(state.store.scan_all().await?))
}

/// Handler for GET /tasks/{id} - Returns a single task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/tasks/{id}",
    params(("id" = String, Path, description = "Task identifier")),
    responses(
        (status = 200, description = "The task", body = Task),
        (status = 404, description = "No task with that id", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn get_task_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, TaskApiError> {
    state
        .store
        .get(&id)
        .await?
        .map(Json)
        .ok_or(TaskApiError::NotFound(id))
}

/// Handler for POST /tasks - Creates a task and announces it.
///
/// The announcement is best effort; a failed publish never fails the request.
#[tracing::instrument(skip(state, user, payload), fields(subject = ?user.subject()))]
#[utoipa::path(
    post,
    path = "/tasks",
    request_body = NewTask,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), TaskApiError> {
    let task = Task::create(payload);
    state.store.put(task.clone()).await?;
    tracing::info!(task_id = %task.id, "Task created");

    let (subject, body) = creation_message(&task);
    if let Err(err) = state.notifier.publish(&subject, &body).await {
        tracing::error!(task_id = %task.id, "Error sending notification: {}", err);
    }

    Ok((StatusCode::CREATED, Json(task)))
}

/// Handler for PUT /tasks/{id} - Changes only the fields present in the body.
#[tracing::instrument(skip(state, user, payload), fields(subject = ?user.subject()))]
#[utoipa::path(
    put,
    path = "/tasks/{id}",
    params(("id" = String, Path, description = "Task identifier")),
    request_body = TaskUpdate,
    responses(
        (status = 200, description = "Task updated", body = MessageResponse),
        (status = 400, description = "No updatable field in the body", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "No task with that id", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<TaskUpdate>,
) -> Result<Json<MessageResponse>, TaskApiError> {
    let plan = UpdatePlan::build(&payload).ok_or(TaskApiError::EmptyUpdate)?;
    state.store.update_partial(&id, &plan).await?;
    Ok(Json(MessageResponse::new("Task updated successfully")))
}

/// Handler for DELETE /tasks/{id}.
#[tracing::instrument(skip(state, user), fields(subject = ?user.subject()))]
#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    params(("id" = String, Path, description = "Task identifier")),
    responses(
        (status = 200, description = "Task deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "No task with that id", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, TaskApiError> {
    state.store.delete(&id).await?;
    Ok(Json(MessageResponse::new("Task deleted successfully")))
}

/// Handler for POST /send-reminders - Reminds about open tasks due today or tomorrow.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/send-reminders",
    responses(
        (status = 200, description = "Scan finished", body = RemindersResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    tag = "Reminders"
)]
pub async fn send_reminders_handler(
    State(state): State<Arc<TaskState>>,
) -> Result<Json<RemindersResponse>, TaskApiError> {
    let today = chrono::Utc::now().date_naive();
    let tasks = state.store.scan_all().await?;
    let count = ReminderScanner::new(state.notifier.clone())
        .scan(&tasks, today)
        .await;

    Ok(Json(RemindersResponse {
        message: format!("Reminders sent for {} tasks", count),
        count,
    }))
}

fn creation_message(task: &Task) -> (String, String) {
    let subject = format!("New Task Notification : {}", task.description);
    let body = format!(
        "A new task has been created:\nTask Description: {} \nDue Date: {} \nPriority: {}",
        task.description,
        task.due_date.as_deref().unwrap_or("None"),
        display_scalar(task.priority.as_ref()),
    );
    (subject, body)
}

fn display_scalar(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "None".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Routes that anyone may call.
pub fn create_public_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/", get(list_tasks_handler))
        .route("/tasks", get(list_tasks_handler))
        .route("/tasks/{id}", get(get_task_handler))
        .with_state(state)
}

/// Routes that mutate tasks. Callers must wrap these in the auth middlewares.
pub fn create_protected_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/tasks", post(create_task_handler))
        .route(
            "/tasks/{id}",
            axum::routing::put(update_task_handler).delete(delete_task_handler),
        )
        .with_state(state)
}

/// The reminder trigger, on its own so it can be mounted with or without auth.
pub fn create_reminder_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/send-reminders", post(send_reminders_handler))
        .with_state(state)
}
