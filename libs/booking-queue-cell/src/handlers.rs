use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;

use shared_models::AppError;

use crate::services::queue::MessageQueue;
use crate::{QueueHealth, QueueStats};

/// Read-only operator view over the lanes and the completion channel.
#[derive(Clone)]
pub struct QueueAdminState {
    pub queue: Arc<dyn MessageQueue>,
    pub queue_names: Vec<String>,
}

impl QueueAdminState {
    pub fn new(queue: Arc<dyn MessageQueue>, queue_names: Vec<String>) -> Self {
        Self { queue, queue_names }
    }
}

/// Depth and health of every known queue
pub async fn get_queue_stats(
    State(state): State<QueueAdminState>,
) -> Result<Json<Value>, AppError> {
    let mut stats = Vec::with_capacity(state.queue_names.len());
    for name in &state.queue_names {
        let depth = state.queue.depth(name).await?;
        stats.push(QueueStats {
            queue: name.clone(),
            queue_health: QueueHealth::from_depth(&depth),
            depth,
        });
    }

    Ok(Json(json!({
        "success": true,
        "data": stats,
    })))
}

/// Deliveries parked on a queue's dead-letter list
pub async fn get_dead_letters(
    State(state): State<QueueAdminState>,
    Path(queue): Path<String>,
) -> Result<Json<Value>, AppError> {
    if !state.queue_names.iter().any(|name| name == &queue) {
        return Err(AppError::NotFound(format!("Unknown queue {}", queue)));
    }

    let dead_letters = state.queue.dead_letters(&queue).await?;
    info!("{} dead letters on {}", dead_letters.len(), queue);

    Ok(Json(json!({
        "success": true,
        "data": dead_letters,
        "total": dead_letters.len(),
    })))
}
