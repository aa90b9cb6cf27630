use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Progress of a running build
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    /// Ratio in `[0, 1]`, never lower than the previous update of the same build
    Updated {
        build_id: Uuid,
        ratio: f32,
        status: String,
    },
}
