use serde::{Deserialize, Serialize};

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UploadState {
    #[default]
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "uploading")]
    Uploading,
    #[serde(rename = "paused")]
    Paused,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "failed")]
    Failed,
}

impl UploadState {
    /// Returns `true` for states no transition can leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Returns `true` if `start`/`resume` is allowed from this state.
    pub fn can_resume(self) -> bool {
        matches!(self, Self::Idle | Self::Paused | Self::Uploading)
    }
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of an upload session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    /// Empty until the session has been started once.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    pub state: UploadState,
    pub file_name: String,
    pub sent_chunks: u64,
    pub total_chunks: u64,
    pub sent_bytes: u64,
    pub total_bytes: u64,
    /// Bytes per second over the recent window (0 when unknown).
    #[serde(default)]
    pub bytes_per_second: f64,
    /// Estimated seconds remaining, if the speed is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub started_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl UploadProgress {
    /// Returns the upload progress as a percentage of acknowledged chunks (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        (self.sent_chunks as f64 / self.total_chunks as f64 * 100.0).clamp(0.0, 100.0)
    }
}
