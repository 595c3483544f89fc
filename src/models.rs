use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
// wire formats first, then the shapes the client hands out

// credentials for the first login step
#[derive(Serialize, Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// credentials plus the one-time code for the second step
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OtpLoginRequest {
    pub username: String,
    pub password: String,
    pub otp_code: String,
}

// response for both login endpoints
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default)]
    pub otp_required: bool,
    #[serde(default)]
    pub refresh_window_start: Option<i64>,
    #[serde(default)]
    pub refresh_window_end: Option<i64>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ListRequest {
    pub path: String,
}

// a single entry as the listing endpoint reports it
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ApiFileEntry {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type", default)]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub modified_at: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub permissions: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub directory: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ApiFileListResponse {
    pub path: String,
    #[serde(default)]
    pub entries: Vec<ApiFileEntry>,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub total_files: usize,
    #[serde(default)]
    pub total_directories: usize,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub old_path: String,
    pub new_name: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub source_path: String,
    pub target_path: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct DeleteRequest {
    pub path: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct CreateDirectoryRequest {
    pub path: String,
    pub name: String,
}

// generic response of the mutation endpoints
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct OperationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            error: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    Online,
    Offline,
    Degraded,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SystemStatusResponse {
    pub status: SystemState,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserType {
    Admin,
    Internal,
    External,
    #[default]
    #[serde(other)]
    Unknown,
}

/// identity persisted under the `user` storage key
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub user_type: UserType,
}

/// one remote file-system entry, path always absolute and normalized
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryNode {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
    pub mime_type: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Upload,
    Download,
}

impl OperationKind {
    pub fn verb(&self) -> &'static str {
        match self {
            OperationKind::Upload => "upload",
            OperationKind::Download => "download",
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum OperationStatus {
    Pending,
    InProgress,
    Completed,
    Error,
    Cancelled,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Error | OperationStatus::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "pending"),
            OperationStatus::InProgress => write!(f, "in-progress"),
            OperationStatus::Completed => write!(f, "completed"),
            OperationStatus::Error => write!(f, "error"),
            OperationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// live state of one upload or download
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationProgress {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub file_name: String,
    /// 0-100, reaches 100 only on completion
    #[serde(rename = "progress")]
    pub progress_percent: u8,
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(
        rename = "estimatedTimeRemaining",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_seconds_remaining: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_transferred: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
}

impl OperationProgress {
    pub fn pending(id: String, kind: OperationKind, file_name: String, total_bytes: Option<u64>) -> Self {
        Self {
            id,
            kind,
            file_name,
            progress_percent: 0,
            status: OperationStatus::Pending,
            error: None,
            estimated_seconds_remaining: None,
            bytes_transferred: None,
            total_bytes,
        }
    }
}

/// the four single-request mutations
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Rename,
    Move,
    Delete,
    CreateDirectory,
}

impl MutationKind {
    pub fn verb(&self) -> &'static str {
        match self {
            MutationKind::Rename => "rename",
            MutationKind::Move => "move",
            MutationKind::Delete => "delete",
            MutationKind::CreateDirectory => "create-directory",
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            MutationKind::Rename => "/files/rename",
            MutationKind::Move => "/files/move",
            MutationKind::Delete => "/files/delete",
            MutationKind::CreateDirectory => "/files/create-directory",
        }
    }
}
