pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod listing;
pub mod models;
pub mod progress;
pub mod retry;
pub mod session;
pub mod status;
pub mod storage;
pub mod tracker;
pub mod utils;
pub mod validator;

pub use api::{FileApi, UploadFile};
pub use auth::{AuthService, LoginOutcome};
pub use config::Config;
pub use error::{NetworkError, OperationError, OperationNotFound, TransferError, ValidationError};
pub use gateway::HttpGateway;
pub use listing::DirectoryService;
pub use models::{DirectoryNode, OperationKind, OperationProgress, OperationStatus};
pub use session::SessionStore;
pub use tracker::OperationTracker;
