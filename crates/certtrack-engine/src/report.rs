//! Structured job results.
//!
//! Jobs have no interactive caller; these reports (serialized as JSON by
//! the CLI) and the logs are the only place failures surface, so they must
//! be monitored operationally.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct MaterializerReport {
    pub success: bool,
    pub processed_count: u64,
    pub created_count: u64,
    pub skipped_count: u64,
    pub error_count: u64,
    pub current_academic_year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub request_id: String,
}

impl MaterializerReport {
    pub fn failed(request_id: &str, current_academic_year: i32, error: String) -> Self {
        Self {
            success: false,
            processed_count: 0,
            created_count: 0,
            skipped_count: 0,
            error_count: 0,
            current_academic_year,
            error: Some(error),
            request_id: request_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotifierReport {
    pub success: bool,
    pub processed_count: u64,
    pub notifications_sent: u64,
    pub error_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub request_id: String,
}

impl NotifierReport {
    pub fn failed(request_id: &str, error: String) -> Self {
        Self {
            success: false,
            processed_count: 0,
            notifications_sent: 0,
            error_count: 0,
            error: Some(error),
            request_id: request_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiverReport {
    pub success: bool,
    pub archived_count: u64,
    pub current_academic_year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub request_id: String,
}

impl ArchiverReport {
    pub fn failed(request_id: &str, current_academic_year: i32, error: String) -> Self {
        Self {
            success: false,
            archived_count: 0,
            current_academic_year,
            error: Some(error),
            request_id: request_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpirerReport {
    pub success: bool,
    pub expired_notifications: u64,
    pub expired_recipients: u64,
    pub total_checked: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub request_id: String,
}

impl ExpirerReport {
    pub fn failed(request_id: &str, error: String) -> Self {
        Self {
            success: false,
            expired_notifications: 0,
            expired_recipients: 0,
            total_checked: 0,
            error: Some(error),
            request_id: request_id.to_string(),
        }
    }
}
