//! Session lifecycle request/response types.

use serde::{Deserialize, Serialize};

use dfnb_state::SessionId;

/// Summary of one live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    /// A backend is attached.
    pub connected: bool,
    pub cell_count: usize,
    /// The session's dependency graph exists (some cell has completed).
    pub has_graph: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSessionResponse {
    pub success: bool,
}

/// Connects a session to a kernel bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachBackendRequest {
    /// Base URL; requests go to `{url}/execute`.
    pub url: String,
}
