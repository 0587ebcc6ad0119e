//! Connection statistics structures

use serde::Serialize;

/// Connection statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    pub total_connections: usize,
    pub unique_users: usize,
}
