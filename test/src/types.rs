use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ActionResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub active_scripts: Vec<String>,
    pub started_at: Option<String>,
}
