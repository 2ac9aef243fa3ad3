use serde::{Deserialize, Serialize};
use textrec_core::types::CorpusRecord;

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendRequest {
    pub text: String,
    /// Falls back to the configured default when absent.
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendResponse {
    pub query: String,
    pub results: Vec<CorpusRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthComponents {
    pub text_model: bool,
    pub database: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Build id of the loaded artifact set, when there is one.
    pub build_id: Option<String>,
    pub components: HealthComponents,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
