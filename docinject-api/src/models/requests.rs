use docinject::DEFAULT_USER_ID;
use serde::{Deserialize, Serialize};

fn default_user() -> String {
    DEFAULT_USER_ID.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocsRequest {
    pub library_name: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default = "default_user")]
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemorySearchRequest {
    pub query: String,
    #[serde(default = "default_user")]
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryHistoryParams {
    #[serde(default = "default_user")]
    pub user_id: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedbackRequest {
    pub trace_id: String,
    pub score: f64,
    #[serde(default)]
    pub feedback_type: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResponse {
    pub trace_id: String,
    pub logged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docs_request_defaults_user() {
        let request: DocsRequest =
            serde_json::from_str(r#"{"library_name": "fastapi"}"#).unwrap();
        assert_eq!(request.user_id, "zed_user");
        assert_eq!(request.topic, None);
    }

    #[test]
    fn test_feedback_request_optional_fields() {
        let request: FeedbackRequest =
            serde_json::from_str(r#"{"trace_id": "t1", "score": 1.0}"#).unwrap();
        assert_eq!(request.feedback_type, None);
        assert_eq!(request.comment, None);
    }
}
