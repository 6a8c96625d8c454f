//! OpenAI Assistants v2 request and response bodies.
//!
//! Only the fields the bridge reads are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `POST /threads` and thread objects.
#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    pub id: String,
}

/// `POST /threads/{id}/messages`
#[derive(Debug, Clone, Serialize)]
pub struct CreateMessageRequest<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

/// `POST /threads/{id}/runs`
#[derive(Debug, Clone, Serialize)]
pub struct CreateRunRequest<'a> {
    pub assistant_id: &'a str,
}

/// Run object.
#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    /// Status added to the API after this client was written
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }

    /// Still worth polling.
    ///
    /// `requires_action` is final for the bridge since tools are not
    /// supported.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::Queued | Self::InProgress | Self::Cancelling | Self::Unknown
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `GET /threads/{id}/messages`
#[derive(Debug, Clone, Deserialize)]
pub struct MessageList {
    #[serde(default)]
    pub data: Vec<ThreadMessage>,
}

impl MessageList {
    /// Text of the newest assistant message written by `run_id`.
    ///
    /// Expects `order=desc`. Scanning stops at the first non-assistant
    /// message, so an answer from an earlier turn is never returned.
    pub fn answer_for_run(&self, run_id: &str) -> Option<String> {
        self.data
            .iter()
            .take_while(|m| m.role == "assistant")
            .find(|m| m.run_id.as_deref().is_none_or(|id| id == run_id))
            .map(ThreadMessage::text)
            .filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    #[serde(default)]
    pub id: String,
    pub role: String,
    /// Run that wrote the message; null for user messages
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                MessageContent::Text { text } => Some(text.value.as_str()),
                MessageContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_parsing() {
        let run: Run = serde_json::from_str(
            r#"{"id":"run_1","object":"thread.run","status":"in_progress"}"#,
        )
        .unwrap();
        assert_eq!(run.status, RunStatus::InProgress);
        assert!(run.status.is_pending());

        let run: Run = serde_json::from_str(
            r#"{"id":"run_1","status":"failed","last_error":{"code":"server_error","message":"oops"}}"#,
        )
        .unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(!run.status.is_pending());
        assert_eq!(run.last_error.unwrap().message, "oops");

        let run: Run = serde_json::from_str(r#"{"id":"run_1","status":"paused"}"#).unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
    }

    #[test]
    fn test_requires_action_is_final() {
        assert!(!RunStatus::RequiresAction.is_pending());
        assert_eq!(RunStatus::RequiresAction.to_string(), "requires_action");
    }

    #[test]
    fn test_answer_for_run() {
        let list: MessageList = serde_json::from_str(
            r#"{"object":"list","data":[
                {"id":"msg_3","role":"assistant","run_id":"run_2","content":[
                    {"type":"text","text":{"value":"We are open","annotations":[]}},
                    {"type":"image_file","image_file":{"file_id":"f"}},
                    {"type":"text","text":{"value":"nine to five.","annotations":[]}}
                ]},
                {"id":"msg_2","role":"user","content":[{"type":"text","text":{"value":"Hours?"}}]},
                {"id":"msg_1","role":"assistant","content":[{"type":"text","text":{"value":"Hi"}}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            list.answer_for_run("run_2").as_deref(),
            Some("We are open\nnine to five.")
        );
        assert_eq!(list.answer_for_run("run_1"), None);
    }

    #[test]
    fn test_previous_answer_is_not_reused() {
        let list: MessageList = serde_json::from_str(
            r#"{"data":[
                {"id":"msg_2","role":"user","run_id":null,"content":[{"type":"text","text":{"value":"Hours?"}}]},
                {"id":"msg_1","role":"assistant","run_id":"run_1","content":[{"type":"text","text":{"value":"Hi"}}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(list.answer_for_run("run_2"), None);
        assert_eq!(list.answer_for_run("run_1"), None);
    }

    #[test]
    fn test_answer_for_run_blank() {
        let list: MessageList = serde_json::from_str(
            r#"{"data":[{"role":"assistant","content":[{"type":"text","text":{"value":"  "}}]}]}"#,
        )
        .unwrap();
        assert_eq!(list.answer_for_run("run_1"), None);

        let list: MessageList = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert_eq!(list.answer_for_run("run_1"), None);
    }

    #[test]
    fn test_request_bodies() {
        let body = serde_json::to_value(CreateMessageRequest {
            role: "user",
            content: "What are your hours?",
        })
        .unwrap();
        assert_eq!(body["role"], "user");
        assert_eq!(body["content"], "What are your hours?");

        let body = serde_json::to_value(CreateRunRequest {
            assistant_id: "asst_1",
        })
        .unwrap();
        assert_eq!(body["assistant_id"], "asst_1");
    }
}
