//! Messages API wire types.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Base64 image payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub media_type: String,
    pub data: String,
}

/// One block of request content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// JPEG image block from raw bytes.
    pub fn jpeg(bytes: &[u8]) -> Self {
        Self::Image {
            source: ImageSource {
                kind: "base64",
                media_type: "image/jpeg".to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

/// Tool definition offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolChoice {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
}

/// Request body for `POST /v1/messages`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

impl MessageRequest {
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            system: None,
            messages: Vec::new(),
            tools: Vec::new(),
            tool_choice: None,
            stream: false,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Append a user turn with a single text block.
    pub fn user_text(self, text: impl Into<String>) -> Self {
        self.user(vec![ContentBlock::text(text)])
    }

    /// Append a user turn with arbitrary content blocks.
    pub fn user(mut self, content: Vec<ContentBlock>) -> Self {
        self.messages.push(Message {
            role: Role::User,
            content,
        });
        self
    }

    /// Offer `tool` and force the model to call it.
    pub fn force_tool(mut self, tool: Tool) -> Self {
        self.tool_choice = Some(ToolChoice {
            kind: "tool",
            name: tool.name.clone(),
        });
        self.tools.push(tool);
        self
    }

    /// Receive the response as server-sent events.
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// One block of response content.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Response body of `POST /v1/messages`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub content: Vec<ResponseBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Usage,
}

impl MessageResponse {
    /// Text-only response, as produced by fakes and stream accumulation.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ResponseBlock::Text { text: text.into() }],
            ..Default::default()
        }
    }

    /// Concatenated text of every text block.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ResponseBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Input of the first call to tool `name`.
    pub fn tool_input(&self, name: &str) -> ClientResult<&Value> {
        self.content
            .iter()
            .find_map(|b| match b {
                ResponseBlock::ToolUse { name: n, input, .. } if n == name => Some(input),
                _ => None,
            })
            .ok_or_else(|| {
                ClientError::invalid_response("anthropic", format!("no {} tool call in response", name))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let tool = Tool {
            name: "score_dimension".into(),
            description: "Submit the score".into(),
            input_schema: json!({"type": "object"}),
        };
        let req = MessageRequest::new("m", 256)
            .user(vec![ContentBlock::jpeg(b"abc"), ContentBlock::text("Classify")])
            .force_tool(tool);
        let v = serde_json::to_value(&req).unwrap();

        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["messages"][0]["content"][0]["type"], "image");
        assert_eq!(v["messages"][0]["content"][0]["source"]["data"], "YWJj");
        assert_eq!(v["messages"][0]["content"][1]["text"], "Classify");
        assert_eq!(v["tool_choice"], json!({"type": "tool", "name": "score_dimension"}));
        assert!(v.get("stream").is_none());
        assert!(v.get("system").is_none());
    }

    #[test]
    fn test_response_accessors() {
        let resp: MessageResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "a"},
                {"type": "tool_use", "id": "t1", "name": "score_dimension", "input": {"score": 7}},
                {"type": "text", "text": "b"}
            ],
            "stop_reason": "tool_use"
        }))
        .unwrap();

        assert_eq!(resp.text(), "ab");
        assert_eq!(resp.tool_input("score_dimension").unwrap()["score"], 7);
        assert!(resp.tool_input("other").is_err());
    }
}
