use serde_json::Value;

/// A single piece of message content. Tagged sum type replacing the
/// loosely-typed `{type, ...}` dicts the wire protocol uses.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: Vec<ContentBlock> },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: vec![ContentBlock::text(text)] }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self { role: Role::Assistant, content }
    }

    pub fn tool(content: ContentBlock) -> Self {
        Self { role: Role::Tool, content: vec![content] }
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// `(id, name, input)` for every tool_use block in this message.
    pub fn tool_calls(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
                _ => None,
            })
            .collect()
    }
}

/// Bounded message history: after every append, the oldest entries are
/// dropped until `len() <= window`.
#[derive(Debug, Clone)]
pub struct History {
    window: usize,
    messages: Vec<Message>,
}

impl History {
    pub fn new(window: usize) -> Self {
        Self { window, messages: Vec::new() }
    }

    pub fn push(&mut self, message: Message) {
        if !message.has_content() {
            return;
        }
        self.messages.push(message);
        while self.messages.len() > self.window {
            self.messages.remove(0);
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_window_size() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.push(Message::user(format!("msg {i}")));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.messages()[0].text_content(), "msg 2");
        assert_eq!(history.messages()[2].text_content(), "msg 4");
    }

    #[test]
    fn empty_content_messages_are_never_stored() {
        let mut history = History::new(10);
        history.push(Message { role: Role::Assistant, content: vec![] });
        assert!(history.is_empty());
    }

    #[test]
    fn tool_calls_extracts_only_tool_use_blocks() {
        let message = Message::assistant(vec![
            ContentBlock::text("thinking..."),
            ContentBlock::ToolUse { id: "1".into(), name: "ping".into(), input: serde_json::json!({}) },
        ]);
        let calls = message.tool_calls();
        assert_eq!(calls, vec![("1", "ping", &serde_json::json!({}))]);
    }
}
