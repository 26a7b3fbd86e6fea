use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::chat::message::{ContentBlock, History, Message, Role};
use crate::error::Result;
use crate::manager::{ClientManager, NamespacedTool};

pub const MESSAGE_WINDOW: usize = 10;
pub const MAX_ITERATIONS: usize = 5;
const FALLBACK_TEXT_TRUNCATE: usize = 500;
const FALLBACK_PROMPT_TRUNCATE: usize = 50;

/// The model backend, treated as a black box: given the current history and
/// an optional tool catalog, produce the next assistant message.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn create_message(
        &self,
        history: &[Message],
        tools: Option<&[NamespacedTool]>,
    ) -> Result<Message>;
}

/// Drives the model/tool iteration loop: offers namespaced tools, executes
/// model-requested tool calls via the client manager, and folds results back
/// into a bounded history.
pub struct ChatSession {
    provider: Arc<dyn ModelProvider>,
    manager: Arc<ClientManager>,
    history: History,
    tool_map: HashMap<String, String>,
    cached_tools: Vec<NamespacedTool>,
}

impl ChatSession {
    pub fn new(provider: Arc<dyn ModelProvider>, manager: Arc<ClientManager>) -> Self {
        Self {
            provider,
            manager,
            history: History::new(MESSAGE_WINDOW),
            tool_map: HashMap::new(),
            cached_tools: Vec::new(),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    async fn refresh_tool_mapping(&mut self) {
        self.cached_tools = self.manager.get_all_tools(false).await;
        self.tool_map.clear();
        for tool in &self.cached_tools {
            // tool.name is already "<server>__<tool>"; map both the
            // unqualified suffix and the namespaced name to itself.
            if let Some((_, unqualified)) = tool.name.split_once("__") {
                if self.tool_map.insert(unqualified.to_string(), tool.name.clone()).is_some() {
                    debug!("tool name '{unqualified}' collides across servers; using '{}'", tool.name);
                }
            }
            self.tool_map.insert(tool.name.clone(), tool.name.clone());
        }
    }

    fn resolve_tool_name(&self, name: &str) -> Option<String> {
        if name.contains("__") {
            Some(name.to_string())
        } else {
            self.tool_map.get(name).cloned()
        }
    }

    fn parse_tool_input(input: &Value) -> Value {
        match input {
            Value::Null => serde_json::json!({}),
            Value::String(s) => serde_json::from_str(s)
                .unwrap_or_else(|_| serde_json::json!({ "input": s })),
            other => other.clone(),
        }
    }

    fn process_tool_arguments(tool_name: &str, mut args: Value) -> Value {
        if let Value::Object(map) = &mut args {
            if tool_name.ends_with("fetch") {
                if matches!(map.get("max_length"), Some(Value::Null)) {
                    map.insert("max_length".to_string(), serde_json::json!(5000));
                }
                if matches!(map.get("start_index"), Some(Value::Null)) {
                    map.insert("start_index".to_string(), serde_json::json!(0));
                }
            }
            map.retain(|_, v| !v.is_null());
        }
        args
    }

    /// Applies the six ordered result-normalization rules, returning a
    /// sequence of (tagged) content blocks.
    fn normalize_tool_result(result: Value) -> Vec<ContentBlock> {
        if let Value::Object(ref map) = result {
            if let Some(Value::Array(items)) = map.get("content") {
                if items.iter().all(|i| matches!(i, Value::Object(o) if o.contains_key("type"))) {
                    return items
                        .iter()
                        .map(|i| match i.get("text").and_then(Value::as_str) {
                            Some(text) => ContentBlock::text(text),
                            None => ContentBlock::text(
                                serde_json::to_string(i).unwrap_or_else(|_| i.to_string()),
                            ),
                        })
                        .collect();
                }
            }
            if let Some(err) = map.get("error").and_then(Value::as_str) {
                return vec![ContentBlock::text(format!("Error: {err}"))];
            }
            if let Some(text) = map.get("text").and_then(Value::as_str) {
                return vec![ContentBlock::text(text)];
            }
            let pretty = serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());
            return vec![ContentBlock::text(pretty)];
        }
        if let Value::String(s) = &result {
            return vec![ContentBlock::text(s.clone())];
        }
        vec![ContentBlock::text(result.to_string())]
    }

    pub async fn process_prompt(&mut self, prompt: impl Into<String>) -> String {
        let prompt = prompt.into();

        for iteration in 0..MAX_ITERATIONS {
            if iteration == 0 {
                self.history.push(Message::user(&prompt));
                self.refresh_tool_mapping().await;
            } else {
                self.cached_tools = self.manager.get_all_tools(true).await;
            }

            let tools_to_use =
                if iteration < MAX_ITERATIONS - 1 { Some(self.cached_tools.as_slice()) } else { None };

            let assistant_message =
                match self.provider.create_message(self.history.messages(), tools_to_use).await {
                    Ok(m) => m,
                    Err(e) => return format!("Error: {e}"),
                };
            self.history.push(assistant_message.clone());

            let tool_calls: Vec<(String, String, Value)> = assistant_message
                .tool_calls()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            if tool_calls.is_empty() {
                let text = assistant_message.text_content();
                return if text.is_empty() { self.generate_final_response(None) } else { text };
            }

            for (id, name, input) in tool_calls {
                let args = Self::parse_tool_input(&input);
                let Some(resolved) = self.resolve_tool_name(&name) else {
                    self.history.push(Message::tool(ContentBlock::ToolResult {
                        tool_use_id: id,
                        content: vec![ContentBlock::text(format!(
                            "Error: Tool '{name}' not found or not available in any connected server."
                        ))],
                    }));
                    continue;
                };
                let args = Self::process_tool_arguments(&resolved, args);
                let result = self.manager.call_tool(&resolved, args).await;
                let content = Self::normalize_tool_result(result);
                self.history.push(Message::tool(ContentBlock::ToolResult { tool_use_id: id, content }));
            }
        }

        format!("I've reached the maximum number of tool interactions ({MAX_ITERATIONS}).")
    }

    fn generate_final_response(&self, fallback_text: Option<String>) -> String {
        if let Some(text) = fallback_text {
            return text;
        }

        for message in self.history.messages().iter().rev() {
            if message.role != Role::Tool {
                continue;
            }
            for block in &message.content {
                if let ContentBlock::ToolResult { tool_use_id, content } = block {
                    let tool_data = content.iter().filter_map(ContentBlock::as_text).collect::<Vec<_>>().join("");
                    let tool_name = self.find_tool_use_name(tool_use_id);
                    let summary = if tool_data.chars().count() > FALLBACK_TEXT_TRUNCATE {
                        let truncated: String = tool_data.chars().take(FALLBACK_TEXT_TRUNCATE).collect();
                        format!("{truncated}...")
                    } else {
                        tool_data
                    };
                    let using = tool_name.map(|n| format!(" using the {n}")).unwrap_or_default();
                    return format!("I retrieved the following information{using}:\n\n{summary}");
                }
            }
        }

        for message in self.history.messages().iter().rev().take(3) {
            if message.role == Role::User {
                let text = message.text_content();
                if !text.is_empty() {
                    let quoted = if text.chars().count() > FALLBACK_PROMPT_TRUNCATE {
                        let truncated: String = text.chars().take(FALLBACK_PROMPT_TRUNCATE).collect();
                        format!("{truncated}...")
                    } else {
                        text
                    };
                    return format!(
                        "I'm not sure how to help with \"{quoted}\". Could you rephrase or provide more detail?"
                    );
                }
            }
        }

        "I'm not sure how to help with that. Could you provide more detail?".to_string()
    }

    fn find_tool_use_name(&self, tool_use_id: &str) -> Option<String> {
        self.history.messages().iter().rev().find_map(|m| {
            m.content.iter().find_map(|b| match b {
                ContentBlock::ToolUse { id, name, .. } if id == tool_use_id => Some(name.clone()),
                _ => None,
            })
        })
    }
}
