use serde_json::Value;
use std::collections::BTreeMap;

use crate::events::Event;
use crate::execution::ExecutionLevel;
use crate::llm::PromptMessage;
use crate::prompts::{AGENT_LEVEL_PREAMBLE, GLOBAL_LEVEL_PREAMBLE, RUN_LEVEL_PREAMBLE};

pub(crate) type Section = (&'static str, BTreeMap<String, Value>);

fn preamble(level: ExecutionLevel) -> &'static str {
    match level {
        ExecutionLevel::AgentLevel => AGENT_LEVEL_PREAMBLE,
        ExecutionLevel::RunLevel => RUN_LEVEL_PREAMBLE,
        ExecutionLevel::GlobalLevel => GLOBAL_LEVEL_PREAMBLE,
    }
}

/// Strings render bare; everything else as compact JSON.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_section(title: &str, entries: &BTreeMap<String, Value>) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let mut out = format!("{}:", title);
    for (key, value) in entries {
        out.push_str(&format!("\n- {}: {}", key, render_value(value)));
    }
    Some(out)
}

pub(crate) fn system_prompt(instruction: &str, level: ExecutionLevel, sections: &[Section]) -> String {
    let mut parts = vec![instruction.trim_end().to_string(), preamble(level).to_string()];
    parts.extend(
        sections
            .iter()
            .filter_map(|(title, entries)| render_section(title, entries)),
    );
    parts.join("\n\n")
}

pub(crate) fn build_messages(system: String, history: &[Event], query: &str) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(system));
    for event in history {
        if event.is_user() {
            messages.push(PromptMessage::user(event.content()));
        } else {
            messages.push(PromptMessage::assistant(event.content()));
        }
    }
    messages.push(PromptMessage::user(query));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::USER_SOURCE;
    use crate::llm::PromptRole;
    use serde_json::json;

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("educational")), "educational");
        assert_eq!(render_value(&json!(3)), "3");
        assert_eq!(render_value(&json!({"a": [1, 2]})), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_system_prompt_skips_empty_sections() {
        let mut ctx = BTreeMap::new();
        ctx.insert("user_level".to_string(), json!("advanced"));
        ctx.insert("preferred_style".to_string(), json!("detailed"));
        let prompt = system_prompt(
            "Be helpful.\n",
            ExecutionLevel::GlobalLevel,
            &[("Global context", ctx), ("Run parameters", BTreeMap::new())],
        );

        assert!(prompt.starts_with("Be helpful.\n\n<EXECUTION_LEVEL>global_level"));
        assert!(prompt.ends_with("Global context:\n- preferred_style: detailed\n- user_level: advanced"));
        assert!(!prompt.contains("Run parameters"));
    }

    #[test]
    fn test_build_messages_maps_history_roles() {
        let history = vec![
            Event::message(USER_SOURCE, "What is AI?", ExecutionLevel::AgentLevel),
            Event::message("QuickTestAgent", "AI is...", ExecutionLevel::AgentLevel),
        ];
        let messages = build_messages("sys".to_string(), &history, "And ML?");
        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![PromptRole::System, PromptRole::User, PromptRole::Assistant, PromptRole::User]
        );
        assert_eq!(messages[3].content, "And ML?");
    }
}
