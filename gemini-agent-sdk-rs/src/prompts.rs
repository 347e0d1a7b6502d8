pub const DEFAULT_SYSTEM_INSTRUCTION: &str = r#"You are a helpful AI assistant powered by Gemini.

<ROLE>
* Answer the user's question accurately and clearly.
* If the user asks a question, like "why is X happening", give an answer to the question rather than a lecture on related topics.
</ROLE>

<STYLE>
* Prefer short paragraphs and concrete examples.
* Adapt depth and tone to any context provided below.
</STYLE>
"#;

pub const AGENT_LEVEL_PREAMBLE: &str = "<EXECUTION_LEVEL>agent_level: use the agent context and the prior conversation with this agent.</EXECUTION_LEVEL>";

pub const RUN_LEVEL_PREAMBLE: &str = "<EXECUTION_LEVEL>run_level: this is a single isolated run. Only the run parameters apply.</EXECUTION_LEVEL>";

pub const GLOBAL_LEVEL_PREAMBLE: &str = "<EXECUTION_LEVEL>global_level: the global context is shared system-wide and applies to every agent.</EXECUTION_LEVEL>";
