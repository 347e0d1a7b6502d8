mod error;
mod prompt;

pub use error::AgentError;

use crate::config::AgentConfig;
use crate::context::{self, ContextStore, ExecutionStats, GlobalState};
use crate::events::{Event, History, USER_SOURCE};
use crate::execution::{
    AgentResponse, ExecutionLevel, ExecutionMethod, QueryOutput, QueryParams, ResponseStream,
    StreamItem,
};
use crate::llm::{ChatBackend, LLM, LLMConfig, PromptMessage};
use chrono::{DateTime, Local};
use futures::StreamExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::runtime::{Builder, Handle, RuntimeFlavor};
use tracing::Instrument;
use uuid::Uuid;

fn block_on_private_runtime<F>(task: F) -> Result<AgentResponse, AgentError>
where
    F: Future<Output = Result<AgentResponse, AgentError>>,
{
    Builder::new_current_thread().enable_all().build()?.block_on(task)
}

/// Everything needed to send one query and record its outcome.
struct PreparedQuery {
    run_id: Uuid,
    level: ExecutionLevel,
    method: ExecutionMethod,
    query: String,
    /// Agent-level params, merged into the agent context only on success.
    agent_params: Option<QueryParams>,
    messages: Vec<PromptMessage>,
    started_at: DateTime<Local>,
    started: Instant,
}

/// An agent that answers queries at one of three execution levels, through
/// one of three execution methods.
///
/// Clones share the agent context, the agent history and the global state.
#[derive(Clone)]
pub struct GeminiAgent {
    config: Arc<AgentConfig>,
    backend: Arc<dyn ChatBackend>,
    agent_context: ContextStore,
    history: Arc<RwLock<History>>,
    global: GlobalState,
}

impl GeminiAgent {
    /// Creates a Gemini-backed agent attached to the process-wide global state.
    pub fn new(config: AgentConfig) -> Result<Self, AgentError> {
        let llm = LLM::new(LLMConfig {
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        });
        Self::with_backend(config, Arc::new(llm), GlobalState::shared())
    }

    pub fn with_backend(
        config: AgentConfig,
        backend: Arc<dyn ChatBackend>,
        global: GlobalState,
    ) -> Result<Self, AgentError> {
        config.validate()?;
        tracing::debug!("Creating agent {} with model {}", config.name, backend.model());
        Ok(Self {
            history: Arc::new(RwLock::new(History::new(config.max_history_messages))),
            config: Arc::new(config),
            backend,
            agent_context: ContextStore::new(),
            global,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn global_state(&self) -> &GlobalState {
        &self.global
    }

    /// Single entry point: dispatches `query` according to `method` and `level`.
    ///
    /// For [`ExecutionMethod::Streaming`] the returned [`QueryOutput::Stream`]
    /// must be consumed to completion for the exchange to be recorded.
    pub async fn execute_query(
        &self,
        query: &str,
        method: ExecutionMethod,
        level: ExecutionLevel,
        params: Option<QueryParams>,
    ) -> Result<QueryOutput, AgentError> {
        match method {
            ExecutionMethod::Run => {
                let response = self.run(query, level, params.as_ref()).await?;
                Ok(QueryOutput::Complete(response))
            }
            ExecutionMethod::RunSync => {
                let agent = self.clone();
                let query = query.to_string();
                let response = tokio::task::spawn_blocking(move || {
                    agent.run_sync(&query, level, params.as_ref())
                })
                .await??;
                Ok(QueryOutput::Complete(response))
            }
            ExecutionMethod::Streaming => {
                let stream = self.stream(query, level, params.as_ref()).await?;
                Ok(QueryOutput::Stream(stream))
            }
        }
    }

    pub async fn run(
        &self,
        query: &str,
        level: ExecutionLevel,
        params: Option<&QueryParams>,
    ) -> Result<AgentResponse, AgentError> {
        self.complete(query, ExecutionMethod::Run, level, params).await
    }

    /// Blocking variant of [`GeminiAgent::run`].
    ///
    /// On a multi-thread tokio runtime the query runs on the surrounding
    /// runtime via `block_in_place`. Inside a current-thread runtime it runs
    /// on a scoped thread with a private runtime, and outside any runtime on
    /// a private runtime on the calling thread.
    pub fn run_sync(
        &self,
        query: &str,
        level: ExecutionLevel,
        params: Option<&QueryParams>,
    ) -> Result<AgentResponse, AgentError> {
        let task = || self.complete(query, ExecutionMethod::RunSync, level, params);
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(task()))
            }
            // A current-thread runtime cannot be re-entered from its own thread.
            Ok(_) => std::thread::scope(|scope| {
                scope
                    .spawn(|| block_on_private_runtime(task()))
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            }),
            Err(_) => block_on_private_runtime(task()),
        }
    }

    /// Streams the answer chunk by chunk, ending with [`StreamItem::Done`].
    pub async fn stream(
        &self,
        query: &str,
        level: ExecutionLevel,
        params: Option<&QueryParams>,
    ) -> Result<ResponseStream, AgentError> {
        let prepared = self.prepare(query, ExecutionMethod::Streaming, level, params)?;
        let span = self.query_span(&prepared);
        let mut chunks = self
            .backend
            .stream(prepared.messages.clone())
            .instrument(span.clone())
            .await?;

        let agent = self.clone();
        let stream = async_stream::stream! {
            let mut content = String::new();
            let mut count = 0usize;

            while let Some(chunk) = chunks.next().instrument(span.clone()).await {
                match chunk {
                    Ok(text) => {
                        if agent.config.echo_output {
                            print!("{}", text);
                            let _ = std::io::stdout().flush();
                        }
                        content.push_str(&text);
                        count += 1;
                        yield Ok::<StreamItem, AgentError>(StreamItem::Chunk(text));
                    }
                    Err(e) => {
                        span.in_scope(|| tracing::error!("Stream failed after {} chunks: {}", count, e));
                        yield Err(AgentError::from(e));
                        return;
                    }
                }
            }

            if agent.config.echo_output {
                println!();
            }
            if content.is_empty() {
                span.in_scope(|| tracing::error!("Stream ended without any text"));
                yield Err(AgentError::Llm(crate::llm::LlmError::EmptyResponse));
                return;
            }
            let response = span.in_scope(|| agent.finish(prepared, content, count));
            yield Ok(StreamItem::Done(response));
        };

        Ok(Box::pin(stream))
    }

    async fn complete(
        &self,
        query: &str,
        method: ExecutionMethod,
        level: ExecutionLevel,
        params: Option<&QueryParams>,
    ) -> Result<AgentResponse, AgentError> {
        let prepared = self.prepare(query, method, level, params)?;
        let span = self.query_span(&prepared);

        async move {
            let content = self.backend.complete(prepared.messages.clone()).await?;
            if self.config.echo_output {
                println!("{}", content);
            }
            Ok::<_, AgentError>(self.finish(prepared, content, 1))
        }
        .instrument(span)
        .await
    }

    fn query_span(&self, prepared: &PreparedQuery) -> tracing::Span {
        tracing::info_span!(
            "query",
            agent = %self.config.name,
            level = %prepared.level,
            method = %prepared.method,
            run_id = %prepared.run_id,
        )
    }

    fn prepare(
        &self,
        query: &str,
        method: ExecutionMethod,
        level: ExecutionLevel,
        params: Option<&QueryParams>,
    ) -> Result<PreparedQuery, AgentError> {
        if query.trim().is_empty() {
            return Err(AgentError::EmptyQuery);
        }

        let run_id = Uuid::new_v4();
        let run_params = params.cloned().unwrap_or_default();
        let max = self.config.max_history_messages;

        let mut agent_params = None;
        let (sections, history): (Vec<prompt::Section>, Vec<Event>) = match level {
            ExecutionLevel::AgentLevel => {
                let mut agent_ctx = self.agent_context.snapshot();
                agent_ctx.extend(run_params.clone());
                agent_params = Some(run_params);
                let history = context::read(&self.history).tail(max);
                (vec![("Agent context", agent_ctx)], history)
            }
            ExecutionLevel::RunLevel => {
                let mut run = run_params;
                run.insert("run_id".to_string(), Value::String(run_id.to_string()));
                (vec![("Run parameters", run)], Vec::new())
            }
            ExecutionLevel::GlobalLevel => (
                vec![
                    ("Global context", self.global.context().snapshot()),
                    ("Run parameters", run_params),
                ],
                self.global.history_tail(max),
            ),
        };

        let system = prompt::system_prompt(&self.config.system_instruction, level, &sections);
        tracing::debug!(
            "Prepared {} query with {} history messages",
            level,
            history.len()
        );

        Ok(PreparedQuery {
            run_id,
            level,
            method,
            messages: prompt::build_messages(system, &history, query),
            query: query.to_string(),
            agent_params,
            started_at: Local::now(),
            started: Instant::now(),
        })
    }

    fn finish(&self, prepared: PreparedQuery, content: String, chunks: usize) -> AgentResponse {
        let user = Event::message(USER_SOURCE, prepared.query, prepared.level);
        let reply = Event::message(self.config.name.clone(), content.clone(), prepared.level);

        if let Some(params) = &prepared.agent_params {
            self.agent_context.merge(params);
        }
        match prepared.level {
            ExecutionLevel::AgentLevel => {
                let mut history = context::write(&self.history);
                history.push(user);
                history.push(reply);
            }
            ExecutionLevel::GlobalLevel => self.global.record_exchange(user, reply),
            ExecutionLevel::RunLevel => {}
        }
        self.global.record_execution(prepared.level, prepared.method);

        let elapsed_ms = u64::try_from(prepared.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            run_id = %prepared.run_id,
            "{} + {} completed in {}ms",
            prepared.level,
            prepared.method,
            elapsed_ms
        );

        AgentResponse {
            content,
            agent: self.config.name.clone(),
            model: self.backend.model().to_string(),
            level: prepared.level,
            method: prepared.method,
            run_id: prepared.run_id,
            started_at: prepared.started_at,
            elapsed_ms,
            chunks,
        }
    }

    pub fn update_agent_context(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.agent_context.set(key, value);
    }

    /// Sets a system-wide entry, visible to every agent sharing this global state.
    pub fn update_global_context(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        tracing::debug!("Global context updated: {}", key);
        self.global.context().set(key, value);
    }

    pub fn agent_context(&self) -> BTreeMap<String, Value> {
        self.agent_context.snapshot()
    }

    pub fn global_context(&self) -> BTreeMap<String, Value> {
        self.global.context().snapshot()
    }

    pub fn agent_history(&self) -> Vec<Event> {
        context::read(&self.history).events()
    }

    /// Forgets the agent context and history; global state is untouched.
    pub fn clear_agent_state(&self) {
        self.agent_context.clear();
        context::write(&self.history).clear();
    }

    pub fn stats(&self) -> ExecutionStats {
        self.global.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChunkStream, LlmError, PromptRole};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use strum::IntoEnumIterator;

    /// Answers every request with `reply`, or fails with `fail_with`.
    /// Streams split the reply on spaces; `fail_stream_after` injects a
    /// mid-stream error after that many chunks.
    struct ScriptedBackend {
        reply: String,
        fail_with: Option<String>,
        fail_stream_after: Option<usize>,
        requests: Mutex<Vec<Vec<PromptMessage>>>,
    }

    impl ScriptedBackend {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                fail_with: None,
                fail_stream_after: None,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: String::new(),
                fail_with: Some(message.to_string()),
                fail_stream_after: None,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn breaking_stream(reply: &str, after: usize) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                fail_with: None,
                fail_stream_after: Some(after),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<Vec<PromptMessage>> {
            self.requests.lock().unwrap().clone()
        }

        fn last_system(&self) -> String {
            self.requests().last().unwrap()[0].content.clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, messages: Vec<PromptMessage>) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(messages);
            match &self.fail_with {
                Some(msg) => Err(LlmError::Backend(msg.clone())),
                None => Ok(self.reply.clone()),
            }
        }

        async fn stream(&self, messages: Vec<PromptMessage>) -> Result<ChunkStream, LlmError> {
            self.requests.lock().unwrap().push(messages);
            if let Some(msg) = &self.fail_with {
                return Err(LlmError::Backend(msg.clone()));
            }
            let mut items: Vec<Result<String, LlmError>> = self
                .reply
                .split_inclusive(' ')
                .map(|c| Ok(c.to_string()))
                .collect();
            if let Some(after) = self.fail_stream_after {
                items.truncate(after);
                items.push(Err(LlmError::Backend("connection reset".to_string())));
            }
            Ok(futures::stream::iter(items).boxed())
        }
    }

    fn agent_with(backend: Arc<ScriptedBackend>) -> GeminiAgent {
        let config = AgentConfig::new("TestAgent").with_echo_output(false);
        GeminiAgent::with_backend(config, backend, GlobalState::new()).unwrap()
    }

    fn params(key: &str, value: &str) -> Option<QueryParams> {
        let mut p = QueryParams::new();
        p.insert(key.to_string(), json!(value));
        Some(p)
    }

    #[tokio::test]
    async fn test_agent_level_keeps_context_and_history() {
        let backend = ScriptedBackend::replying("Machine learning is...");
        let agent = agent_with(backend.clone());

        let output = agent
            .execute_query(
                "What is machine learning?",
                ExecutionMethod::Run,
                ExecutionLevel::AgentLevel,
                params("context", "educational"),
            )
            .await
            .unwrap();
        let response = output.into_response().await.unwrap();
        assert_eq!(response.content, "Machine learning is...");
        assert_eq!(response.agent, "TestAgent");
        assert_eq!(response.chunks, 1);
        assert_eq!(agent.agent_context()["context"], json!("educational"));
        assert_eq!(agent.agent_history().len(), 2);

        agent
            .run("And deep learning?", ExecutionLevel::AgentLevel, None)
            .await
            .unwrap();

        let second = &backend.requests()[1];
        assert!(second[0].content.contains("Agent context:\n- context: educational"));
        assert_eq!(second.len(), 4);
        assert_eq!(second[1].content, "What is machine learning?");
        assert_eq!(second[2].role, PromptRole::Assistant);
        assert_eq!(second[3].content, "And deep learning?");
    }

    #[tokio::test]
    async fn test_run_level_is_isolated() {
        let backend = ScriptedBackend::replying("Python basics...");
        let agent = agent_with(backend.clone());

        let response = agent
            .run("Explain Python basics", ExecutionLevel::RunLevel, params("difficulty", "beginner").as_ref())
            .await
            .unwrap();

        let system = backend.last_system();
        assert!(system.contains("Run parameters:\n- difficulty: beginner"));
        assert!(system.contains(&format!("- run_id: {}", response.run_id)));
        assert!(agent.agent_context().is_empty());
        assert!(agent.agent_history().is_empty());
        assert!(agent.global_state().history_tail(10).is_empty());
        assert_eq!(agent.stats().for_level(ExecutionLevel::RunLevel), 1);
    }

    #[tokio::test]
    async fn test_global_level_uses_shared_context() {
        let backend = ScriptedBackend::replying("Neural networks...");
        let agent = agent_with(backend.clone());
        let global = agent.global_state().clone();
        let other = GeminiAgent::with_backend(
            AgentConfig::new("OtherAgent").with_echo_output(false),
            backend.clone(),
            global,
        )
        .unwrap();

        agent.update_global_context("user_level", "advanced");
        agent.update_global_context("preferred_style", "detailed");
        assert_eq!(other.global_context()["user_level"], json!("advanced"));

        other
            .run("How does a neural network work?", ExecutionLevel::GlobalLevel, params("topic", "deep_learning").as_ref())
            .await
            .unwrap();

        let system = backend.last_system();
        assert!(system.contains("Global context:\n- preferred_style: detailed\n- user_level: advanced"));
        assert!(system.contains("Run parameters:\n- topic: deep_learning"));
        assert_eq!(agent.global_state().history_tail(10).len(), 2);
        assert!(other.agent_history().is_empty());
        assert_eq!(agent.stats().total, 1);
    }

    #[tokio::test]
    async fn test_streaming_yields_chunks_then_done() {
        let backend = ScriptedBackend::replying("AI is the study of agents");
        let agent = agent_with(backend);

        let output = agent
            .execute_query("What is AI?", ExecutionMethod::Streaming, ExecutionLevel::AgentLevel, None)
            .await
            .unwrap();
        let QueryOutput::Stream(mut stream) = output else {
            panic!("Expected a stream");
        };

        let mut chunks = Vec::new();
        let mut done = None;
        while let Some(item) = stream.next().await {
            match item.unwrap() {
                StreamItem::Chunk(c) => chunks.push(c),
                StreamItem::Done(r) => done = Some(r),
            }
        }

        let done = done.expect("stream should finish with Done");
        assert_eq!(chunks.len(), 6);
        assert_eq!(chunks.concat(), "AI is the study of agents");
        assert_eq!(done.content, "AI is the study of agents");
        assert_eq!(done.chunks, 6);
        assert_eq!(done.method, ExecutionMethod::Streaming);
        assert_eq!(agent.agent_history().len(), 2);
        assert_eq!(agent.stats().for_method(ExecutionMethod::Streaming), 1);
    }

    #[tokio::test]
    async fn test_stream_error_records_nothing() {
        let agent = agent_with(ScriptedBackend::breaking_stream("one two three", 1));

        let output = agent
            .execute_query("What is AI?", ExecutionMethod::Streaming, ExecutionLevel::AgentLevel, None)
            .await
            .unwrap();
        let err = output.into_response().await.unwrap_err();

        assert!(matches!(err, AgentError::Llm(LlmError::Backend(_))));
        assert!(agent.agent_history().is_empty());
        assert_eq!(agent.stats().total, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_sync_through_execute_query() {
        let agent = agent_with(ScriptedBackend::replying("sync answer"));

        let output = agent
            .execute_query("What is AI?", ExecutionMethod::RunSync, ExecutionLevel::GlobalLevel, None)
            .await
            .unwrap();
        assert!(!output.is_stream());
        let response = output.into_response().await.unwrap();
        assert_eq!(response.content, "sync answer");
        assert_eq!(response.method, ExecutionMethod::RunSync);
        assert_eq!(agent.stats().for_method(ExecutionMethod::RunSync), 1);
    }

    #[test]
    fn test_run_sync_without_runtime() {
        let agent = agent_with(ScriptedBackend::replying("blocking answer"));
        let response = agent
            .run_sync("What is AI?", ExecutionLevel::RunLevel, None)
            .unwrap();
        assert_eq!(response.content, "blocking answer");
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected_before_model_call() {
        let backend = ScriptedBackend::replying("unused");
        let agent = agent_with(backend.clone());

        let err = agent
            .execute_query("   ", ExecutionMethod::Run, ExecutionLevel::AgentLevel, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::EmptyQuery));
        assert!(backend.requests().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_backend_failure_propagates() {
        let agent = agent_with(ScriptedBackend::failing("quota exceeded"));

        for method in ExecutionMethod::iter() {
            let result = match agent
                .execute_query("What is AI?", method, ExecutionLevel::AgentLevel, None)
                .await
            {
                Ok(output) => output.into_response().await,
                Err(e) => Err(e),
            };
            let err = result.unwrap_err();
            assert!(err.to_string().contains("quota exceeded"), "{method}: {err}");
        }
        assert_eq!(agent.stats().total, 0);
        assert!(agent.agent_history().is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = GeminiAgent::with_backend(
            AgentConfig::new(""),
            ScriptedBackend::replying("x"),
            GlobalState::new(),
        );
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_clear_agent_state_keeps_global() {
        let agent = agent_with(ScriptedBackend::replying("x"));
        agent.update_agent_context("mood", "curious");
        agent.update_global_context("user_level", "advanced");
        agent.clear_agent_state();
        assert!(agent.agent_context().is_empty());
        assert_eq!(agent.global_context().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_agent_level_query_keeps_context_clean() {
        let agent = agent_with(ScriptedBackend::failing("quota exceeded"));
        let result = agent
            .run("Explain Python basics", ExecutionLevel::AgentLevel, params("difficulty", "beginner").as_ref())
            .await;
        assert!(result.is_err());
        assert!(agent.agent_context().is_empty());

        let agent = agent_with(ScriptedBackend::breaking_stream("one two three", 1));
        let output = agent
            .execute_query(
                "What is machine learning?",
                ExecutionMethod::Streaming,
                ExecutionLevel::AgentLevel,
                params("context", "educational"),
            )
            .await
            .unwrap();
        assert!(output.into_response().await.is_err());
        assert!(agent.agent_context().is_empty());
        assert!(agent.agent_history().is_empty());
    }

    #[tokio::test]
    async fn test_agent_level_params_reach_prompt_before_they_persist() {
        let backend = ScriptedBackend::replying("ok");
        let agent = agent_with(backend.clone());
        agent.update_agent_context("tone", "friendly");

        let output = agent
            .execute_query(
                "What is AI?",
                ExecutionMethod::Streaming,
                ExecutionLevel::AgentLevel,
                params("context", "educational"),
            )
            .await
            .unwrap();
        assert!(backend.last_system().contains("- context: educational\n- tone: friendly"));
        assert_eq!(agent.agent_context().len(), 1);

        output.into_response().await.unwrap();
        assert_eq!(agent.agent_context()["context"], json!("educational"));
    }

    #[tokio::test]
    async fn test_run_sync_inside_current_thread_task() {
        let agent = agent_with(ScriptedBackend::replying("nested answer"));
        let response = agent
            .run_sync("What is AI?", ExecutionLevel::RunLevel, None)
            .unwrap();
        assert_eq!(response.content, "nested answer");
        assert_eq!(response.method, ExecutionMethod::RunSync);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_sync_inside_multi_thread_task() {
        let agent = agent_with(ScriptedBackend::replying("in place"));
        let response = agent
            .run_sync("What is AI?", ExecutionLevel::AgentLevel, None)
            .unwrap();
        assert_eq!(response.content, "in place");
        assert_eq!(agent.agent_history().len(), 2);
    }

    /// Records each event's message and whether a `query` span encloses it.
    struct QuerySpanRecorder {
        events: Arc<Mutex<Vec<(String, bool)>>>,
    }

    struct MessageText(String);

    impl tracing::field::Visit for MessageText {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{:?}", value);
            }
        }
    }

    impl<S> tracing_subscriber::Layer<S> for QuerySpanRecorder
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let in_query = ctx
                .event_scope(event)
                .map(|scope| scope.from_root().any(|span| span.name() == "query"))
                .unwrap_or(false);
            let mut text = MessageText(String::new());
            event.record(&mut text);
            self.events.lock().unwrap().push((text.0, in_query));
        }
    }

    #[tokio::test]
    async fn test_stream_logs_inside_query_span() {
        use tracing_subscriber::layer::SubscriberExt;

        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(QuerySpanRecorder {
            events: events.clone(),
        });
        let _guard = tracing::subscriber::set_default(subscriber);

        let agent = agent_with(ScriptedBackend::replying("streamed fine"));
        agent
            .execute_query("What is AI?", ExecutionMethod::Streaming, ExecutionLevel::RunLevel, None)
            .await
            .unwrap()
            .into_response()
            .await
            .unwrap();

        let agent = agent_with(ScriptedBackend::breaking_stream("one two", 1));
        let _ = agent
            .execute_query("What is AI?", ExecutionMethod::Streaming, ExecutionLevel::RunLevel, None)
            .await
            .unwrap()
            .into_response()
            .await;

        let events = events.lock().unwrap().clone();
        let completed: Vec<_> = events.iter().filter(|(m, _)| m.contains("completed in")).collect();
        let failed: Vec<_> = events.iter().filter(|(m, _)| m.contains("Stream failed")).collect();
        assert_eq!(completed.len(), 1);
        assert_eq!(failed.len(), 1);
        assert!(completed[0].1, "completion logged outside the query span");
        assert!(failed[0].1, "stream failure logged outside the query span");
    }
}
