use futures::StreamExt;
use gemini_agent_sdk_rs::execution::combinations;
use gemini_agent_sdk_rs::{
    AgentError, ExecutionLevel, ExecutionMethod, GeminiAgent, QueryOutput, QueryParams,
};
use serde_json::json;
use std::time::Duration;

pub const QUICK_TEST_QUERY: &str = "What is AI?";
pub const QUICK_TEST_PAUSE: Duration = Duration::from_millis(500);

fn params(key: &str, value: &str) -> Option<QueryParams> {
    let mut p = QueryParams::new();
    p.insert(key.to_string(), json!(value));
    Some(p)
}

/// Walks through one example per execution method. Stops at the first failure.
pub async fn usage_examples(agent: &GeminiAgent) -> Result<(), AgentError> {
    println!("🎯 USAGE EXAMPLES");
    println!("{}", "=".repeat(50));

    println!("\n1️⃣ Agent Level + Async Run:");
    agent
        .execute_query(
            "What is machine learning?",
            ExecutionMethod::Run,
            ExecutionLevel::AgentLevel,
            params("context", "educational"),
        )
        .await?
        .into_response()
        .await?;

    println!("\n2️⃣ Run Level + Sync Run:");
    agent
        .execute_query(
            "Explain Python basics",
            ExecutionMethod::RunSync,
            ExecutionLevel::RunLevel,
            params("difficulty", "beginner"),
        )
        .await?
        .into_response()
        .await?;

    println!("\n3️⃣ Global Level + Streaming:");
    agent.update_global_context("user_level", "advanced");
    agent.update_global_context("preferred_style", "detailed");

    let output = agent
        .execute_query(
            "How does neural network work?",
            ExecutionMethod::Streaming,
            ExecutionLevel::GlobalLevel,
            params("topic", "deep_learning"),
        )
        .await?;
    // The agent echoes chunks itself; we only drain.
    if let QueryOutput::Stream(mut stream) = output {
        while let Some(item) = stream.next().await {
            item?;
        }
    }

    println!("\n✅ Usage examples completed!");
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CombinationOutcome {
    /// 1-based position in the run.
    pub index: usize,
    pub level: ExecutionLevel,
    pub method: ExecutionMethod,
    pub error: Option<String>,
}

impl CombinationOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuickTestReport {
    pub outcomes: Vec<CombinationOutcome>,
}

impl QuickTestReport {
    pub fn attempts(&self) -> usize {
        self.outcomes.len()
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failures(&self) -> Vec<&CombinationOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded()).collect()
    }
}

async fn attempt(
    agent: &GeminiAgent,
    level: ExecutionLevel,
    method: ExecutionMethod,
) -> Result<(), AgentError> {
    let output = agent
        .execute_query(QUICK_TEST_QUERY, method, level, None)
        .await?;
    output.into_response().await?;
    Ok(())
}

/// Tries every level × method combination in turn, pausing `pause` after each.
/// A failed combination is reported and the run moves on.
pub async fn quick_test(agent: &GeminiAgent, pause: Duration) -> QuickTestReport {
    println!("🚀 QUICK TEST - All Combinations");
    println!("{}", "=".repeat(40));

    let total = combinations().count();
    let mut report = QuickTestReport::default();

    for (i, (level, method)) in combinations().enumerate() {
        let index = i + 1;
        println!("\n🔄 Test {}/{}: {} + {}", index, total, level, method);

        let error = match attempt(agent, level, method).await {
            Ok(()) => {
                println!("✅ Success");
                None
            }
            Err(e) => {
                tracing::warn!("Combination {} + {} failed: {}", level, method, e);
                println!("❌ Error: {}", e);
                Some(e.to_string())
            }
        };
        report.outcomes.push(CombinationOutcome {
            index,
            level,
            method,
            error,
        });

        tokio::time::sleep(pause).await;
    }

    println!("\n🎉 Quick test completed!");
    report
}
