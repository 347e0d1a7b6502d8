use futures::StreamExt;
use gemini_agent_sdk_rs::{
    AgentConfig, ExecutionLevel, ExecutionMethod, GeminiAgent, QueryOutput, QueryParams,
    StreamItem,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv::dotenv().ok();
    gemini_agent_sdk_rs::logger::init_logging();

    if std::env::var("GEMINI_API_KEY").is_err() {
        println!("GEMINI_API_KEY not set. Please set it to run this example.");
        return Ok(());
    }

    // 1. Configure the agent; echo is off so this example prints chunks itself.
    let config = AgentConfig::from_env("DemoAgent")?
        .with_system_instruction("You are a concise tutor. Answer in at most three sentences.")
        .with_echo_output(false);
    let agent = GeminiAgent::new(config)?;

    // 2. Agent level remembers the exchange, so the follow-up can refer to it.
    let mut params = QueryParams::new();
    params.insert("audience".to_string(), "beginner".into());
    let first = agent
        .run("What is a closure in Rust?", ExecutionLevel::AgentLevel, Some(&params))
        .await?;
    println!("\nAgent: {}\n", first.content);

    // 3. Stream the follow-up.
    let output = agent
        .execute_query(
            "Show me a one-line example of it.",
            ExecutionMethod::Streaming,
            ExecutionLevel::AgentLevel,
            None,
        )
        .await?;

    if let QueryOutput::Stream(mut stream) = output {
        while let Some(item) = stream.next().await {
            match item? {
                StreamItem::Chunk(text) => print!("{}", text),
                StreamItem::Done(response) => {
                    println!("\n\n[{} chunks in {}ms]", response.chunks, response.elapsed_ms)
                }
            }
        }
    }

    let stats = agent.stats();
    println!("Queries executed: {}", stats.total);
    println!("Agent history: {} messages", agent.agent_history().len());

    Ok(())
}
