mod guide;
mod menu;

use crate::menu::Mode;
use gemini_agent_sdk_rs::llm::GEMINI_API_KEY_VAR;
use gemini_agent_sdk_rs::{AgentConfig, GeminiAgent};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    gemini_agent_sdk_rs::logger::init_logging();

    menu::print_menu();
    let mut stdin = BufReader::new(tokio::io::stdin());
    let choice = menu::read_choice(&mut stdin).await?;
    let mode = Mode::from_choice(&choice);

    let config = AgentConfig::from_env(mode.agent_name())?;
    if config.api_key.is_none() {
        tracing::warn!("{} is not set; model requests will fail", GEMINI_API_KEY_VAR);
    }
    tracing::info!("Using model {} for {}", config.model, config.name);
    let agent = GeminiAgent::new(config)?;

    match mode {
        Mode::UsageExamples => guide::usage_examples(&agent).await?,
        Mode::QuickTest => {
            let report = guide::quick_test(&agent, guide::QUICK_TEST_PAUSE).await;
            tracing::info!(
                "{}/{} combinations succeeded",
                report.successes(),
                report.attempts()
            );
            for failed in report.failures() {
                tracing::warn!(
                    "Test {}: {} + {} failed",
                    failed.index,
                    failed.level,
                    failed.method
                );
            }
        }
    }

    Ok(())
}
