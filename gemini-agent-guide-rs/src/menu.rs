use tokio::io::{AsyncBufRead, AsyncBufReadExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    UsageExamples,
    QuickTest,
}

impl Mode {
    /// `"1"` selects the usage examples; anything else, including nothing, the quick test.
    pub fn from_choice(input: &str) -> Self {
        match input.trim() {
            "1" => Mode::UsageExamples,
            _ => Mode::QuickTest,
        }
    }

    pub fn agent_name(&self) -> &'static str {
        match self {
            Mode::UsageExamples => "ExampleAgent",
            Mode::QuickTest => "QuickTestAgent",
        }
    }
}

pub fn print_menu() {
    println!("Choose test mode:");
    println!("1. Usage Examples");
    println!("2. Quick Test");
}

/// Prompts for and reads one line. EOF yields an empty choice.
pub async fn read_choice<R>(reader: &mut R) -> std::io::Result<String>
where
    R: AsyncBufRead + Unpin,
{
    print!("Enter choice (1 or 2): ");
    std::io::Write::flush(&mut std::io::stdout())?;

    let mut line = String::new();
    reader.read_line(&mut line).await?;
    Ok(line.trim().to_string())
}
