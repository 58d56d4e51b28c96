mod app;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send a Converse-style prompt to an OpenAI-compatible endpoint", long_about = None)]
pub(crate) struct Args {
    /// Model identifier forwarded upstream
    #[arg(long, default_value = "gpt-4o-mini")]
    pub model: String,

    /// System prompt
    #[arg(long)]
    pub system: Option<String>,

    /// Wait for the complete response instead of streaming
    #[arg(long, default_value_t = false)]
    pub no_stream: bool,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub top_p: Option<f64>,

    /// Path to an optional TOML config file (defaults to ./config.toml)
    #[arg(long)]
    pub config: Option<String>,

    #[arg(required = true, num_args = 1..)]
    pub prompt: Vec<String>,
}

#[tokio::main]
async fn main() {
    app::run(Args::parse()).await;
}
