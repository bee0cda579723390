use clap::Parser;
use local_llm_server::client::DEFAULT_BASE_URL;
use local_llm_server::utils::logger;
use local_llm_server::{LlmClient, PromptMode};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "llm-query")]
#[command(about = "Send one message to a running llm-server")]
struct Args {
    /// Message to send
    message: String,

    /// Server base URL
    #[arg(short, long, default_value = DEFAULT_BASE_URL, env = "LLM_SERVER_URL")]
    url: String,

    /// Prompt template: chat, movies or plain
    #[arg(short, long, default_value = "chat")]
    mode: String,

    /// Send the message verbatim and print the raw server text
    #[arg(long)]
    raw: bool,

    /// Request timeout in seconds
    #[arg(long, default_value = "5")]
    timeout: u64,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose, None);

    let client = LlmClient::with_timeout(&args.url, Duration::from_secs(args.timeout))?;
    tracing::debug!("Using endpoint {}", client.endpoint());

    if args.raw {
        let response = client.query(&args.message).await?;
        println!("{}", response.text);
        return Ok(());
    }

    let mode: PromptMode = args.mode.parse()?;
    let reply = client.ask(&args.message, mode).await;
    println!("{}", reply);
    Ok(())
}
