use std::io::Write;

use converse_bridge::models::{
    BlockDelta, BlockStart, ContentBlock, ConverseRequest, InferenceConfiguration, Message,
    SystemContentBlock, StopReason, StreamEvent, TokenUsage,
};
use converse_bridge::utils::init_tracing;
use converse_bridge::{BridgeError, Config, Dispatcher};
use dotenvy::dotenv;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Args;

pub async fn run(args: Args) {
    let _ = dotenv();
    let config = load_config_or_exit(args.config.as_deref());
    init_tracing(&config.log_level);

    let dispatcher = build_dispatcher_or_exit(config);
    let request = build_request(&args);

    info!(
        phase = "cli_start",
        model_id = %request.model_id,
        stream = !args.no_stream,
        "Dispatching prompt"
    );

    let outcome = if args.no_stream {
        run_blocking(&dispatcher, &request).await
    } else {
        run_streaming(&dispatcher, &request).await
    };

    if let Err(error) = outcome {
        eprintln!("Request Error: {error}");
        std::process::exit(1);
    }
}

fn load_config_or_exit(path: Option<&str>) -> Config {
    let loaded = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    match loaded {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Configuration Error: {error}");
            std::process::exit(1);
        }
    }
}

fn build_dispatcher_or_exit(config: Config) -> Dispatcher {
    match Dispatcher::new(config) {
        Ok(dispatcher) => dispatcher,
        Err(error) => {
            eprintln!("Initialization Error: {error}");
            std::process::exit(1);
        }
    }
}

fn build_request(args: &Args) -> ConverseRequest {
    let inference_config = (args.max_tokens.is_some()
        || args.temperature.is_some()
        || args.top_p.is_some())
    .then(|| InferenceConfiguration {
        max_tokens: args.max_tokens,
        temperature: args.temperature,
        top_p: args.top_p,
    });

    ConverseRequest {
        model_id: args.model.clone(),
        messages: vec![Message::user_text(args.prompt.join(" "))],
        system: args
            .system
            .clone()
            .map(|text| vec![SystemContentBlock::Text(text)]),
        tool_config: None,
        inference_config,
    }
}

async fn run_blocking(dispatcher: &Dispatcher, request: &ConverseRequest) -> Result<(), BridgeError> {
    let response = dispatcher.converse(request).await?;

    let mut stdout = std::io::stdout().lock();
    for block in &response.output.message.content {
        match block {
            ContentBlock::Text(text) => {
                let _ = writeln!(stdout, "{text}");
            }
            ContentBlock::ToolUse(tool_use) => {
                let _ = writeln!(stdout, "[tool_use {}] {}", tool_use.name, tool_use.input);
            }
            ContentBlock::ToolResult(_) => {}
        }
    }
    drop(stdout);

    report_summary(response.stop_reason, response.usage);
    Ok(())
}

async fn run_streaming(dispatcher: &Dispatcher, request: &ConverseRequest) -> Result<(), BridgeError> {
    let cancellation = CancellationToken::new();
    let ctrl_c_token = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(phase = "cli_interrupt", "Interrupted; cancelling stream");
            ctrl_c_token.cancel();
        }
    });

    let mut events = dispatcher
        .converse_stream_with_cancellation(request, cancellation)
        .await?;

    let mut stop_reason = None;
    let mut usage = TokenUsage::default();

    while let Some(event) = events.next().await {
        match event? {
            StreamEvent::ContentBlockDelta {
                delta: BlockDelta::Text(text),
                ..
            } => {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(text.as_bytes());
                let _ = stdout.flush();
            }
            StreamEvent::ContentBlockDelta {
                delta: BlockDelta::ToolUse { input },
                index,
            } => eprintln!("[tool input #{index}] {input}"),
            StreamEvent::ContentBlockStart { index, start } => {
                if let BlockStart::ToolUse { tool_use_id, name } = start {
                    eprintln!("[tool_use #{index}] {name} ({tool_use_id})");
                }
            }
            StreamEvent::MessageStop { stop_reason: reason } => stop_reason = Some(reason),
            StreamEvent::Metadata { usage: reported } => usage = reported,
            StreamEvent::MessageStart { .. } | StreamEvent::ContentBlockStop { .. } => {}
        }
    }
    println!();

    report_summary(stop_reason.unwrap_or(StopReason::EndTurn), usage);
    Ok(())
}

fn report_summary(stop_reason: StopReason, usage: TokenUsage) {
    eprintln!(
        "stop_reason={} input_tokens={} output_tokens={} total_tokens={}",
        stop_reason.as_str(),
        usage.input_tokens,
        usage.output_tokens,
        usage.total_tokens
    );
}
