use clap::Parser;
use local_llm_server::core::ConfigProvider;
use local_llm_server::utils::error::ErrorSeverity;
use local_llm_server::utils::monitor::SystemMonitor;
use local_llm_server::utils::{logger, validation::Validate};
use local_llm_server::{
    serve, AppState, CandleGenerator, CliConfig, ServerError, ServerSettings, TextGenerator,
};
use std::sync::Arc;

fn exit_with(e: &ServerError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 先解析設定，日誌格式取決於設定內容
    let settings: ServerSettings = match cli.resolve() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if settings.json_logs {
        logger::init_json_logger(cli.verbose, settings.log_level.as_deref());
    } else {
        logger::init_cli_logger(cli.verbose, settings.log_level.as_deref());
    }

    tracing::info!("🚀 Starting local LLM server");
    tracing::debug!("Resolved settings: {:?}", settings);

    if let Err(e) = settings.validate() {
        exit_with(&e);
    }

    let monitor = SystemMonitor::new(settings.monitor);
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    // 模型載入是同步且耗時的工作
    let load_settings = settings.clone();
    let generator = tokio::task::spawn_blocking(move || {
        CandleGenerator::load(&load_settings)
    })
    .await?;
    let generator = match generator {
        Ok(generator) => generator,
        Err(e) => exit_with(&e),
    };
    tracing::info!(
        "⚙️ Sampling on {}: {:?}",
        generator.device_name(),
        generator.params()
    );
    monitor.log_stats("After model load");

    let bind_address = settings.bind_address();
    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => exit_with(&ServerError::IoError(e)),
    };

    let state = AppState::new(Arc::new(generator)).with_monitor(monitor);
    if let Err(e) = serve(listener, state).await {
        exit_with(&e);
    }

    Ok(())
}
