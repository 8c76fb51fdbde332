use std::sync::Arc;

use anyhow::{Context, Result};
use botwall::config::VerificationConfig;
use botwall::external::{InMemoryVerifiedPlayers, LogNotificationSink, StaticRegistry};
use botwall::fallback::Fallback;
use botwall::messages::parse_messages_file;
use botwall::verification::VerificationContext;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut conf_file = "conf/botwall.yaml".to_string();
    let mut messages_file = "conf/messages.yaml".to_string();
    let mut registry_dir: Option<String> = None;

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "--h" | "--?" | "/?" => {
                println!("Usage: botwall [--conf FILE] [--messages FILE] [--registry DIR]");
                return Ok(());
            }
            "--conf" => {
                if i + 1 < args.len() {
                    i += 1;
                    conf_file = args[i].clone();
                } else {
                    eprintln!("Error: --conf requires a FILE argument");
                    return Ok(());
                }
            }
            "--messages" => {
                if i + 1 < args.len() {
                    i += 1;
                    messages_file = args[i].clone();
                } else {
                    eprintln!("Error: --messages requires a FILE argument");
                    return Ok(());
                }
            }
            "--registry" => {
                if i + 1 < args.len() {
                    i += 1;
                    registry_dir = Some(args[i].clone());
                } else {
                    eprintln!("Error: --registry requires a DIR argument");
                    return Ok(());
                }
            }
            _ => {}
        }
        i += 1;
    }

    let config = VerificationConfig::from_file(&conf_file)
        .with_context(|| format!("Cannot load config: {}", conf_file))?;

    // A missing catalogue falls back to the built-in texts
    let messages_content = std::fs::read_to_string(&messages_file).unwrap_or_default();
    let messages = parse_messages_file(&messages_content)?;

    let bind = config.bind.clone();
    let mut ctx = VerificationContext::new(config, messages)?;
    if let Some(dir) = &registry_dir {
        let registry = StaticRegistry::load_dir(dir)
            .with_context(|| format!("Cannot load registry: {}", dir))?;
        ctx = ctx.with_registry(Arc::new(registry));
    }

    let fallback = Arc::new(Fallback::new(
        Arc::new(ctx),
        Arc::new(InMemoryVerifiedPlayers::new()),
        Arc::new(LogNotificationSink),
    )?);

    tracing::info!("[botwall] [started] version={}", env!("CARGO_PKG_VERSION"));
    fallback.run(&bind).await?;
    Ok(())
}
