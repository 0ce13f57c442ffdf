use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use voxdaw::outputs::speech::{CommandSpeech, LoggingSpeech, SpeechSink};
use voxdaw::services::executor::LoggingExecutor;
use voxdaw::{PipelineConfig, PipelineRuntime};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::load(&path).with_context(|| format!("loading config from {}", path))?,
        None => PipelineConfig::default(),
    };

    let speech: Arc<dyn SpeechSink> = match config.speech_command.as_deref().and_then(CommandSpeech::new) {
        Some(sink) => Arc::new(sink),
        None => Arc::new(LoggingSpeech),
    };

    let (handle, task) = PipelineRuntime::spawn(config, Arc::new(LoggingExecutor), speech);
    tracing::info!("Type a command (\"mute track 3\", \"go to bar 12\"). Ctrl+D to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => continue,
                    ":metrics" => {
                        let metrics = handle.metrics().await?;
                        println!("{}", serde_json::to_string_pretty(&metrics)?);
                    }
                    ":log" => {
                        for entry in handle.log().await? {
                            println!("{}", serde_json::to_string(&entry)?);
                        }
                    }
                    ":state" => println!("{}", handle.state().await?),
                    ":cancel" => handle.cancel().await?,
                    text => handle.typed(text).await?,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown().await?;
    task.await?;
    Ok(())
}
