use anyhow::Context;
use gsat::{
    available_ports, control_channel, event_channel, init_logging, CommandSender, SerialEvent,
    SerialWorker, WorkerConfig,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Forward stdin lines to the worker; EOF asks it to exit
fn forward_stdin(commands: CommandSender) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("Failed to read stdin: {}", e);
                        break;
                    }
                };
                if commands.transmit(format!("{}\n", line)).is_err() {
                    return;
                }
            }
            if commands.exit().is_err() {
                tracing::debug!("Serial worker already gone at stdin EOF");
            }
        })?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    init_logging()?;
    tracing::info!(
        "gsat {} (built {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_DATE")
    );

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => WorkerConfig::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => WorkerConfig::default(),
    };

    if config.connection.port.is_none() {
        match available_ports() {
            Ok(ports) if !ports.is_empty() => {
                for port in ports {
                    tracing::info!("Available port: {} ({})", port.port_name, port.description);
                }
            }
            Ok(_) => tracing::warn!("No serial ports detected"),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    let (commands, command_rx) = control_channel();
    let (event_tx, mut events) = event_channel();
    let worker = SerialWorker::system(config, command_rx, event_tx)
        .spawn()
        .context("Failed to start serial worker")?;

    forward_stdin(commands.clone()).context("Failed to start stdin reader")?;

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SerialEvent::LineReceived(line)) => {
                    stdout.write_all(line.as_bytes())?;
                    stdout.flush()?;
                }
                Some(event) => {
                    eprintln!("** {}", event);
                    if event.is_terminal() {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, closing serial port");
                if commands.exit().is_err() {
                    break;
                }
            }
        }
    }

    worker
        .join()
        .map_err(|_| anyhow::anyhow!("Serial worker thread panicked"))?;
    Ok(())
}
