//! callbridge - run file-system operations through the foreign callback bridge
//!
//! The binary acts as the foreign side: it creates a native foreign context,
//! passes a native callable as the handler and prints whatever the handler
//! receives.

use anyhow::{Context, Result};
use callbridge::cli::Args;
use callbridge::foreign::{BridgeContext, ForeignContext, NativeFunction, Value};
use callbridge::{BridgeStats, Executor, FileSystem};
use clap::Parser;
use futures::channel::oneshot;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[compio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;

    tracing_subscriber::fmt()
        .with_max_level(args.output.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    info!("callbridge {}", callbridge::VERSION);

    let foreign = ForeignContext::new("cli");
    let stats = Arc::new(BridgeStats::new());
    let context = BridgeContext::new(&foreign, Arc::clone(&stats));
    let executor = Executor::new(&args.executor.to_options())?;
    let fs = FileSystem::new(&context, executor);

    let value = if args.executor.sync {
        args.command.run_sync(&fs)?
    } else {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let handler = NativeFunction::value("cli-result", move |received| {
            let sent = tx
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .take();
            if let Some(sender) = sent {
                // The receiver only goes away if main already bailed
                let _ = sender.send(received.first().cloned().unwrap_or(Value::Null));
            }
            Ok(Value::Null)
        });
        args.command.submit(&fs, &handler)?;
        rx.await.context("operation finished without delivering a result")?
    };

    debug!("bridge stats: {:?}", stats.snapshot());

    if let Value::Error { kind, message } = &value {
        anyhow::bail!("{kind}: {message}");
    }
    print_value(&value)?;
    Ok(())
}

fn print_value(value: &Value) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match value {
        Value::Null => {}
        Value::Bytes(bytes) => out.write_all(bytes)?,
        Value::List(items) => {
            for item in items {
                writeln!(out, "{item}")?;
            }
        }
        Value::Map(map) => {
            for (key, item) in map {
                writeln!(out, "{key}: {item}")?;
            }
        }
        other => writeln!(out, "{other}")?,
    }
    out.flush()?;
    Ok(())
}
