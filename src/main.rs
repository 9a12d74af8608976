mod core;
mod i18n;
mod plugins;

use crate::core::accept::AcceptPolicy;
use crate::core::delivery::DirSink;
use crate::core::error::WorkflowError;
use crate::core::events::{NoticeLevel, WorkflowEvent};
use crate::core::model::{BatchState, InputFile, ItemStatus};
use crate::core::workflow::BatchWorkflow;
use crate::i18n::{get_messages, Locale, Messages};
use crate::plugins::registry::{ToolCliConfig, ToolOp, ToolRegistry};
use clap::{Arg, ArgAction, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

fn tool_command(registry: &ToolRegistry, name: &'static str, about: &'static str) -> Command {
    let cmd = Command::new(name)
        .about(about)
        .arg(
            Arg::new("inputs")
                .help("Files to convert, processed in the order given")
                .action(ArgAction::Append)
                .num_args(1..)
                .required(true),
        )
        .arg(
            Arg::new("out_dir")
                .long("out-dir")
                .help("Output directory")
                .default_value("./converted")
                .num_args(1),
        )
        .arg(
            Arg::new("delay_ms")
                .long("delay-ms")
                .help("Pause between saving consecutive results")
                .default_value("300")
                .num_args(1),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .help("Drop the input at this 1-based position from the queue (repeatable)")
                .action(ArgAction::Append)
                .value_parser(clap::value_parser!(u64).range(1..))
                .num_args(1),
        )
        .arg(
            Arg::new("locale")
                .long("locale")
                .help("UI language: en or zh")
                .default_value("en")
                .num_args(1),
        );

    registry.augment_tool_command(name, cmd)
}

fn build_cli(registry: &ToolRegistry) -> Command {
    registry.tools().fold(
        Command::new("fileforge")
            .about("Batch file conversion for images, PDFs, audio and video")
            .subcommand_required(true)
            .arg_required_else_help(true),
        |app, tool| app.subcommand(tool_command(registry, tool.name(), tool.about())),
    )
}

async fn load_inputs(m: &ArgMatches, accept: &AcceptPolicy, msgs: &Messages) -> Vec<InputFile> {
    let mut inputs = vec![];
    for raw in m.get_many::<String>("inputs").into_iter().flatten() {
        match InputFile::load_checked(&PathBuf::from(raw), accept).await {
            Ok(f) => inputs.push(f),
            Err(e) if e.downcast_ref::<WorkflowError>().is_some() => {
                warn!(path = %raw, "rejected before reading: {:#}", e);
                eprintln!("[{}] {}", msgs.warn_prefix, e);
            }
            Err(e) => {
                warn!(path = %raw, "cannot read input: {:#}", e);
                eprintln!("[{}] {}: {} ({:#})", msgs.warn_prefix, msgs.skipped_input, raw, e);
            }
        }
    }
    inputs
}

/// Removes the given 1-based queue positions. Positions refer to the queue as it was before
/// any removal; out-of-range ones are reported and skipped.
fn exclude_positions(wf: &mut BatchWorkflow, positions: &[u64]) -> Vec<WorkflowError> {
    let mut indices: Vec<usize> = positions.iter().map(|p| p.saturating_sub(1) as usize).collect();
    indices.sort_unstable();
    indices.dedup();

    let mut errors = vec![];
    for index in indices.into_iter().rev() {
        if let Err(e) = wf.remove(index) {
            errors.push(e);
        }
    }
    errors
}

fn status_label(status: &ItemStatus, msgs: &Messages) -> String {
    match status {
        ItemStatus::Waiting => msgs.status_waiting.to_string(),
        ItemStatus::Processing => msgs.status_processing.to_string(),
        ItemStatus::Done { size_bytes, saved_percent: Some(p) } => {
            format!("{} {} ({} {}%)", msgs.status_done, fmt_bytes(*size_bytes), msgs.saved, p)
        }
        ItemStatus::Done { size_bytes, saved_percent: None } => {
            format!("{} {}", msgs.status_done, fmt_bytes(*size_bytes))
        }
        ItemStatus::Failed { reason } => format!("{}: {}", msgs.status_failed, reason),
    }
}

/// Renders workflow events until the workflow is dropped.
async fn render_events(mut rx: broadcast::Receiver<WorkflowEvent>, msgs: &'static Messages) {
    let mp = MultiProgress::new();
    let sty = ProgressStyle::with_template("{spinner:.green} {prefix} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("|/-\\ ");

    let mut bars: HashMap<Uuid, ProgressBar> = HashMap::new();

    loop {
        let evt = match rx.recv().await {
            Ok(e) => e,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match evt {
            WorkflowEvent::BatchStateChanged { batch_id, state } => {
                let label = match state {
                    BatchState::Running => msgs.batch_started,
                    BatchState::Idle => msgs.batch_finished,
                };
                let line = match batch_id {
                    Some(id) => format!("{} ({})", label, id),
                    None => label.to_string(),
                };
                let _ = mp.println(line);
            }
            WorkflowEvent::ItemAdded { item_id, index, name, size } => {
                let pb = mp.add(ProgressBar::new_spinner());
                pb.set_style(sty.clone());
                pb.set_prefix(format!("#{} [{}]", index + 1, name));
                pb.set_message(format!("{} ({})", msgs.item_added, fmt_bytes(size)));
                bars.insert(item_id, pb);
            }
            WorkflowEvent::ItemRemoved { item_id, index } => {
                debug!(index, "item removed");
                if let Some(pb) = bars.remove(&item_id) {
                    pb.finish_with_message(msgs.item_removed.to_string());
                }
            }
            WorkflowEvent::Cleared => bars.clear(),
            WorkflowEvent::ItemStatusChanged { item_id, index, status } => {
                debug!(index, ?status, "item status");
                let Some(pb) = bars.get(&item_id) else { continue };
                let label = status_label(&status, msgs);
                match status {
                    ItemStatus::Processing => {
                        pb.enable_steady_tick(Duration::from_millis(120));
                        pb.set_message(label);
                    }
                    ItemStatus::Done { .. } | ItemStatus::Failed { .. } => pb.finish_with_message(label),
                    ItemStatus::Waiting => pb.set_message(label),
                }
            }
            WorkflowEvent::Delivered { name, path } => {
                let _ = mp.println(format!("{} {} {}", name, msgs.delivered, path.display()));
            }
            WorkflowEvent::Notice { level, message } => {
                let prefix = match level {
                    NoticeLevel::Info => msgs.info_prefix,
                    NoticeLevel::Warn => msgs.warn_prefix,
                    NoticeLevel::Error => msgs.error_prefix,
                };
                let _ = mp.println(format!("[{}] {}", prefix, message));
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fileforge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let registry = ToolRegistry::with_defaults();
    let matches = build_cli(&registry).get_matches();

    let Some((tool_name, m)) = matches.subcommand() else {
        return Ok(());
    };
    let Some(tool) = registry.tool(tool_name) else {
        anyhow::bail!("unknown tool: {}", tool_name);
    };

    let locale = m.get_one::<String>("locale").map(|s| Locale::parse(s)).unwrap_or_default();
    let msgs = get_messages(locale);
    let out_dir: PathBuf = m
        .get_one::<String>("out_dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./converted"));

    let mut cfg = ToolCliConfig::default();
    if let Some(ms) = m.get_one::<String>("delay_ms") {
        cfg.limits.delivery_delay = Duration::from_millis(ms.parse()?);
    }
    registry.apply_tool_matches(tool_name, m, &mut cfg)?;

    let accept = tool.accept(&cfg);
    let inputs = load_inputs(m, &accept, msgs).await;

    let mut wf = BatchWorkflow::new(accept, cfg.limits.clone());
    let ui_task = tokio::spawn(render_events(wf.subscribe(), msgs));

    wf.enqueue(inputs);
    let excluded: Vec<u64> = m.get_many::<u64>("exclude").into_iter().flatten().copied().collect();
    for e in exclude_positions(&mut wf, &excluded) {
        warn!("--exclude: {}", e);
    }

    let outcome = if wf.is_empty() {
        Ok(None)
    } else {
        info!(tool = tool_name, items = wf.len(), "running");
        let run = match tool.operation(&cfg) {
            ToolOp::Each(t) => wf.run_all(&cfg.config, t.as_ref()).await,
            ToolOp::Combine(c) => wf.run_combined(&cfg.config, c.as_ref()).await,
        };
        info!(state = ?wf.state(), results = wf.results().len(), "conversion finished");
        match run {
            Ok(summary) => {
                let sink = DirSink::new(out_dir.clone());
                wf.download_all(&sink).await.map(|paths| Some((summary, paths.len())))
            }
            Err(e) => Err(e.into()),
        }
    };

    let rows: Vec<String> = wf
        .files()
        .iter()
        .zip(wf.statuses())
        .enumerate()
        .map(|(i, (f, s))| {
            let outputs: Vec<&str> = wf
                .results()
                .iter()
                .filter(|r| r.source_index == i)
                .map(|r| r.name.as_str())
                .collect();
            if outputs.is_empty() {
                format!("- {} {}", f.name, status_label(s, msgs))
            } else {
                format!("- {} {} -> {}", f.name, status_label(s, msgs), outputs.join(", "))
            }
        })
        .collect();

    // Results are on disk by now; release the buffers before waiting on the renderer.
    wf.clear();
    drop(wf);
    let _ = ui_task.await;

    match outcome? {
        None => println!("{}", msgs.nothing_to_do),
        Some((summary, saved)) => {
            println!();
            println!("{}:", msgs.summary_header);
            for row in rows {
                println!("{}", row);
            }
            println!(
                "{} {}, {} {}, {} -> {}",
                summary.done,
                msgs.status_done,
                summary.failed,
                msgs.status_failed,
                saved,
                out_dir.display()
            );
        }
    }

    Ok(())
}

fn fmt_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    let f = n as f64;
    if f >= GB {
        format!("{:.2}GiB", f / GB)
    } else if f >= MB {
        format!("{:.2}MiB", f / MB)
    } else if f >= KB {
        format!("{:.2}KiB", f / KB)
    } else {
        format!("{}B", n)
    }
}
