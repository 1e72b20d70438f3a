use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use remote_task_query::core::engine::load_input_selectors;
use remote_task_query::core::model::TaskRecord;
use remote_task_query::plugins::registry::QueryCliConfig;
use remote_task_query::{HttpTaskService, ProcessorRegistry, QueryEngine};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn selector_command(name: &'static str, about: &'static str, registry: &ProcessorRegistry) -> Command {
    let cmd = Command::new(name).about(about).arg(
        Arg::new("selectors")
            .help("Task ids, ranges (1-5), sub-files (42/[0-2,.srt]), dates, hashes, magnets, torrents, URLs or names")
            .action(ArgAction::Append)
            .num_args(0..),
    );
    registry.augment_command(cmd)
}

fn build_cli(registry: &ProcessorRegistry) -> Command {
    Command::new("rtq")
        .about("Resolve selectors against a remote download-task service")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(selector_command("search", "List matching tasks without creating anything", registry))
        .subcommand(selector_command("resolve", "Create missing tasks, then list the resolved tasks", registry))
        .subcommand(selector_command("files", "Resolve, then list the ready files of each BT task", registry))
}

async fn load_config(registry: &ProcessorRegistry, m: &ArgMatches) -> anyhow::Result<QueryCliConfig> {
    let mut cfg = QueryCliConfig::default();
    registry.apply_matches(m, &mut cfg)?;
    cfg.args.selectors = m
        .get_many::<String>("selectors")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    load_input_selectors(&mut cfg.args, cfg.input.as_deref())
        .await
        .context("load selector file")?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("remote_task_query=info,rtq=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let registry = ProcessorRegistry::with_defaults();
    let matches = build_cli(&registry).get_matches();
    let Some((sub, m)) = matches.subcommand() else {
        return Ok(());
    };

    let cfg = load_config(&registry, m).await?;
    let service = HttpTaskService::new(cfg.service.clone()).context("create task service client")?;
    let engine = QueryEngine::new(registry, Arc::new(service));

    match sub {
        "search" => {
            let outcome = engine.search_tasks(&cfg.args).await?;
            for t in &outcome.tasks {
                print_task(t);
            }
        }
        "resolve" => {
            let outcome = engine.find_tasks_to_download(&cfg.args).await?;
            for t in &outcome.tasks {
                print_task(t);
            }
        }
        "files" => {
            let mut outcome = engine.find_tasks_to_download(&cfg.args).await?;
            let tasks = std::mem::take(&mut outcome.tasks);
            for t in &tasks {
                print_task(t);
                if !t.is_bt() {
                    continue;
                }
                let expansion = outcome
                    .expand(t)
                    .await
                    .with_context(|| format!("expand bt task {}", t.id))?;
                if expansion.single_file {
                    continue;
                }
                for f in &expansion.files {
                    println!("    [{}] {} {} {}", f.index, fmt_bytes(f.size), f.status_text, f.name);
                }
                for f in &expansion.not_ready {
                    tracing::warn!(task = %t.id, file = f.index, status = %f.status_text, "skipping {}", f.name);
                }
            }
        }
        _ => {}
    }

    Ok(())
}

fn print_task(t: &TaskRecord) {
    let files = match (&t.files, t.index) {
        (Some(f), _) => format!(" files={:?}", f),
        (None, Some(i)) => format!(" file={}", i),
        _ => String::new(),
    };
    println!(
        "#{} id={} {} {} {} {}{}",
        t.ordinal,
        t.id,
        t.task_type,
        t.status_text,
        fmt_bytes(t.size),
        t.name,
        files,
    );
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
