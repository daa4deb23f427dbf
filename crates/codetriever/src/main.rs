//! CLI entry point over the [`codetriever::Engine`] facade.

use clap::{Parser, Subcommand};
use codetriever::engine::QueryOptions;
use codetriever::Engine;
use codetriever_config::EngineConfig;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// codetriever: a local code-aware index and query engine.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log directory path (defaults to OS-specific location).
    #[arg(long)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a directory as a project and start indexing it.
    AddProject { name: String, path: String },
    /// Unregister a project. Its data directory is left on disk.
    RemoveProject { name: String },
    /// Wipe a project's data directory and re-index it from scratch.
    ReinitProject { name: String },
    /// List registered projects.
    ListProjects,
    /// Force a full reindex of a project, bypassing the hash cache.
    Reindex { name: String },
    /// Run a query against a project.
    Query {
        project: String,
        query: String,
        #[arg(long, default_value_t = 10)]
        k: usize,
        #[arg(long)]
        graph_context: bool,
    },
    /// Liveness snapshot for one project, or every project if omitted.
    Status { project: Option<String> },
}

type BoxError = Box<dyn std::error::Error>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let log_dir = args.log_dir.map_or_else(get_default_log_dir, std::path::PathBuf::from);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "codetriever.log");
    let (file_writer, _file_guard): (NonBlocking, WorkerGuard) = tracing_appender::non_blocking(file_appender);
    let (stderr_writer, _stderr_guard): (NonBlocking, WorkerGuard) =
        tracing_appender::non_blocking(std::io::stderr());
    let multi_writer = file_writer.and(stderr_writer);

    tracing_subscriber::fmt()
        .json()
        .with_writer(multi_writer)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let engine = Engine::new(EngineConfig::from_env())?;

    match args.command {
        Command::AddProject { name, path } => {
            engine.add_project(name, path).await?;
        }
        Command::RemoveProject { name } => {
            engine.remove_project(&name).await?;
        }
        Command::ReinitProject { name } => {
            engine.reinitialize_project(&name).await?;
        }
        Command::ListProjects => {
            for project in engine.list_projects().await {
                println!("{}\t{}", project.name, project.root_path.display());
            }
        }
        Command::Reindex { name } => {
            let enqueued = engine.trigger_reindex(&name).await?;
            println!("enqueued {enqueued} files");
        }
        Command::Query { project, query, k, graph_context } => {
            let options = QueryOptions { include_graph_context: graph_context, ..QueryOptions::default() };
            let response = engine.query(&project, query, k, options).await?;
            for hit in &response.results {
                println!("{}:{}-{}\t{:.4}", hit.relative_path, hit.start_line, hit.end_line, hit.score);
            }
            println!("---\n{}", response.context);
        }
        Command::Status { project } => {
            for status in engine.indexer_status(project.as_deref()).await? {
                println!(
                    "{}\tqueued={} in_flight={} transient_errors={} permanent_errors={} last_commit={:?}",
                    status.project,
                    status.queued,
                    status.in_flight,
                    status.transient_errors,
                    status.permanent_errors,
                    status.last_commit_unix_secs,
                );
            }
        }
    }

    Ok(())
}

/// Get the default log directory based on the operating system.
fn get_default_log_dir() -> std::path::PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(local_app_data) = std::env::var_os("LOCALAPPDATA") {
            std::path::PathBuf::from(local_app_data).join("codetriever").join("logs")
        } else {
            std::path::PathBuf::from("logs")
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = dirs::home_dir() {
            home.join("Library").join("Logs").join("codetriever")
        } else {
            std::path::PathBuf::from("logs")
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let system_log_dir = std::path::Path::new("/var/log/codetriever");
        if system_log_dir.exists() && is_writable(system_log_dir) {
            system_log_dir.to_path_buf()
        } else if let Some(data_dir) = dirs::data_dir() {
            data_dir.join("codetriever").join("logs")
        } else if let Some(home) = dirs::home_dir() {
            home.join(".codetriever").join("logs")
        } else {
            std::path::PathBuf::from("logs")
        }
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn is_writable(path: &std::path::Path) -> bool {
    if let Ok(temp_file) = tempfile::tempfile_in(path) {
        drop(temp_file);
        true
    } else {
        false
    }
}
