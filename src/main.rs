//! waypoint CLI - checkpoint a project directory from the command line

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use waypoint::ops::ChangeKind;
use waypoint::{CheckoutOptions, Config, Engine};

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(about = "content-addressed checkpoint store for project directories")]
#[command(version)]
struct Cli {
    /// project working directory
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// storage base path (defaults to ~/waypoint/checkpoints)
    #[arg(long, env = "WAYPOINT_BASE_PATH")]
    base_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// snapshot the project directory as a new checkpoint
    Create {
        /// checkpoint description
        #[arg(short, long)]
        message: Option<String>,

        /// author name
        #[arg(short, long)]
        author: Option<String>,
    },

    /// restore a checkpoint into the project directory
    Checkout {
        /// revision: HEAD, a branch, a hash or a unique hash prefix
        rev: String,

        /// skip the automatic backup of the current state
        #[arg(long)]
        no_backup: bool,

        /// do not restore recorded file modes
        #[arg(long)]
        no_permissions: bool,
    },

    /// show checkpoint history, newest first
    History {
        /// branch to walk instead of HEAD
        #[arg(short, long)]
        branch: Option<String>,

        /// maximum number of entries to show
        #[arg(short = 'n', long)]
        max_count: Option<usize>,
    },

    /// list files in a checkpoint
    Ls {
        /// revision to list
        #[arg(default_value = "HEAD")]
        rev: String,
    },

    /// print one file's contents from a checkpoint
    Show {
        /// revision to read from
        rev: String,

        /// file path inside the snapshot
        path: String,
    },

    /// show changes a checkpoint introduced
    Changes {
        /// revision to diff against its parent
        #[arg(default_value = "HEAD")]
        rev: String,
    },

    /// delete the most recent checkpoint and return to its parent
    DeleteLatest {
        /// hash of the latest checkpoint (safety check)
        rev: String,
    },

    /// truncate history back to a checkpoint
    Reset {
        /// revision to reset to
        rev: String,
    },

    /// remove unreachable objects
    Gc,

    /// print storage statistics
    Stats,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::default();
    if let Some(base_path) = cli.base_path.clone() {
        config.base_path = base_path;
    }
    let engine = Engine::new(config);

    match run(&engine, &cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(engine: &Engine, cli: &Cli) -> waypoint::Result<()> {
    let project = &cli.project;

    match &cli.command {
        Commands::Create { message, author } => {
            let hash =
                engine.create_checkpoint(project, message.as_deref(), author.as_deref())?;
            println!("{}", hash);
        }

        Commands::Checkout {
            rev,
            no_backup,
            no_permissions,
        } => {
            engine.checkout(
                project,
                rev,
                CheckoutOptions {
                    overwrite: !no_backup,
                    preserve_permissions: !no_permissions,
                },
            )?;
            println!("checked out {}", rev);
        }

        Commands::History { branch, max_count } => {
            let mut history = engine.get_history(project, branch.as_deref())?;
            if let Some(max) = max_count {
                history.truncate(*max);
            }
            for entry in history {
                println!("checkpoint {}", entry.hash);
                println!("Author: {}", entry.author);
                println!("Date:   {}", entry.timestamp);
                println!();
                for line in entry.message.lines() {
                    println!("    {}", line);
                }
                println!();
            }
        }

        Commands::Ls { rev } => {
            for file in engine.list_files(project, rev)? {
                if file.is_directory {
                    println!("{:>12}  {}/", "-", file.path);
                } else {
                    println!("{:>12}  {}", file.size, file.path);
                }
            }
        }

        Commands::Show { rev, path } => {
            let content = engine.get_file_content(project, rev, path)?;
            use std::io::Write;
            std::io::stdout().write_all(&content).map_err(|source| {
                waypoint::Error::Io {
                    path: PathBuf::from("<stdout>"),
                    source,
                }
            })?;
        }

        Commands::Changes { rev } => {
            let diff = engine.get_checkpoint_changes(project, rev)?;
            if diff.is_merge() {
                println!("merge checkpoint ({} parents)", diff.parent_count);
            }
            for change in &diff.changes {
                match change.kind {
                    ChangeKind::Added => println!("A  {}", change.path),
                    ChangeKind::Modified => println!("M  {}", change.path),
                    ChangeKind::Deleted => println!("D  {}", change.path),
                    ChangeKind::Renamed => println!(
                        "R  {} -> {}",
                        change.old_path.as_deref().unwrap_or("?"),
                        change.path
                    ),
                }
            }
            println!(
                "{} added, {} modified, {} deleted, {} renamed ({:+} bytes)",
                diff.stats.added,
                diff.stats.modified,
                diff.stats.deleted,
                diff.stats.renamed,
                diff.stats.net_size_change
            );
        }

        Commands::DeleteLatest { rev } => {
            engine.delete_latest_checkpoint(project, rev)?;
            println!("deleted {}", rev);
        }

        Commands::Reset { rev } => {
            engine.reset_to_checkpoint(project, rev)?;
            println!("reset to {}", rev);
        }

        Commands::Gc => {
            let stats = engine.garbage_collect(project)?;
            println!(
                "removed {} of {} objects, freed {} bytes",
                stats.objects_removed, stats.objects_scanned, stats.bytes_freed
            );
        }

        Commands::Stats => {
            let stats = engine.storage_stats(project)?;
            println!("blobs:   {}", stats.blob_count);
            println!("trees:   {}", stats.tree_count);
            println!("commits: {}", stats.commit_count);
            println!("compressed on disk: {} bytes", stats.compressed_bytes);
            println!("uncompressed blobs: {} bytes", stats.uncompressed_blob_bytes);
            println!("ratio: {:.3}", stats.ratio);
        }
    }

    Ok(())
}
