//! sink - compare file trees against an origin and keep linked files in sync.
//!
//! Usage:
//!   sink snap [PATH]                 Snapshot a tree as JSON
//!   sink filters [PATH]              Show the resolved filter patterns
//!   sink list [PATH]...              List the files admitted by the filters
//!   sink diff ORIGIN OTHER...        Compare trees or snapshots to an origin
//!   sink changes BEFORE AFTER        Track changes between two states of a tree
//!   sink link <COMMAND>              Manage linked files
//!   sink --help                      Show help

mod logging;
mod render;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};

use sink_analyze::{ChangeTracker, DiffEngine, TrackMethod};
use sink_core::{FilterSpec, Snapshot, SnapshotConfig};
use sink_link::{Collection, Direction, SyncEngine, SyncOutcome};
use sink_scan::{FilterCompiler, Matcher, SnapshotReport, Snapshotter};

use render::StatusFilter;

#[derive(Parser)]
#[command(
    name = "sink",
    version,
    about = "Compare file trees against an origin and keep linked files in sync",
    long_about = "sink snapshots directory trees, compares them against an origin \
                  tree and keeps individual files linked to a source in sync.\n\n\
                  Filtering defaults to the nearest .gitignore plus common VCS \
                  and cache folders."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Snapshot a tree and write it as JSON
    Snap {
        /// Tree to snapshot
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        walk: WalkArgs,
    },

    /// Show the filter patterns that apply to a tree
    Filters {
        /// Tree the filters are resolved for
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// List the files admitted by the filters
    List {
        /// Trees to list
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Show type, size and modification time
        #[arg(short, long)]
        long: bool,

        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        walk: WalkArgs,
    },

    /// Compare trees (or snapshot files) against an origin
    Diff {
        /// Origin tree or snapshot file
        origin: PathBuf,

        /// Trees or snapshot files to compare
        #[arg(required = true)]
        others: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        #[command(flatten)]
        show: ShowArgs,

        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        walk: WalkArgs,
    },

    /// Track created, copied, moved, modified and removed files
    Changes {
        /// Earlier state: tree or snapshot file
        before: PathBuf,

        /// Later state: tree or snapshot file
        after: PathBuf,

        /// Compare contents or modification times
        #[arg(short, long, default_value = "content")]
        method: TrackMethod,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        walk: WalkArgs,
    },

    /// Manage files linked to a source
    Link {
        #[command(subcommand)]
        command: LinkCommand,
    },
}

#[derive(Subcommand)]
enum LinkCommand {
    /// Create an empty link database
    Init {
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Link DESTINATION to SOURCE, copying the source if DESTINATION is missing
    Add {
        /// Source file; `~` and `$VAR` are kept and expanded on use
        source: String,

        /// Destination inside the collection
        destination: PathBuf,

        /// Allow pushing the destination back to the source
        #[arg(short, long)]
        writable: bool,
    },

    /// Unregister a link
    Remove {
        destination: PathBuf,

        /// Delete the destination file as well
        #[arg(long)]
        delete: bool,
    },

    /// Show the state of every link
    Status {
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Copy sources over their destinations
    Pull {
        /// Destinations to update (defaults to all)
        destinations: Vec<PathBuf>,

        /// Overwrite destinations modified after their source
        #[arg(short, long)]
        force: bool,
    },

    /// Copy destinations back over their sources
    Push {
        /// Destinations to push (defaults to all)
        destinations: Vec<PathBuf>,

        /// Overwrite sources modified after their destination
        #[arg(short, long)]
        force: bool,
    },
}

/// Filter options shared by every tree command.
#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Reject paths matching GLOB
    #[arg(short = 'i', long = "ignores", value_name = "GLOB")]
    ignores: Vec<String>,

    /// Reject paths from a named set (git, gitignore, none)
    #[arg(short = 'I', long = "ignore-set", value_name = "SET")]
    ignore_sets: Vec<String>,

    /// Keep paths matching GLOB even when rejected
    #[arg(short = 'k', long = "keeps", value_name = "GLOB")]
    keeps: Vec<String>,

    /// Keep paths from a named set
    #[arg(short = 'K', long = "keep-set", value_name = "SET")]
    keep_sets: Vec<String>,

    /// Only admit paths matching GLOB
    #[arg(short = 'a', long = "accepts", value_name = "GLOB")]
    accepts: Vec<String>,

    /// Only admit paths from a named set
    #[arg(short = 'A', long = "accept-set", value_name = "SET")]
    accept_sets: Vec<String>,

    /// Use a named set for rejects, keeps and accepts
    #[arg(short = 's', long = "filter-set", value_name = "SET")]
    filter_sets: Vec<String>,
}

impl FilterArgs {
    fn spec(&self) -> FilterSpec {
        FilterSpec {
            ignores: self.ignores.clone(),
            accepts: self.accepts.clone(),
            keeps: self.keeps.clone(),
            ignore_sets: self.ignore_sets.clone(),
            accept_sets: self.accept_sets.clone(),
            keep_sets: self.keep_sets.clone(),
            filter_sets: self.filter_sets.clone(),
        }
    }

    fn matcher(&self, root: &Path) -> Result<Matcher> {
        FilterCompiler::new(root)
            .compile(&self.spec())
            .context("Invalid filters")
    }
}

#[derive(Args, Debug, Clone, Default)]
struct WalkArgs {
    /// Follow symbolic links
    #[arg(short = 'L', long)]
    follow_symlinks: bool,

    /// Walker threads (0 walks serially)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,

    /// Maximum depth to walk
    #[arg(short = 'd', long)]
    max_depth: Option<u32>,

    /// Skip files and folders starting with a dot
    #[arg(long)]
    skip_hidden: bool,
}

/// Diff row selection. Without any flag, rows with a difference are shown.
#[derive(Args, Debug, Clone, Default)]
struct ShowArgs {
    /// Show every row
    #[arg(long, conflicts_with_all = ["added", "removed", "newer", "older", "changed", "same"])]
    all: bool,

    /// Show rows with added paths
    #[arg(long)]
    added: bool,

    /// Show rows with removed paths
    #[arg(long)]
    removed: bool,

    /// Show rows with newer copies
    #[arg(long)]
    newer: bool,

    /// Show rows with older copies
    #[arg(long)]
    older: bool,

    /// Show rows with changed content
    #[arg(long)]
    changed: bool,

    /// Show rows with identical copies
    #[arg(long)]
    same: bool,
}

impl ShowArgs {
    fn status_filter(&self) -> StatusFilter {
        if self.all {
            return StatusFilter::all();
        }
        let any = self.added || self.removed || self.newer || self.older || self.changed || self.same;
        if !any {
            return StatusFilter::default();
        }
        StatusFilter {
            added: self.added,
            removed: self.removed,
            newer: self.newer,
            older: self.older,
            changed: self.changed,
            same: self.same,
            ..StatusFilter::none()
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Snap {
            path,
            output,
            filters,
            walk,
        } => run_snap(&path, output, &filters, &walk),
        Command::Filters { path, filters } => run_filters(&path, &filters),
        Command::List {
            paths,
            long,
            filters,
            walk,
        } => run_list(&paths, long, &filters, &walk),
        Command::Diff {
            origin,
            others,
            format,
            show,
            filters,
            walk,
        } => run_diff(&origin, &others, format, &show, &filters, &walk),
        Command::Changes {
            before,
            after,
            method,
            format,
            filters,
            walk,
        } => run_changes(&before, &after, method, format, &filters, &walk),
        Command::Link { command } => run_link(command),
    }
}

/// Walk `path` with the given filters.
fn take_snapshot(path: &Path, filters: &FilterArgs, walk: &WalkArgs) -> Result<SnapshotReport> {
    let root = path
        .canonicalize()
        .with_context(|| format!("Invalid path: {}", path.display()))?;
    let matcher = filters.matcher(&root)?;

    let config = SnapshotConfig::builder()
        .root(&root)
        .follow_symlinks(walk.follow_symlinks)
        .threads(walk.threads)
        .max_depth(walk.max_depth)
        .include_hidden(!walk.skip_hidden)
        .build()
        .context("Invalid snapshot configuration")?;

    let report = Snapshotter::new()
        .snapshot(&config, &matcher)
        .context("Snapshot failed")?;
    if !report.warnings.is_empty() {
        eprintln!(
            "{} warning(s) while walking {}",
            report.warnings.len(),
            root.display()
        );
    }
    Ok(report)
}

/// A tree to walk, or a snapshot file written by `sink snap`.
fn load_tree(path: &Path, filters: &FilterArgs, walk: &WalkArgs) -> Result<Snapshot> {
    if path.is_file() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read snapshot {}", path.display()))?;
        let snapshot = serde_json::from_str(&text)
            .with_context(|| format!("Invalid snapshot file {}", path.display()))?;
        return Ok(snapshot);
    }
    Ok(take_snapshot(path, filters, walk)?.snapshot)
}

fn run_snap(
    path: &Path,
    output: Option<PathBuf>,
    filters: &FilterArgs,
    walk: &WalkArgs,
) -> Result<()> {
    let report = take_snapshot(path, filters, walk)?;
    let json = serde_json::to_string_pretty(&report.snapshot)?;

    match output {
        Some(output_path) => {
            fs::write(&output_path, json)
                .with_context(|| format!("Cannot write {}", output_path.display()))?;
            eprintln!("Snapshot written to {}", output_path.display());
        }
        None => println!("{json}"),
    }

    let total: u64 = report
        .snapshot
        .iter()
        .filter_map(|node| node.meta.as_ref())
        .map(|meta| meta.size)
        .sum();
    eprintln!(
        "{} entries, {} in {:.2}s",
        report.snapshot.len(),
        humansize::format_size(total, humansize::BINARY),
        report.duration.as_secs_f64()
    );
    Ok(())
}

fn run_filters(path: &Path, filters: &FilterArgs) -> Result<()> {
    let root = path
        .canonicalize()
        .with_context(|| format!("Invalid path: {}", path.display()))?;
    let raw = FilterCompiler::new(&root)
        .resolve(&filters.spec())
        .context("Invalid filters")?;
    Matcher::from_raw(&raw).context("Invalid filters")?;

    for pattern in &raw.rejects {
        println!("- {pattern}");
    }
    for pattern in &raw.keeps {
        println!("~ {pattern}");
    }
    for pattern in &raw.accepts {
        println!("+ {pattern}");
    }
    Ok(())
}

fn run_list(paths: &[PathBuf], long: bool, filters: &FilterArgs, walk: &WalkArgs) -> Result<()> {
    let mut merged: Option<Snapshot> = None;
    for path in paths {
        let snapshot = take_snapshot(path, filters, walk)?.snapshot;
        merged = Some(match merged {
            None => snapshot,
            Some(previous) => previous
                .merge(&snapshot)
                .with_context(|| format!("Cannot list {} with the other trees", path.display()))?,
        });
    }

    let Some(snapshot) = merged else {
        return Ok(());
    };
    for node in snapshot.iter() {
        if long {
            render::print_node_long(node);
        } else {
            println!("{}", node.path);
        }
    }
    Ok(())
}

fn run_diff(
    origin: &Path,
    others: &[PathBuf],
    format: OutputFormat,
    show: &ShowArgs,
    filters: &FilterArgs,
    walk: &WalkArgs,
) -> Result<()> {
    let origin = load_tree(origin, filters, walk)?;
    let others = others
        .iter()
        .map(|path| load_tree(path, filters, walk))
        .collect::<Result<Vec<_>>>()?;
    let compared: Vec<&Snapshot> = others.iter().collect();

    let mut report = DiffEngine::new().diff(&origin, &compared);
    let filter = show.status_filter();
    report.rows.retain(|_, statuses| filter.shows_row(statuses));

    match format {
        OutputFormat::Text => render::print_diff(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn run_changes(
    before: &Path,
    after: &Path,
    method: TrackMethod,
    format: OutputFormat,
    filters: &FilterArgs,
    walk: &WalkArgs,
) -> Result<()> {
    let previous = load_tree(before, filters, walk)?;
    let current = load_tree(after, filters, walk)?;
    let changes = ChangeTracker::new(method).track(&previous, &current);

    match format {
        OutputFormat::Text => render::print_changes(&changes),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&changes)?),
    }
    Ok(())
}

fn run_link(command: LinkCommand) -> Result<()> {
    let engine = SyncEngine::new();

    let (direction, destinations, force) = match command {
        LinkCommand::Init { path } => {
            let collection = engine.init(&path)?;
            println!("Created {}", collection.db_path().display());
            return Ok(());
        }
        LinkCommand::Add {
            source,
            destination,
            writable,
        } => {
            let mut collection = find_collection()?;
            let entry = engine.add(&mut collection, &source, &destination, writable)?;
            println!("{} ← {}", entry.destination, entry.source);
            return Ok(());
        }
        LinkCommand::Remove {
            destination,
            delete,
        } => {
            let mut collection = find_collection()?;
            let entry = engine.remove(&mut collection, &destination, delete)?;
            println!("Removed {}", entry.destination);
            return Ok(());
        }
        LinkCommand::Status { format } => {
            let collection = find_collection()?;
            let rows = engine.status_all(&collection);
            match format {
                OutputFormat::Text => render::print_link_status(&rows),
                OutputFormat::Json => {
                    let values: Vec<serde_json::Value> = rows
                        .iter()
                        .map(|row| match row {
                            Ok(status) => serde_json::to_value(status),
                            Err((destination, err)) => Ok(serde_json::json!({
                                "destination": destination,
                                "error": err.to_string(),
                            })),
                        })
                        .collect::<Result<_, _>>()?;
                    println!("{}", serde_json::to_string_pretty(&values)?);
                }
            }
            return Ok(());
        }
        LinkCommand::Pull {
            destinations,
            force,
        } => (Direction::Pull, destinations, force),
        LinkCommand::Push {
            destinations,
            force,
        } => (Direction::Push, destinations, force),
    };

    let mut collection = find_collection()?;
    let report = engine.update(direction, &mut collection, &destinations, force)?;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(SyncOutcome::Applied { .. }) => {
                println!("{:<5} {}", direction.to_string(), outcome.destination)
            }
            Ok(SyncOutcome::UpToDate) => println!("=     {}", outcome.destination),
            Err(err) => eprintln!("!     {err}"),
        }
    }

    let failures: Vec<_> = report.failures().collect();
    if failures.is_empty() {
        return Ok(());
    }
    if failures.iter().any(|(_, err)| err.is_conflict()) {
        eprintln!("Review the conflicting links, then use --force to overwrite them.");
    }
    bail!("{} of {} link(s) failed", failures.len(), report.outcomes.len())
}

fn find_collection() -> Result<Collection> {
    let cwd = std::env::current_dir().context("Cannot determine the working directory")?;
    Ok(Collection::lookup(&cwd)?)
}
