//! diskprobe — concurrent disk usage analyser.
//!
//! Thin binary entry point. All scanning logic lives in the `diskprobe-core`
//! crate; this file parses arguments, drives a scan session and renders the
//! settled tree as text or JSON.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use diskprobe_core::analysis::LargeItem;
use diskprobe_core::model::size::{format_count, format_percent, format_size_in, SizeUnit};
use diskprobe_core::model::{BasisMetric, FileTree, NodeIndex, NodeSnapshot};
use diskprobe_core::scanner::progress::ScanProgress;
use diskprobe_core::{ScanConfig, ScanOutcome, ScanSession, ScanStatus};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "diskprobe",
    version,
    about = "Concurrent disk usage analyser",
    long_about = "diskprobe scans a drive, directory or file and reports recursive \
                  sizes, cluster-rounded allocation and the items taking up the \
                  most space."
)]
struct Cli {
    /// Drive, directory or file to scan
    path: PathBuf,

    /// Metric percentages and large items are based on
    #[arg(short, long, value_enum, default_value_t = BasisArg::Size)]
    basis: BasisArg,

    /// Worker threads (0 = one per CPU)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,

    /// Descend into linked directories
    #[arg(long)]
    follow_symlinks: bool,

    /// Unit for sizes
    #[arg(short, long, value_enum, default_value_t = UnitArg::Auto)]
    unit: UnitArg,

    /// Levels below the root to print
    #[arg(short, long, default_value_t = 1)]
    depth: usize,

    /// Number of large items to list
    #[arg(short = 'n', long, default_value_t = 10)]
    top: usize,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            threads: self.threads,
            follow_symlinks: self.follow_symlinks,
            basis: self.basis.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BasisArg {
    Size,
    Allocated,
    Files,
}

impl From<BasisArg> for BasisMetric {
    fn from(arg: BasisArg) -> Self {
        match arg {
            BasisArg::Size => Self::Size,
            BasisArg::Allocated => Self::Allocated,
            BasisArg::Files => Self::Files,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum UnitArg {
    Auto,
    #[value(name = "b", alias = "bytes")]
    Bytes,
    Kb,
    Mb,
    Gb,
}

impl From<UnitArg> for SizeUnit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::Auto => Self::Auto,
            UnitArg::Bytes => Self::Bytes,
            UnitArg::Kb => Self::Kb,
            UnitArg::Mb => Self::Mb,
            UnitArg::Gb => Self::Gb,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let unit = SizeUnit::from(cli.unit);

    // Initialise structured logging. Logs go to stderr so `--json` output
    // stays machine-readable.
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("diskprobe starting");

    let mut session = ScanSession::new(cli.scan_config());
    session.start_scan(&cli.path);

    while session.is_scanning() {
        for msg in session.poll() {
            if let ScanProgress::Update {
                files_found,
                total_size,
                current_path,
                ..
            } = msg
            {
                tracing::debug!(
                    files = files_found,
                    bytes = total_size,
                    "scanning {current_path}"
                );
            }
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    match session.wait() {
        Some(ScanOutcome::Completed) => {}
        Some(ScanOutcome::Cancelled) => bail!("scan was cancelled"),
        Some(ScanOutcome::Failed(err)) => return Err(err.into()),
        None => bail!("no scan was started"),
    }

    let tree = session.tree();
    let status = session.status().context("scan status unavailable")?;
    let large = session.large_items(cli.top);

    if cli.json {
        let report = JsonReport {
            basis: session.basis(),
            status,
            large_items: large,
            tree: tree.root().map(|root| json_node(&tree, root, cli.depth)),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&status, unit);
        if let Some(root) = tree.root() {
            print_tree(&tree, root, session.basis(), unit, 0, cli.depth);
        }
        print_large_items(&large, session.basis(), unit);
    }

    Ok(())
}

// ── Text output ──────────────────────────────────────────────────────────────

fn print_summary(status: &ScanStatus, unit: SizeUnit) {
    println!(
        "{}: {} in {} files",
        status.root_path.display(),
        format_size_in(status.total_size, unit),
        format_count(status.file_count)
    );
    if let Some(volume) = status.volume {
        println!(
            "volume: {} used, {} free of {}, cluster size {}",
            format_size_in(volume.used_bytes(), unit),
            format_size_in(volume.free_bytes, unit),
            format_size_in(volume.total_bytes, unit),
            format_size_in(volume.cluster_size, SizeUnit::Bytes)
        );
    }
    println!();
}

fn print_tree(
    tree: &FileTree,
    idx: NodeIndex,
    basis: BasisMetric,
    unit: SizeUnit,
    level: usize,
    max_depth: usize,
) {
    let node = tree.get(idx).snapshot(idx);
    println!("{}", format_line(&node, unit, level));
    if level >= max_depth {
        return;
    }
    for child in tree.children_sorted_by(idx, basis) {
        print_tree(tree, child, basis, unit, level + 1, max_depth);
    }
}

fn print_large_items(items: &[LargeItem], basis: BasisMetric, unit: SizeUnit) {
    if items.is_empty() {
        return;
    }
    println!();
    println!("large items by {}:", basis.label());
    for item in items {
        let metric = match basis {
            BasisMetric::Files => format!("{} files", format_count(item.metric)),
            BasisMetric::Size | BasisMetric::Allocated => format_size_in(item.metric, unit),
        };
        println!("  {metric:>12}  {}", item.path);
    }
}

fn format_line(node: &NodeSnapshot, unit: SizeUnit, level: usize) -> String {
    let marker = match (node.is_large, node.is_error) {
        (_, true) => '!',
        (true, false) => '*',
        (false, false) => ' ',
    };
    let modified = node
        .modified
        .map(|t| {
            chrono::DateTime::<chrono::Local>::from(t)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_default();
    format!(
        "{marker} {:>8}  {:>10}  {:>10}  {:>9} files  {:>7} dirs  {:<16}  {}{}",
        format_percent(node.percent_of_parent),
        format_size_in(node.size, unit),
        format_size_in(node.allocated, unit),
        format_count(node.file_count),
        format_count(node.folder_count),
        modified,
        "  ".repeat(level),
        node.name,
    )
}

// ── JSON output ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonReport {
    basis: BasisMetric,
    status: ScanStatus,
    large_items: Vec<LargeItem>,
    tree: Option<JsonNode>,
}

#[derive(Serialize)]
struct JsonNode {
    #[serde(flatten)]
    node: NodeSnapshot,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<JsonNode>,
}

fn json_node(tree: &FileTree, idx: NodeIndex, depth: usize) -> JsonNode {
    let children = if depth == 0 {
        Vec::new()
    } else {
        tree.children(idx)
            .into_iter()
            .map(|child| json_node(tree, child, depth - 1))
            .collect()
    };
    JsonNode {
        node: tree.get(idx).snapshot(idx),
        children,
    }
}
