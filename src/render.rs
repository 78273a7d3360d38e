//! Text rendering of diffs, change sets and link status.

use humansize::{BINARY, format_size};
use itertools::Itertools;

use sink_analyze::{ChangeSet, DiffReport};
use sink_core::{Node, NodeType, Status};
use sink_link::{LinkError, LinkStatus};

/// Which statuses make a diff row visible.
///
/// A row is shown when any of its statuses is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFilter {
    pub added: bool,
    pub removed: bool,
    pub newer: bool,
    pub older: bool,
    pub changed: bool,
    pub same: bool,
    pub absent: bool,
    pub origin: bool,
}

impl Default for StatusFilter {
    /// Every status that reports a difference.
    fn default() -> Self {
        Self {
            added: true,
            removed: true,
            newer: true,
            older: true,
            changed: true,
            same: false,
            absent: false,
            origin: false,
        }
    }
}

impl StatusFilter {
    /// Every status enabled.
    pub fn all() -> Self {
        Self {
            same: true,
            absent: true,
            origin: true,
            ..Self::default()
        }
    }

    /// Nothing enabled.
    pub fn none() -> Self {
        Self {
            added: false,
            removed: false,
            newer: false,
            older: false,
            changed: false,
            same: false,
            absent: false,
            origin: false,
        }
    }

    pub fn shows(&self, status: Status) -> bool {
        match status {
            Status::Added => self.added,
            Status::Removed => self.removed,
            Status::Newer => self.newer,
            Status::Older => self.older,
            Status::Changed => self.changed,
            Status::Same => self.same,
            Status::Absent => self.absent,
            Status::Origin => self.origin,
        }
    }

    pub fn shows_row(&self, statuses: &[Status]) -> bool {
        statuses.iter().any(|s| self.shows(*s))
    }
}

/// Column label: `A`..`Z`, then `AA`, `AB`...
fn column_label(index: usize) -> String {
    let mut label = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        n -= 1;
        label.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    label.into_iter().rev().collect()
}

pub fn print_diff(report: &DiffReport) {
    let roots = std::iter::once(&report.origin).chain(&report.compared);
    for (i, root) in roots.enumerate() {
        println!("[{}] ← {}", column_label(i), root.display());
    }
    println!();

    if report.is_empty() {
        println!(" No differences.");
        return;
    }

    let width = report.len().to_string().len();
    let header = (0..=report.compared.len())
        .map(|i| format!("{:^3}", column_label(i)))
        .join("");
    println!("{:>width$} {header}", "");

    for (n, (path, statuses)) in report.rows.iter().enumerate() {
        let marks = statuses.iter().map(Status::symbol).join("");
        println!("{:>width$} {marks} {path}", n + 1);
    }

    let counts = report.counts();
    let summary = counts
        .iter()
        .filter(|(status, _)| status.is_change())
        .sorted_by_key(|(status, _)| status.to_string())
        .map(|(status, count)| format!("{count} {status}"))
        .join(", ");
    println!();
    if summary.is_empty() {
        println!(" {} paths", report.len());
    } else {
        println!(" {} paths: {summary}", report.len());
    }
}

pub fn print_changes(changes: &ChangeSet) {
    for path in &changes.created {
        println!(" + {path}");
    }
    for relocation in &changes.copied {
        println!(" = {} ← {}", relocation.path, relocation.from);
    }
    for relocation in &changes.moved {
        println!(" > {} ← {}", relocation.path, relocation.from);
    }
    for path in &changes.modified {
        println!(" ~ {path}");
    }
    for path in &changes.removed {
        println!(" - {path}");
    }

    if !changes.has_changes() {
        println!(" No changes.");
    }
}

/// One line per node: type, size, modification time, path.
pub fn print_node_long(node: &Node) {
    let kind = match node.kind {
        NodeType::File => '-',
        NodeType::Symlink => 'l',
        NodeType::Directory => 'd',
        NodeType::Special => 's',
        NodeType::Null => '!',
    };
    let (size, mtime) = match &node.meta {
        Some(meta) => (format_size(meta.size, BINARY), format_mtime(meta.mtime)),
        None => ("-".to_string(), "-".to_string()),
    };
    println!("{kind} {size:>10} {mtime:<16} {}", node.path);
}

fn format_mtime(secs: f64) -> String {
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    chrono::DateTime::from_timestamp(whole as i64, nanos)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string())
}

pub fn print_link_status(rows: &[Result<LinkStatus, (String, LinkError)>]) {
    if rows.is_empty() {
        println!(" No links.");
        return;
    }
    for row in rows {
        match row {
            Ok(status) => println!(
                "{}{}{}{} {} ← {}",
                status.content.symbol(),
                status.time.symbol(),
                if status.writable { 'w' } else { ' ' },
                if status.locally_modified { '*' } else { ' ' },
                status.destination,
                status.source
            ),
            Err((destination, err)) => println!("??   {destination}: {err}"),
        }
    }
}
