//! Link collections and their on-disk table.
//!
//! The table is a line-oriented, tab-separated text file:
//!
//! ```text
//! # Sink Link Database
//! root:	/home/user/project
//! dbfile:	.sinklinks
//! links:	1
//! link:	conf/app.toml	$SHARED/app.toml	w	9f86d0...
//! # EOF
//! ```
//!
//! The writable flag (`w` or `_`) and the last synced signature are
//! optional trailing fields.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sink_core::FilesystemError;

use crate::copy::write_atomic;
use crate::error::LinkError;
use crate::paths;

/// Collection file name at a collection root.
pub const DB_FILE: &str = ".sinklinks";
/// Collection file inside a Git metadata folder.
pub const DB_FILE_GIT: &str = ".git/sinklinks";
/// Collection file inside a Mercurial metadata folder.
pub const DB_FILE_HG: &str = ".hg/sinklinks";

const HEADER: &str = "# Sink Link Database";
const EOF_MARKER: &str = "# EOF";

/// One registered link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    /// Source path as given, variables unexpanded.
    pub source: String,
    /// Destination relative to the collection root, `/`-separated.
    pub destination: String,
    /// Whether the destination may be pushed back.
    pub writable: bool,
    /// Signature of the content at the last synchronization.
    pub last_hash: Option<String>,
}

impl LinkEntry {
    pub fn new(source: impl Into<String>, destination: impl Into<String>, writable: bool) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            writable,
            last_hash: None,
        }
    }

    fn to_line(&self) -> String {
        let mut line = format!("link:\t{}\t{}", self.destination, self.source);
        if self.writable || self.last_hash.is_some() {
            line.push('\t');
            line.push(if self.writable { 'w' } else { '_' });
        }
        if let Some(hash) = &self.last_hash {
            line.push('\t');
            line.push_str(hash);
        }
        line
    }
}

/// An ordered set of links rooted at a directory.
#[derive(Debug, Clone)]
pub struct Collection {
    root: PathBuf,
    dbfile: String,
    links: Vec<LinkEntry>,
}

impl Collection {
    /// An empty, unsaved collection.
    pub fn new(root: impl Into<PathBuf>, dbfile: impl Into<String>) -> Self {
        Self {
            root: paths::normalize(&root.into()),
            dbfile: dbfile.into(),
            links: Vec::new(),
        }
    }

    /// Load the collection stored at `root/dbfile`.
    pub fn load(root: impl Into<PathBuf>, dbfile: impl Into<String>) -> Result<Self, LinkError> {
        let mut collection = Self::new(root, dbfile);
        let path = collection.db_path();
        let text = fs::read_to_string(&path).map_err(|e| FilesystemError::io(&path, e))?;
        collection.links = parse(&text, &path)?;
        tracing::debug!(path = %path.display(), links = collection.links.len(), "loaded link database");
        Ok(collection)
    }

    /// Find the nearest collection at or above `start`.
    pub fn lookup(start: &Path) -> Result<Self, LinkError> {
        let start = match start.canonicalize() {
            Ok(path) => path,
            Err(_) => paths::normalize(start),
        };
        for dir in start.ancestors() {
            for dbfile in [DB_FILE, DB_FILE_GIT, DB_FILE_HG] {
                if dir.join(dbfile).is_file() {
                    return Self::load(dir, dbfile);
                }
            }
        }
        Err(LinkError::NoCollection { start })
    }

    /// Absolute directory the destinations are relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collection file name relative to the root.
    pub fn dbfile(&self) -> &str {
        &self.dbfile
    }

    /// Absolute path of the collection file.
    pub fn db_path(&self) -> PathBuf {
        self.root.join(&self.dbfile)
    }

    /// Whether the collection file exists.
    pub fn exists(&self) -> bool {
        self.db_path().is_file()
    }

    /// Links in registration order.
    pub fn links(&self) -> &[LinkEntry] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Link registered at the root-relative `destination`.
    pub fn get(&self, destination: &str) -> Option<&LinkEntry> {
        self.links.iter().find(|l| l.destination == destination)
    }

    pub(crate) fn get_mut(&mut self, destination: &str) -> Option<&mut LinkEntry> {
        self.links.iter_mut().find(|l| l.destination == destination)
    }

    /// Register `entry`, replacing a link at the same destination in place.
    /// Returns the replaced link.
    pub(crate) fn upsert(&mut self, entry: LinkEntry) -> Option<LinkEntry> {
        match self.get_mut(&entry.destination) {
            Some(existing) => Some(std::mem::replace(existing, entry)),
            None => {
                self.links.push(entry);
                None
            }
        }
    }

    pub(crate) fn remove_entry(&mut self, destination: &str) -> Option<LinkEntry> {
        let index = self.links.iter().position(|l| l.destination == destination)?;
        Some(self.links.remove(index))
    }

    /// Root-relative key of an absolute destination path.
    pub fn destination_key(&self, destination: &Path) -> Result<String, LinkError> {
        let normalized = paths::normalize(destination);
        if let Some(key) = paths::relative_to(&normalized, &self.root) {
            return Ok(key);
        }
        // Retry through symlinks, e.g. a root reached through /var vs /private/var.
        if let (Ok(root), Some(dest)) = (
            self.root.canonicalize(),
            paths::canonicalize_lenient(&normalized),
        ) {
            if let Some(key) = paths::relative_to(&dest, &root) {
                return Ok(key);
            }
        }
        Err(LinkError::DestinationOutsideRoot {
            destination: normalized,
            root: self.root.clone(),
        })
    }

    /// Absolute path of a link's destination.
    pub fn destination_path(&self, entry: &LinkEntry) -> PathBuf {
        self.root.join(&entry.destination)
    }

    /// Absolute path of a link's source, variables expanded.
    ///
    /// Relative sources are resolved against the collection root.
    pub fn source_path(&self, entry: &LinkEntry) -> PathBuf {
        let expanded = paths::expand(&entry.source);
        paths::absolute(Path::new(&expanded), &self.root)
    }

    /// Serialize the collection table.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(HEADER);
        out.push('\n');
        out.push_str(&format!("root:\t{}\n", self.root.display()));
        out.push_str(&format!("dbfile:\t{}\n", self.dbfile));
        out.push_str(&format!("links:\t{}\n", self.links.len()));
        for link in &self.links {
            out.push_str(&link.to_line());
            out.push('\n');
        }
        out.push_str(EOF_MARKER);
        out.push('\n');
        out
    }

    /// Write the collection file atomically.
    pub fn save(&self) -> Result<(), LinkError> {
        let path = self.db_path();
        write_atomic(&path, self.render().as_bytes(), None, None)?;
        tracing::debug!(path = %path.display(), links = self.links.len(), "saved link database");
        Ok(())
    }
}

/// Parse a collection table. `path` only labels errors.
pub fn parse(text: &str, path: &Path) -> Result<Vec<LinkEntry>, LinkError> {
    let mut links = Vec::new();
    let mut declared: Option<(usize, usize)> = None;
    let mut eof_line: Option<usize> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if let Some(eof) = eof_line {
            return Err(LinkError::corrupt(
                path,
                line_no,
                format!("content after EOF marker on line {eof}"),
            ));
        }
        if line.starts_with('#') {
            if line.trim() == EOF_MARKER {
                eof_line = Some(line_no);
            }
            continue;
        }

        let mut fields = line.split('\t');
        let key = fields.next().unwrap_or_default().trim();
        let args: Vec<&str> = fields.collect();

        match key {
            "root:" | "dbfile:" => {}
            "links:" => {
                let count = args
                    .first()
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .ok_or_else(|| LinkError::corrupt(path, line_no, "invalid links count"))?;
                declared = Some((count, line_no));
            }
            "link:" => links.push(parse_link(&args, path, line_no)?),
            other => {
                return Err(LinkError::corrupt(
                    path,
                    line_no,
                    format!("unknown entry '{other}'"),
                ));
            }
        }
    }

    let Some((count, count_line)) = declared else {
        return Err(LinkError::corrupt(path, 0, "missing links count"));
    };
    if count != links.len() {
        return Err(LinkError::corrupt(
            path,
            count_line,
            format!("declares {count} links, found {}", links.len()),
        ));
    }
    if eof_line.is_none() {
        return Err(LinkError::corrupt(
            path,
            text.lines().count(),
            "missing EOF marker, file may be truncated",
        ));
    }
    Ok(links)
}

fn parse_link(args: &[&str], path: &Path, line_no: usize) -> Result<LinkEntry, LinkError> {
    let (destination, source) = match args {
        [destination, source, ..] if !destination.is_empty() && !source.is_empty() => {
            (*destination, *source)
        }
        _ => {
            return Err(LinkError::corrupt(
                path,
                line_no,
                "link needs a destination and a source",
            ));
        }
    };
    if !sink_core::is_normalized(destination) {
        return Err(LinkError::corrupt(
            path,
            line_no,
            format!("destination is not a relative path: {destination}"),
        ));
    }

    let writable = match args.get(2).copied() {
        None | Some("_") | Some("") => false,
        Some("w") => true,
        Some(other) => {
            return Err(LinkError::corrupt(
                path,
                line_no,
                format!("invalid writable flag '{other}'"),
            ));
        }
    };
    let last_hash = match args.get(3).copied() {
        None | Some("_") | Some("") => None,
        Some(hash) => Some(hash.to_string()),
    };
    if args.len() > 4 {
        return Err(LinkError::corrupt(path, line_no, "too many fields"));
    }

    Ok(LinkEntry {
        source: source.to_string(),
        destination: destination.to_string(),
        writable,
        last_hash,
    })
}
