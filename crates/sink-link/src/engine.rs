//! Link status, guarded push/pull and collection maintenance.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use sink_core::{compare_times, epoch_seconds, hash_file, FilesystemError};

use crate::collection::{Collection, LinkEntry, DB_FILE, DB_FILE_GIT, DB_FILE_HG};
use crate::copy::copy_atomic;
use crate::error::LinkError;
use crate::paths;
use crate::status::{plan, ContentStatus, Direction, Plan, Refusal, TimeStatus};

/// Result of one applied or skipped synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SyncOutcome {
    /// Content was copied; `hash` is its signature.
    Applied { hash: String },
    /// Nothing to copy.
    UpToDate,
}

/// Status row of one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub destination: String,
    /// Source as registered, variables unexpanded.
    pub source: String,
    pub content: ContentStatus,
    pub time: TimeStatus,
    pub writable: bool,
    /// The destination changed since the last recorded synchronization.
    pub locally_modified: bool,
}

/// Outcome of one link within a batch.
#[derive(Debug)]
pub struct LinkOutcome {
    pub destination: String,
    pub result: Result<SyncOutcome, LinkError>,
}

/// Outcome of a batch update.
#[derive(Debug)]
pub struct UpdateReport {
    pub direction: Direction,
    pub outcomes: Vec<LinkOutcome>,
}

impl UpdateReport {
    /// Links whose content was copied.
    pub fn applied(&self) -> impl Iterator<Item = &LinkOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, Ok(SyncOutcome::Applied { .. })))
    }

    /// Links that failed.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &LinkError)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Err(err) => Some((o.destination.as_str(), err)),
            Ok(_) => None,
        })
    }

    /// Whether every link succeeded.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Performs link operations against collections.
///
/// User-supplied relative paths are resolved against the working directory,
/// taken from the process unless set with [`SyncEngine::with_cwd`].
#[derive(Debug, Clone, Default)]
pub struct SyncEngine {
    cwd: Option<PathBuf>,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `cwd`.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
        }
    }

    fn cwd(&self) -> Result<PathBuf, LinkError> {
        match &self.cwd {
            Some(cwd) => Ok(cwd.clone()),
            None => env::current_dir().map_err(|e| FilesystemError::io(".", e).into()),
        }
    }

    fn absolute(&self, path: &Path) -> Result<PathBuf, LinkError> {
        Ok(paths::absolute(path, &self.cwd()?))
    }

    /// Create an empty collection for `path`.
    ///
    /// Inside a Git or Mercurial working tree the collection is rooted at
    /// the repository root and stored in its metadata folder.
    pub fn init(&self, path: &Path) -> Result<Collection, LinkError> {
        let path = self.absolute(path)?;
        let metadata = fs::metadata(&path).map_err(|e| FilesystemError::io(&path, e))?;
        if !metadata.is_dir() {
            return Err(FilesystemError::NotADirectory { path }.into());
        }

        let collection = match find_repository(&path) {
            Some((root, dbfile)) => Collection::new(root, dbfile),
            None => Collection::new(&path, DB_FILE),
        };
        if collection.exists() {
            return Err(LinkError::AlreadyInitialized {
                path: collection.db_path(),
            });
        }
        collection.save()?;
        tracing::info!(path = %collection.db_path().display(), "link database created");
        Ok(collection)
    }

    /// Content and time status of `entry`.
    pub fn status(
        &self,
        collection: &Collection,
        entry: &LinkEntry,
    ) -> Result<(ContentStatus, TimeStatus), LinkError> {
        let source = resolve_source(collection, entry)?;
        let destination = collection.destination_path(entry);

        let dest_meta = match fs::metadata(&destination) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok((ContentStatus::NotThere, TimeStatus::Older));
            }
            Err(e) => return Err(FilesystemError::io(&destination, e).into()),
        };
        let source_meta = fs::metadata(&source).map_err(|e| FilesystemError::io(&source, e))?;

        let content = if dest_meta.len() == 0 {
            ContentStatus::Empty
        } else if signature(&source)? == signature(&destination)? {
            ContentStatus::Same
        } else {
            ContentStatus::Different
        };

        let mtime = |meta: &fs::Metadata| meta.modified().map(epoch_seconds).unwrap_or(0.0);
        let time = match compare_times(mtime(&dest_meta), mtime(&source_meta)) {
            std::cmp::Ordering::Greater => TimeStatus::Newer,
            std::cmp::Ordering::Less => TimeStatus::Older,
            std::cmp::Ordering::Equal => TimeStatus::Same,
        };
        Ok((content, time))
    }

    /// Status rows of every link, in destination order.
    pub fn status_all(&self, collection: &Collection) -> Vec<Result<LinkStatus, (String, LinkError)>> {
        let mut entries: Vec<&LinkEntry> = collection.links().iter().collect();
        entries.sort_by(|a, b| a.destination.cmp(&b.destination));

        entries
            .into_iter()
            .map(|entry| -> Result<LinkStatus, (String, LinkError)> {
                let (content, time) = self
                    .status(collection, entry)
                    .map_err(|err| (entry.destination.clone(), err))?;
                let locally_modified = match (&entry.last_hash, content) {
                    (Some(_), ContentStatus::NotThere) => true,
                    (Some(last), _) => signature(&collection.destination_path(entry))
                        .map(|sig| &sig != last)
                        .unwrap_or(true),
                    (None, _) => false,
                };
                Ok(LinkStatus {
                    destination: entry.destination.clone(),
                    source: entry.source.clone(),
                    content,
                    time,
                    writable: entry.writable,
                    locally_modified,
                })
            })
            .collect()
    }

    /// Copy the source over the destination and save the collection.
    pub fn pull(
        &self,
        collection: &mut Collection,
        destination: &str,
        force: bool,
    ) -> Result<SyncOutcome, LinkError> {
        let outcome = self.sync(Direction::Pull, collection, destination, force)?;
        collection.save()?;
        Ok(outcome)
    }

    /// Copy the destination over the source and save the collection.
    pub fn push(
        &self,
        collection: &mut Collection,
        destination: &str,
        force: bool,
    ) -> Result<SyncOutcome, LinkError> {
        let outcome = self.sync(Direction::Push, collection, destination, force)?;
        collection.save()?;
        Ok(outcome)
    }

    fn sync(
        &self,
        direction: Direction,
        collection: &mut Collection,
        destination: &str,
        force: bool,
    ) -> Result<SyncOutcome, LinkError> {
        let entry = collection
            .get(destination)
            .cloned()
            .ok_or_else(|| LinkError::UnknownLink {
                destination: destination.to_string(),
            })?;
        let (content, time) = self.status(collection, &entry)?;
        let dest_path = collection.destination_path(&entry);

        match plan(direction, content, time, force) {
            Ok(Plan::UpToDate) => {
                tracing::debug!(destination, "link is up to date");
                Ok(SyncOutcome::UpToDate)
            }
            Ok(Plan::Apply) => {
                let source_path = collection.source_path(&entry);
                let hash = match direction {
                    Direction::Pull => copy_atomic(&source_path, &dest_path)?,
                    Direction::Push => copy_atomic(&dest_path, &source_path)?,
                }
                .to_hex();
                tracing::info!(destination, %direction, %content, %time, force, "link synchronized");
                if let Some(link) = collection.get_mut(destination) {
                    link.last_hash = Some(hash.clone());
                }
                Ok(SyncOutcome::Applied { hash })
            }
            Err(Refusal::LocalNewer) => Err(LinkError::LocalNewerConflict {
                path: dest_path,
                content,
                time,
            }),
            Err(Refusal::OriginNewer) => Err(LinkError::OriginNewerConflict {
                path: dest_path,
                content,
                time,
            }),
            Err(Refusal::NothingToPush) => Err(LinkError::NothingToPush {
                path: dest_path,
                content,
            }),
        }
    }

    /// Register a link from `source` to `destination`.
    ///
    /// A destination naming an existing directory receives the source's
    /// file name. A missing destination is created from the source.
    pub fn add(
        &self,
        collection: &mut Collection,
        source: &str,
        destination: &Path,
        writable: bool,
    ) -> Result<LinkEntry, LinkError> {
        let cwd = self.cwd()?;
        let mut dest_path = paths::absolute(destination, &cwd);
        if dest_path.is_dir() {
            if let Some(name) = Path::new(&paths::expand(source)).file_name() {
                dest_path.push(name);
            }
        }
        let key = collection.destination_key(&dest_path)?;

        let stored_source = if paths::needs_expansion(source) || Path::new(source).is_absolute() {
            source.to_string()
        } else {
            let absolute = paths::absolute(Path::new(source), &cwd);
            paths::relative_to(&absolute, collection.root())
                .unwrap_or_else(|| absolute.to_string_lossy().into_owned())
        };

        for value in [&stored_source, &key] {
            if !storable(value) {
                return Err(LinkError::UnstorablePath {
                    value: value.clone(),
                });
            }
        }

        let mut entry = LinkEntry::new(stored_source, key, writable);
        let source_path = resolve_source(collection, &entry)?;

        let dest_path = collection.destination_path(&entry);
        if !dest_path.exists() {
            tracing::info!(destination = %dest_path.display(), "creating link destination");
            entry.last_hash = Some(copy_atomic(&source_path, &dest_path)?.to_hex());
        } else if let Some(previous) = collection.get(&entry.destination) {
            if previous.source == entry.source {
                entry.last_hash = previous.last_hash.clone();
            }
        }

        if let Some(previous) = collection.upsert(entry.clone()) {
            if previous.source != entry.source {
                tracing::warn!(
                    destination = %entry.destination,
                    previous = %previous.source,
                    source = %entry.source,
                    "previous link source was replaced"
                );
            }
        }
        collection.save()?;
        Ok(entry)
    }

    /// Unregister the link at `destination`, deleting the file if asked.
    pub fn remove(
        &self,
        collection: &mut Collection,
        destination: &Path,
        delete: bool,
    ) -> Result<LinkEntry, LinkError> {
        let unknown = || LinkError::UnknownLink {
            destination: destination.display().to_string(),
        };
        let key = collection
            .destination_key(&self.absolute(destination)?)
            .map_err(|_| unknown())?;
        let entry = collection.remove_entry(&key).ok_or_else(unknown)?;

        // The file is only deleted once the link is gone from disk.
        if let Err(err) = collection.save() {
            collection.upsert(entry);
            return Err(err);
        }

        if delete {
            let path = collection.destination_path(&entry);
            match fs::remove_file(&path) {
                Ok(()) => tracing::info!(path = %path.display(), "link destination deleted"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(FilesystemError::io(&path, e).into()),
            }
        }
        Ok(entry)
    }

    /// Synchronize every link, or only `selected` destinations.
    ///
    /// Per-link failures are reported, never propagated. The collection is
    /// saved once after the batch when anything was copied.
    pub fn update(
        &self,
        direction: Direction,
        collection: &mut Collection,
        selected: &[PathBuf],
        force: bool,
    ) -> Result<UpdateReport, LinkError> {
        let mut outcomes = Vec::new();
        let mut wanted = HashSet::new();

        for path in selected {
            let key = self
                .absolute(path)
                .and_then(|abs| collection.destination_key(&abs))
                .ok()
                .filter(|key| collection.get(key).is_some());
            match key {
                Some(key) => {
                    wanted.insert(key);
                }
                None => outcomes.push(LinkOutcome {
                    destination: path.display().to_string(),
                    result: Err(LinkError::UnknownLink {
                        destination: path.display().to_string(),
                    }),
                }),
            }
        }

        let destinations: Vec<String> = collection
            .links()
            .iter()
            .map(|l| l.destination.clone())
            .filter(|d| selected.is_empty() || wanted.contains(d))
            .collect();

        for destination in destinations {
            let result = self.sync(direction, collection, &destination, force);
            if let Err(err) = &result {
                tracing::warn!(destination = %destination, error = %err, "link skipped");
            }
            outcomes.push(LinkOutcome {
                destination,
                result,
            });
        }

        let report = UpdateReport {
            direction,
            outcomes,
        };
        if report.applied().next().is_some() {
            collection.save()?;
        }
        Ok(report)
    }
}

/// Whether `value` fits in one field of the link table.
fn storable(value: &str) -> bool {
    !value.contains(['\t', '\n', '\r'])
}

/// Existing file a link's source resolves to.
fn resolve_source(collection: &Collection, entry: &LinkEntry) -> Result<PathBuf, LinkError> {
    let path = collection.source_path(entry);
    if path.is_file() {
        Ok(path)
    } else {
        Err(LinkError::SourceNotFound {
            destination: entry.destination.clone(),
            origin: entry.source.clone(),
            resolved: path,
        })
    }
}

fn signature(path: &Path) -> Result<String, FilesystemError> {
    hash_file(path)
        .map(|h| h.to_hex())
        .map_err(|e| FilesystemError::io(path, e))
}

/// Nearest enclosing Git or Mercurial working tree and the collection file
/// inside its metadata folder.
fn find_repository(path: &Path) -> Option<(PathBuf, &'static str)> {
    path.ancestors().find_map(|dir| {
        if dir.join(".git").is_dir() {
            Some((dir.to_path_buf(), DB_FILE_GIT))
        } else if dir.join(".hg").is_dir() {
            Some((dir.to_path_buf(), DB_FILE_HG))
        } else {
            None
        }
    })
}
