use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use sink_core::hash_file;
use sink_link::{
    Collection, ContentStatus, Direction, LinkError, SyncEngine, SyncOutcome, TimeStatus, DB_FILE,
    DB_FILE_GIT,
};
use tempfile::TempDir;

struct Fixture {
    _temp: TempDir,
    root: PathBuf,
    shared: PathBuf,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let base = temp.path().canonicalize().unwrap();
    let root = base.join("project");
    let shared = base.join("shared");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&shared).unwrap();
    Fixture {
        _temp: temp,
        root,
        shared,
    }
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn set_mtime(path: &Path, secs: u64) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

fn sig(path: &Path) -> String {
    hash_file(path).unwrap().to_hex()
}

fn source_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_add_creates_missing_destination() {
    let fx = fixture();
    let source = fx.shared.join("app.toml");
    write(&source, "name = \"app\"\n");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    let entry = engine
        .add(&mut collection, &source_str(&source), Path::new("conf/app.toml"), true)
        .unwrap();

    assert_eq!(entry.destination, "conf/app.toml");
    assert_eq!(entry.source, source_str(&source));
    assert!(entry.writable);

    let dest = fx.root.join("conf/app.toml");
    assert_eq!(sig(&dest), sig(&source));
    assert_eq!(entry.last_hash, Some(sig(&source)));

    let (content, time) = engine.status(&collection, &entry).unwrap();
    assert_eq!(content, ContentStatus::Same);
    assert_eq!(time, TimeStatus::Same);

    let reloaded = Collection::load(&fx.root, DB_FILE).unwrap();
    assert_eq!(reloaded.links(), collection.links());
}

#[test]
fn test_pull_restores_missing_destination() {
    let fx = fixture();
    let source = fx.shared.join("hosts");
    write(&source, "127.0.0.1 localhost\n");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    engine
        .add(&mut collection, &source_str(&source), Path::new("hosts"), false)
        .unwrap();
    let dest = fx.root.join("hosts");
    fs::remove_file(&dest).unwrap();

    let entry = collection.get("hosts").unwrap().clone();
    assert_eq!(
        engine.status(&collection, &entry).unwrap(),
        (ContentStatus::NotThere, TimeStatus::Older)
    );

    let outcome = engine.pull(&mut collection, "hosts", false).unwrap();
    assert_eq!(
        outcome,
        SyncOutcome::Applied {
            hash: sig(&source)
        }
    );
    assert_eq!(sig(&dest), sig(&source));

    let again = engine.pull(&mut collection, "hosts", false).unwrap();
    assert_eq!(again, SyncOutcome::UpToDate);
}

#[test]
fn test_pull_refuses_newer_destination_unless_forced() {
    let fx = fixture();
    let source = fx.shared.join("app.toml");
    write(&source, "upstream\n");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    engine
        .add(&mut collection, &source_str(&source), Path::new("app.toml"), false)
        .unwrap();

    let dest = fx.root.join("app.toml");
    write(&dest, "local edit\n");
    set_mtime(&source, 1_500_000_000);
    set_mtime(&dest, 1_600_000_000);

    let err = engine.pull(&mut collection, "app.toml", false).unwrap_err();
    assert!(matches!(
        err,
        LinkError::LocalNewerConflict {
            content: ContentStatus::Different,
            time: TimeStatus::Newer,
            ..
        }
    ));
    assert!(err.is_conflict());
    assert_eq!(fs::read_to_string(&dest).unwrap(), "local edit\n");

    engine.pull(&mut collection, "app.toml", true).unwrap();
    assert_eq!(fs::read_to_string(&dest).unwrap(), "upstream\n");
}

#[test]
fn test_pull_overwrites_older_destination() {
    let fx = fixture();
    let source = fx.shared.join("app.toml");
    write(&source, "v1\n");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    engine
        .add(&mut collection, &source_str(&source), Path::new("app.toml"), false)
        .unwrap();

    write(&source, "v2\n");
    set_mtime(&fx.root.join("app.toml"), 1_500_000_000);
    set_mtime(&source, 1_600_000_000);

    let outcome = engine.pull(&mut collection, "app.toml", false).unwrap();
    assert!(matches!(outcome, SyncOutcome::Applied { .. }));
    assert_eq!(fs::read_to_string(fx.root.join("app.toml")).unwrap(), "v2\n");
}

#[test]
fn test_push_refuses_older_destination_unless_forced() {
    let fx = fixture();
    let source = fx.shared.join("app.toml");
    write(&source, "upstream\n");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    engine
        .add(&mut collection, &source_str(&source), Path::new("app.toml"), true)
        .unwrap();

    let dest = fx.root.join("app.toml");
    write(&dest, "local edit\n");
    set_mtime(&dest, 1_500_000_000);
    set_mtime(&source, 1_600_000_000);
    let local = sig(&dest);

    let err = engine.push(&mut collection, "app.toml", false).unwrap_err();
    assert!(matches!(
        err,
        LinkError::OriginNewerConflict {
            time: TimeStatus::Older,
            ..
        }
    ));
    assert_eq!(fs::read_to_string(&source).unwrap(), "upstream\n");

    let outcome = engine.push(&mut collection, "app.toml", true).unwrap();
    assert_eq!(
        outcome,
        SyncOutcome::Applied {
            hash: local.clone()
        }
    );
    assert_eq!(sig(&source), local);
    assert_eq!(collection.get("app.toml").unwrap().last_hash, Some(local));
}

#[test]
fn test_push_newer_destination() {
    let fx = fixture();
    let source = fx.shared.join("notes.md");
    write(&source, "draft\n");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    engine
        .add(&mut collection, &source_str(&source), Path::new("notes.md"), true)
        .unwrap();

    let dest = fx.root.join("notes.md");
    write(&dest, "final\n");
    set_mtime(&source, 1_500_000_000);
    set_mtime(&dest, 1_600_000_000);

    engine.push(&mut collection, "notes.md", false).unwrap();
    assert_eq!(fs::read_to_string(&source).unwrap(), "final\n");
}

#[cfg(unix)]
#[test]
fn test_push_writes_through_symlinked_source() {
    let fx = fixture();
    let real = fx.shared.join("dotfiles/bashrc");
    write(&real, "old\n");
    let source = fx.shared.join("bashrc");
    std::os::unix::fs::symlink(&real, &source).unwrap();

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    engine
        .add(&mut collection, &source_str(&source), Path::new("bashrc"), true)
        .unwrap();

    let dest = fx.root.join("bashrc");
    write(&dest, "new\n");
    set_mtime(&real, 1_500_000_000);
    set_mtime(&dest, 1_600_000_000);

    engine.push(&mut collection, "bashrc", false).unwrap();
    assert!(fs::symlink_metadata(&source).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_to_string(&real).unwrap(), "new\n");
}

#[test]
fn test_push_empty_destination_is_refused_even_forced() {
    let fx = fixture();
    let source = fx.shared.join("app.toml");
    write(&source, "upstream\n");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    engine
        .add(&mut collection, &source_str(&source), Path::new("app.toml"), true)
        .unwrap();
    write(&fx.root.join("app.toml"), "");

    let err = engine.push(&mut collection, "app.toml", true).unwrap_err();
    assert!(matches!(
        err,
        LinkError::NothingToPush {
            content: ContentStatus::Empty,
            ..
        }
    ));
    assert_eq!(fs::read_to_string(&source).unwrap(), "upstream\n");
}

#[test]
fn test_add_outside_root() {
    let fx = fixture();
    let source = fx.shared.join("app.toml");
    write(&source, "x");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    let outside = fx.shared.join("copy.toml");
    let err = engine
        .add(&mut collection, &source_str(&source), &outside, false)
        .unwrap_err();

    assert!(matches!(err, LinkError::DestinationOutsideRoot { .. }));
    assert!(collection.is_empty());
    assert!(!outside.exists());
}

#[test]
fn test_add_missing_source() {
    let fx = fixture();
    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);

    let missing = fx.shared.join("missing.conf");
    let err = engine
        .add(&mut collection, &source_str(&missing), Path::new("missing.conf"), false)
        .unwrap_err();

    assert!(matches!(err, LinkError::SourceNotFound { .. }));
    assert!(collection.is_empty());
}

#[test]
fn test_add_rejects_paths_with_tabs_or_line_breaks() {
    let fx = fixture();
    let odd = fx.shared.join("odd\tname.txt");
    write(&odd, "x");
    let plain = fx.shared.join("plain.txt");
    write(&plain, "y");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);

    let err = engine
        .add(&mut collection, &source_str(&odd), Path::new("odd.txt"), false)
        .unwrap_err();
    assert!(matches!(err, LinkError::UnstorablePath { .. }));

    let err = engine
        .add(&mut collection, &source_str(&plain), Path::new("line\nbreak.txt"), false)
        .unwrap_err();
    assert!(matches!(err, LinkError::UnstorablePath { .. }));

    assert!(collection.is_empty());
    assert!(!fx.root.join("odd.txt").exists());
    assert!(!fx.root.join(DB_FILE).exists());

    engine
        .add(&mut collection, &source_str(&plain), Path::new("plain.txt"), false)
        .unwrap();
    assert_eq!(Collection::load(&fx.root, DB_FILE).unwrap().len(), 1);
}

#[test]
fn test_add_into_directory_uses_source_name() {
    let fx = fixture();
    let source = fx.shared.join("vimrc");
    write(&source, "set nu\n");
    fs::create_dir_all(fx.root.join("dotfiles")).unwrap();

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    let entry = engine
        .add(&mut collection, &source_str(&source), Path::new("dotfiles"), false)
        .unwrap();

    assert_eq!(entry.destination, "dotfiles/vimrc");
    assert!(fx.root.join("dotfiles/vimrc").is_file());
}

#[test]
fn test_readd_replaces_source() {
    let fx = fixture();
    let first = fx.shared.join("a.conf");
    let second = fx.shared.join("b.conf");
    write(&first, "a");
    write(&second, "b");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    engine
        .add(&mut collection, &source_str(&first), Path::new("app.conf"), false)
        .unwrap();
    engine
        .add(&mut collection, &source_str(&second), Path::new("app.conf"), false)
        .unwrap();

    assert_eq!(collection.len(), 1);
    assert_eq!(collection.get("app.conf").unwrap().source, source_str(&second));

    let reloaded = Collection::load(&fx.root, DB_FILE).unwrap();
    assert_eq!(reloaded.len(), 1);
}

#[test]
fn test_relative_source_inside_root_is_stored_relative() {
    let fx = fixture();
    write(&fx.root.join("templates/app.toml"), "tpl");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    let entry = engine
        .add(&mut collection, "templates/app.toml", Path::new("app.toml"), false)
        .unwrap();

    assert_eq!(entry.source, "templates/app.toml");
    assert_eq!(collection.source_path(&entry), fx.root.join("templates/app.toml"));
}

#[test]
fn test_env_var_source_is_kept_unexpanded() {
    let fx = fixture();
    write(&fx.shared.join("gitconfig"), "[user]\n");
    // SAFETY: variable name is unique to this test.
    unsafe { std::env::set_var("SINK_LINK_TEST_SHARED", &fx.shared) };

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    let entry = engine
        .add(
            &mut collection,
            "$SINK_LINK_TEST_SHARED/gitconfig",
            Path::new("gitconfig"),
            false,
        )
        .unwrap();

    assert_eq!(entry.source, "$SINK_LINK_TEST_SHARED/gitconfig");
    let (content, _) = engine.status(&collection, &entry).unwrap();
    assert_eq!(content, ContentStatus::Same);
}

#[test]
fn test_remove_unknown_link() {
    let fx = fixture();
    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);

    let err = engine
        .remove(&mut collection, Path::new("nope.txt"), false)
        .unwrap_err();
    assert!(matches!(err, LinkError::UnknownLink { .. }));
}

#[test]
fn test_remove_with_delete() {
    let fx = fixture();
    let source = fx.shared.join("app.toml");
    write(&source, "x");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    engine
        .add(&mut collection, &source_str(&source), Path::new("app.toml"), false)
        .unwrap();

    let removed = engine
        .remove(&mut collection, Path::new("app.toml"), true)
        .unwrap();
    assert_eq!(removed.destination, "app.toml");
    assert!(!fx.root.join("app.toml").exists());
    assert!(source.exists());
    assert!(Collection::load(&fx.root, DB_FILE).unwrap().is_empty());
}

#[test]
fn test_remove_keeps_file_when_save_fails() {
    let fx = fixture();
    let source = fx.shared.join("app.toml");
    write(&source, "x");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    engine
        .add(&mut collection, &source_str(&source), Path::new("app.toml"), false)
        .unwrap();

    // A directory in place of the table makes the save fail.
    let db = fx.root.join(DB_FILE);
    fs::remove_file(&db).unwrap();
    fs::create_dir(&db).unwrap();

    assert!(engine
        .remove(&mut collection, Path::new("app.toml"), true)
        .is_err());
    assert!(fx.root.join("app.toml").exists());
    assert!(collection.get("app.toml").is_some());
}

#[test]
fn test_remove_keeps_file_without_delete() {
    let fx = fixture();
    let source = fx.shared.join("app.toml");
    write(&source, "x");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    engine
        .add(&mut collection, &source_str(&source), Path::new("app.toml"), false)
        .unwrap();
    engine
        .remove(&mut collection, Path::new("app.toml"), false)
        .unwrap();

    assert!(fx.root.join("app.toml").exists());
    assert!(collection.is_empty());
}

#[test]
fn test_update_continues_after_failure() {
    let fx = fixture();
    let gone = fx.shared.join("gone.conf");
    let live = fx.shared.join("live.conf");
    write(&gone, "gone");
    write(&live, "v1");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    engine
        .add(&mut collection, &source_str(&gone), Path::new("gone.conf"), false)
        .unwrap();
    engine
        .add(&mut collection, &source_str(&live), Path::new("live.conf"), false)
        .unwrap();

    fs::remove_file(&gone).unwrap();
    write(&live, "v2");
    set_mtime(&fx.root.join("live.conf"), 1_500_000_000);
    set_mtime(&live, 1_600_000_000);

    let report = engine
        .update(Direction::Pull, &mut collection, &[], false)
        .unwrap();

    assert!(!report.is_success());
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "gone.conf");
    assert!(matches!(failures[0].1, LinkError::SourceNotFound { .. }));
    assert_eq!(report.applied().count(), 1);

    assert_eq!(fs::read_to_string(fx.root.join("live.conf")).unwrap(), "v2");
    let reloaded = Collection::load(&fx.root, DB_FILE).unwrap();
    assert_eq!(
        reloaded.get("live.conf").unwrap().last_hash,
        Some(sig(&live))
    );
}

#[test]
fn test_update_selection() {
    let fx = fixture();
    let a = fx.shared.join("a.conf");
    let b = fx.shared.join("b.conf");
    write(&a, "a1");
    write(&b, "b1");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    engine
        .add(&mut collection, &source_str(&a), Path::new("a.conf"), false)
        .unwrap();
    engine
        .add(&mut collection, &source_str(&b), Path::new("b.conf"), false)
        .unwrap();

    write(&a, "a2");
    write(&b, "b2");
    for path in [&a, &b] {
        set_mtime(path, 1_600_000_000);
    }
    for name in ["a.conf", "b.conf"] {
        set_mtime(&fx.root.join(name), 1_500_000_000);
    }

    let report = engine
        .update(
            Direction::Pull,
            &mut collection,
            &[PathBuf::from("a.conf"), PathBuf::from("nope.conf")],
            false,
        )
        .unwrap();

    assert_eq!(report.applied().count(), 1);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0].1, LinkError::UnknownLink { .. }));
    assert_eq!(fs::read_to_string(fx.root.join("a.conf")).unwrap(), "a2");
    assert_eq!(fs::read_to_string(fx.root.join("b.conf")).unwrap(), "b1");
}

#[test]
fn test_status_all_sorted_and_locally_modified() {
    let fx = fixture();
    let a = fx.shared.join("a.conf");
    let b = fx.shared.join("b.conf");
    write(&a, "a");
    write(&b, "b");

    let engine = SyncEngine::with_cwd(&fx.root);
    let mut collection = Collection::new(&fx.root, DB_FILE);
    engine
        .add(&mut collection, &source_str(&b), Path::new("b.conf"), false)
        .unwrap();
    engine
        .add(&mut collection, &source_str(&a), Path::new("a.conf"), false)
        .unwrap();
    write(&fx.root.join("b.conf"), "edited");

    let rows: Vec<_> = engine
        .status_all(&collection)
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].destination, "a.conf");
    assert_eq!(rows[0].content, ContentStatus::Same);
    assert!(!rows[0].locally_modified);
    assert_eq!(rows[1].destination, "b.conf");
    assert_eq!(rows[1].content, ContentStatus::Different);
    assert!(rows[1].locally_modified);
}

#[test]
fn test_init_and_lookup() {
    let fx = fixture();
    let engine = SyncEngine::new();

    let collection = engine.init(&fx.root).unwrap();
    assert_eq!(collection.dbfile(), DB_FILE);
    assert!(fx.root.join(DB_FILE).is_file());

    let nested = fx.root.join("a/b");
    fs::create_dir_all(&nested).unwrap();
    let found = Collection::lookup(&nested).unwrap();
    assert_eq!(found.root(), fx.root.as_path());
    assert!(found.is_empty());

    let err = engine.init(&fx.root).unwrap_err();
    assert!(matches!(err, LinkError::AlreadyInitialized { .. }));
}

#[test]
fn test_init_inside_git_repository() {
    let fx = fixture();
    fs::create_dir_all(fx.root.join(".git")).unwrap();
    let sub = fx.root.join("src");
    fs::create_dir_all(&sub).unwrap();

    let collection = SyncEngine::new().init(&sub).unwrap();
    assert_eq!(collection.root(), fx.root.as_path());
    assert_eq!(collection.dbfile(), DB_FILE_GIT);
    assert!(fx.root.join(".git/sinklinks").is_file());

    let found = Collection::lookup(&sub).unwrap();
    assert_eq!(found.dbfile(), DB_FILE_GIT);
}

#[test]
fn test_lookup_without_collection() {
    let fx = fixture();
    let err = Collection::lookup(&fx.shared).unwrap_err();
    assert!(matches!(err, LinkError::NoCollection { .. }));
}

#[test]
fn test_corrupt_collection_is_rejected() {
    let fx = fixture();
    write(
        &fx.root.join(DB_FILE),
        "# Sink Link Database\nroot:\t/x\ndbfile:\t.sinklinks\nlinks:\t2\nlink:\ta\tb\n# EOF\n",
    );

    let err = Collection::lookup(&fx.root).unwrap_err();
    assert!(matches!(err, LinkError::CorruptCollection { line: 4, .. }));
}
