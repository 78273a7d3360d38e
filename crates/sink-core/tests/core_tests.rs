use sink_core::{
    ContentHash, FilterSpec, Node, NodeMeta, NodeType, Snapshot, SnapshotConfig, SnapshotError,
    Status,
};

fn meta(mtime: f64) -> NodeMeta {
    NodeMeta {
        mode: 0o100644,
        uid: 501,
        gid: 20,
        size: 11,
        ctime: 1_700_000_000.25,
        mtime,
    }
}

#[test]
fn test_snapshot_serialized_shape() {
    let mut builder = Snapshot::builder("/srv/tree");
    builder
        .insert(Node::new(
            "a.txt",
            NodeType::File,
            Some(meta(1_700_000_000.5)),
            Some(ContentHash::of_bytes(b"hello world").to_hex()),
        ))
        .unwrap();
    builder.insert(Node::null("gone.txt")).unwrap();
    let snapshot = builder.build();

    let value = serde_json::to_value(&snapshot).unwrap();
    let a = &value["nodes"]["a.txt"];
    assert_eq!(a["path"], "a.txt");
    assert_eq!(a["type"], 1);
    assert_eq!(a["meta"]["mode"], 0o100644);
    assert_eq!(a["meta"]["mtime"], 1_700_000_000.5);
    assert_eq!(a["sig"].as_str().unwrap().len(), 64);

    let gone = &value["nodes"]["gone.txt"];
    assert_eq!(gone["type"], 0);
    assert!(gone["meta"].is_null());
    assert!(gone["sig"].is_null());
}

#[test]
fn test_snapshot_loads_nodes_only_document() {
    let json = r#"{
        "nodes": {
            "src/lib.rs": {"path": "src/lib.rs", "type": 1,
                "meta": {"mode": 33188, "uid": 0, "gid": 0, "size": 3, "ctime": 1.0, "mtime": 2.0},
                "sig": "abc"},
            "link": {"path": "link", "type": 2, "meta": null, "sig": null}
        }
    }"#;
    let snapshot: Snapshot = serde_json::from_str(json).unwrap();

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.get("link").unwrap().kind, NodeType::Symlink);
    assert_eq!(snapshot.paths_with_signature("abc"), ["src/lib.rs"]);
    assert_eq!(snapshot.get("src/lib.rs").unwrap().meta.unwrap().mtime, 2.0);
}

#[test]
fn test_snapshot_rejects_mismatched_keys() {
    let json = r#"{"nodes": {"a": {"path": "b", "type": 1, "meta": null, "sig": null}}}"#;
    assert!(serde_json::from_str::<Snapshot>(json).is_err());

    let json = r#"{"nodes": {"../a": {"path": "../a", "type": 1, "meta": null, "sig": null}}}"#;
    assert!(serde_json::from_str::<Snapshot>(json).is_err());
}

#[test]
fn test_signature_is_location_independent() {
    let a = ContentHash::of_bytes(b"same bytes");
    let b = ContentHash::of_bytes(b"same bytes");
    let c = ContentHash::of_bytes(b"other bytes");
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_duplicate_error_names_path() {
    let mut builder = Snapshot::builder("/x");
    builder.insert(Node::null("dup")).unwrap();
    let err = builder.insert(Node::null("dup")).unwrap_err();
    assert!(matches!(err, SnapshotError::DuplicatePath { ref path } if path == "dup"));
    assert!(err.to_string().contains("dup"));
}

#[test]
fn test_status_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Status::Origin).unwrap(), "\"origin\"");
    assert_eq!(Status::Changed.symbol(), " ~ ");
}

#[test]
fn test_config_and_filter_spec_deserialize() {
    let config: SnapshotConfig = serde_json::from_str(r#"{"root": "/tmp"}"#).unwrap();
    assert!(config.include_hidden);
    assert!(config.compute_signatures);
    assert!(!config.follow_symlinks);

    let spec: FilterSpec = serde_json::from_str(r#"{"ignores": ["*.pyc"]}"#).unwrap();
    assert_eq!(spec.ignores, vec!["*.pyc".to_string()]);
    assert!(spec.filter_sets.is_empty());
}
