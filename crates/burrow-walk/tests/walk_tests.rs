use burrow_walk::{
    ConfigError, Entry, EntryType, FilterKey, FilterSpec, MemoryFs, Pulled, WalkError, WalkEvent,
    WalkOptions, WalkState, start_walk, traverse, traverse_with, walk_collect,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn paths(entries: &[Entry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.path.to_string_lossy().to_string())
        .collect()
}

fn sorted(mut v: Vec<String>) -> Vec<String> {
    v.sort();
    v
}

fn options(entry_type: EntryType) -> WalkOptions {
    WalkOptions {
        entry_type,
        ..WalkOptions::default()
    }
}

async fn walk_memory(fs: &Arc<MemoryFs>, options: WalkOptions) -> Vec<String> {
    let walker = traverse_with("/r", options, fs.clone()).unwrap();
    paths(&walker.collect().await.unwrap())
}

fn nested_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("a/b")).unwrap();
    fs::write(temp.path().join("a/b/c.txt"), "c").unwrap();
    temp
}

#[tokio::test]
async fn test_flat_root_files_and_directories() {
    let temp = TempDir::new().unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(temp.path().join(name), name).unwrap();
    }

    let entries = walk_collect(temp.path(), options(EntryType::Files)).await.unwrap();
    let mut by_name: Vec<_> = entries
        .iter()
        .map(|e| (e.basename.to_string(), e.path.clone(), e.full_path.clone()))
        .collect();
    by_name.sort();

    assert_eq!(by_name.len(), 3);
    for (name, path, full_path) in by_name {
        assert_eq!(path, Path::new(&name));
        assert_eq!(full_path, temp.path().join(&name));
    }

    let entries = walk_collect(temp.path(), options(EntryType::Directories))
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_nested_file_found() {
    let temp = nested_tree();
    let entries = walk_collect(temp.path(), WalkOptions::default()).await.unwrap();

    assert_eq!(paths(&entries), vec!["a/b/c.txt"]);
    assert_eq!(entries[0].basename, "c.txt");
    assert_eq!(entries[0].full_path, temp.path().join("a/b/c.txt"));
}

#[tokio::test]
async fn test_nested_directories_only() {
    let temp = nested_tree();
    let entries = walk_collect(temp.path(), options(EntryType::Directories))
        .await
        .unwrap();

    assert_eq!(paths(&entries), vec!["a", "a/b"]);
    assert!(entries.iter().all(|e| e.info.is_dir()));
}

#[tokio::test]
async fn test_depth_limits_expansion() {
    let temp = nested_tree();
    fs::write(temp.path().join("top.txt"), "t").unwrap();

    let at_depth = |depth: u32| WalkOptions {
        depth,
        entry_type: EntryType::FilesDirectories,
        ..WalkOptions::default()
    };

    let entries = walk_collect(temp.path(), at_depth(0)).await.unwrap();
    assert_eq!(sorted(paths(&entries)), vec!["a", "top.txt"]);

    let entries = walk_collect(temp.path(), at_depth(1)).await.unwrap();
    assert_eq!(sorted(paths(&entries)), vec!["a", "a/b", "top.txt"]);

    let entries = walk_collect(temp.path(), at_depth(2)).await.unwrap();
    assert_eq!(
        sorted(paths(&entries)),
        vec!["a", "a/b", "a/b/c.txt", "top.txt"]
    );
}

#[tokio::test]
async fn test_empty_directory_yields_nothing() {
    let temp = TempDir::new().unwrap();
    let walker = traverse(temp.path(), options(EntryType::All)).unwrap();
    let report = walker.collect_report().await.unwrap();

    assert!(report.entries.is_empty());
    assert!(report.warnings.is_empty());
    assert_eq!(report.stats.directories_listed, 1);
}

#[tokio::test]
async fn test_relative_root_is_made_absolute() {
    let walker = traverse(".", WalkOptions::default()).unwrap();
    assert!(walker.root().is_absolute());
}

#[tokio::test]
async fn test_config_errors() {
    let err = traverse("", WalkOptions::default()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidArgument { .. }));

    let bad_glob = WalkOptions {
        file_filter: "[".into(),
        ..WalkOptions::default()
    };
    let err = traverse("/tmp", bad_glob).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidGlob { .. }));
}

#[tokio::test]
async fn test_file_filter_scenarios() {
    let fs = Arc::new(MemoryFs::new());
    for name in ["a.js", "b.txt", "c.js", "d.js", "e.rb"] {
        fs.add_file(Path::new("/r").join(name), 1);
    }
    let with_filter = |filter: FilterSpec| WalkOptions {
        file_filter: filter,
        ..WalkOptions::default()
    };

    assert_eq!(
        walk_memory(&fs, with_filter("*.js".into())).await,
        vec!["a.js", "c.js", "d.js"]
    );
    assert_eq!(
        walk_memory(&fs, with_filter(["!d.js"].into())).await,
        vec!["a.js", "b.txt", "c.js", "e.rb"]
    );
    assert_eq!(
        walk_memory(&fs, with_filter(["*.js", "!d.js"].into())).await,
        vec!["a.js", "c.js"]
    );
    assert_eq!(
        walk_memory(
            &fs,
            with_filter(FilterSpec::predicate(|e: &Entry| e.basename.ends_with(".rb")))
        )
        .await,
        vec!["e.rb"]
    );
}

#[tokio::test]
async fn test_directory_filter_prunes_subtree() {
    let fs = Arc::new(MemoryFs::new());
    fs.add_file("/r/node_modules/dep/index.js", 1)
        .add_file("/r/src/main.js", 1)
        .add_file("/r/top.js", 1);

    let opts = WalkOptions {
        directory_filter: "!node_modules".into(),
        ..WalkOptions::default()
    };
    let walker = traverse_with("/r", opts, fs.clone()).unwrap();
    let report = walker.collect_report().await.unwrap();

    assert_eq!(paths(&report.entries), vec!["top.js", "src/main.js"]);
    // Pruned directories are never listed.
    assert_eq!(report.stats.directories_listed, 2);
}

#[tokio::test]
async fn test_path_key_filters_relative_paths() {
    let fs = Arc::new(MemoryFs::new());
    fs.add_file("/r/src/lib.js", 1)
        .add_file("/r/src/deep/inner.js", 1)
        .add_file("/r/lib.js", 1);

    let opts = WalkOptions {
        file_filter: "src/*.js".into(),
        filter_entry_key: FilterKey::Path,
        ..WalkOptions::default()
    };
    assert_eq!(walk_memory(&fs, opts).await, vec!["src/lib.js"]);
}

#[tokio::test]
async fn test_depth_first_most_recent_first() {
    let fs = Arc::new(MemoryFs::new());
    fs.add_file("/r/x/1.txt", 1)
        .add_file("/r/y/2.txt", 1)
        .add_file("/r/z.txt", 1);

    assert_eq!(
        walk_memory(&fs, WalkOptions::default()).await,
        vec!["z.txt", "y/2.txt", "x/1.txt"]
    );
}

#[tokio::test]
async fn test_other_nodes_only_with_all() {
    let fs = Arc::new(MemoryFs::new());
    fs.add_file("/r/f", 1).add_other("/r/sock");

    assert_eq!(walk_memory(&fs, options(EntryType::Files)).await, vec!["f"]);
    assert_eq!(
        walk_memory(&fs, options(EntryType::All)).await,
        vec!["f", "sock"]
    );

    let walker = traverse_with("/r", options(EntryType::All), fs.clone()).unwrap();
    assert_eq!(walker.collect_report().await.unwrap().stats.others, 1);
}

#[tokio::test]
async fn test_broken_symlink_is_a_warning() {
    let fs = Arc::new(MemoryFs::new());
    fs.add_file("/r/a", 1).add_symlink("/r/dangling", "/r/gone");

    let walker = traverse_with("/r", options(EntryType::All), fs.clone()).unwrap();
    let report = walker.collect_report().await.unwrap();

    assert_eq!(paths(&report.entries), vec!["a"]);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].code(), "ENOENT");
    assert_eq!(report.warnings[0].path(), Path::new("/r/dangling"));
}

#[tokio::test]
async fn test_missing_root_warns_and_ends() {
    let fs = Arc::new(MemoryFs::new());
    let walker = traverse_with("/missing", WalkOptions::default(), fs).unwrap();
    let report = walker.collect_report().await.unwrap();

    assert!(report.entries.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(report.warnings[0], WalkError::NotFound { .. }));
}

#[tokio::test]
async fn test_deleted_between_listing_and_stat() {
    let fs = Arc::new(MemoryFs::new());
    fs.add_file("/r/sub/a", 1).add_file("/r/sub/b", 1);
    let opts = WalkOptions {
        always_stat: true,
        ..WalkOptions::default()
    };
    let mut walker = traverse_with("/r", opts, fs.clone()).unwrap();

    let first = walker.request_next(1).await.unwrap().unwrap();
    assert!(matches!(&first[..], [Pulled::Entry(e)] if e.path == Path::new("sub/a")));

    fs.remove("/r/sub/b");

    let second = walker.request_next(1).await.unwrap().unwrap();
    assert!(matches!(&second[..], [Pulled::Warning(WalkError::NotFound { .. })]));
    assert!(walker.request_next(1).await.unwrap().is_none());
    assert_eq!(walker.state(), WalkState::Finished);
}

#[tokio::test]
async fn test_unreadable_directory() {
    let fs = Arc::new(MemoryFs::new());
    fs.add_file("/r/a", 1)
        .add_file("/r/locked/secret", 1)
        .deny("/r/locked");

    let walker = traverse_with("/r", WalkOptions::default(), fs.clone()).unwrap();
    let report = walker.collect_report().await.unwrap();
    assert_eq!(paths(&report.entries), vec!["a"]);
    assert_eq!(report.warnings[0].code(), "EACCES");

    let strict = WalkOptions {
        suppress_normal_flow_error: false,
        ..WalkOptions::default()
    };
    let walker = traverse_with("/r", strict, fs.clone()).unwrap();
    let err = walker.collect().await.unwrap_err();
    assert!(matches!(err, WalkError::PermissionDenied { .. }));
}

#[tokio::test]
async fn test_followed_symlink_loop_in_stat_mode() {
    let fs = Arc::new(MemoryFs::new());
    fs.add_file("/r/a", 1).add_symlink("/r/sub/up", "/r");
    let opts = WalkOptions {
        always_stat: true,
        ..WalkOptions::default()
    };

    let walker = traverse_with("/r", opts, fs.clone()).unwrap();
    let report = walker.collect_report().await.unwrap();

    assert_eq!(paths(&report.entries), vec!["a"]);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].code(), "ERECURSIVE");
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_chain_loop() {
    let fs = Arc::new(MemoryFs::new());
    fs.add_symlink("/r/a", "/r/b").add_symlink("/r/b", "/r/a");

    let walker = traverse_with("/r", options(EntryType::All), fs).unwrap();
    let report = walker.collect_report().await.unwrap();

    assert!(report.entries.is_empty());
    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings.iter().all(|w| w.code() == "ELOOP"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_directory_outside_root() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    let outside = temp.path().join("outside");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&outside).unwrap();
    fs::write(outside.join("x.txt"), "x").unwrap();
    fs::write(root.join("a.txt"), "a").unwrap();
    std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();
    std::os::unix::fs::symlink(root.join("a.txt"), root.join("alias.txt")).unwrap();

    let entries = walk_collect(&root, WalkOptions::default()).await.unwrap();
    assert_eq!(
        sorted(paths(&entries)),
        vec!["a.txt", "alias.txt", "link/x.txt"]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_circular_symlink_on_disk() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("sub")).unwrap();
    fs::write(temp.path().join("sub/file.txt"), "f").unwrap();
    std::os::unix::fs::symlink(temp.path(), temp.path().join("sub/up")).unwrap();

    for always_stat in [false, true] {
        let opts = WalkOptions {
            always_stat,
            ..WalkOptions::default()
        };
        let walker = traverse(temp.path(), opts).unwrap();
        let report = walker.collect_report().await.unwrap();

        assert_eq!(paths(&report.entries), vec!["sub/file.txt"]);
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(
            report.warnings[0],
            WalkError::CircularSymlink { .. }
        ));
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_lstat_mode_reports_links() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("target.txt"), "hello").unwrap();
    std::os::unix::fs::symlink(temp.path().join("target.txt"), temp.path().join("link.txt"))
        .unwrap();

    let opts = WalkOptions {
        always_stat: true,
        lstat: true,
        ..WalkOptions::default()
    };
    let entries = walk_collect(temp.path(), opts).await.unwrap();
    let link = entries
        .iter()
        .find(|e| e.basename == "link.txt")
        .unwrap();

    assert!(link.stats().unwrap().is_symlink());
    let target = entries
        .iter()
        .find(|e| e.basename == "target.txt")
        .unwrap();
    assert_eq!(target.stats().unwrap().size, 5);
}

#[cfg(unix)]
#[tokio::test]
async fn test_non_utf8_name_keeps_raw_path() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let name = OsStr::from_bytes(b"bad\xffname");
    let fs = Arc::new(MemoryFs::new());
    fs.add_file(Path::new("/r").join(name), 1);

    let opts = WalkOptions {
        file_filter: FilterSpec::from("bad\u{FFFD}name"),
        ..WalkOptions::default()
    };
    let walker = traverse_with("/r", opts, fs).unwrap();
    let entries = walker.collect().await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].basename, "bad\u{FFFD}name");
    assert_eq!(entries[0].path.as_os_str(), name);
    assert_eq!(entries[0].full_path, Path::new("/r").join(name));
}

#[tokio::test]
async fn test_push_events_end_once() {
    let temp = nested_tree();
    fs::write(temp.path().join("one.txt"), "1").unwrap();

    let mut events = start_walk(traverse(temp.path(), WalkOptions::default()).unwrap());
    let mut data = Vec::new();
    let mut ends = 0;
    while let Some(event) = events.recv().await {
        match event {
            WalkEvent::Data(entry) => data.push(entry),
            WalkEvent::End => ends += 1,
            WalkEvent::Warn(err) | WalkEvent::Error(err) => panic!("unexpected: {err}"),
        }
    }

    assert_eq!(sorted(paths(&data)), vec!["a/b/c.txt", "one.txt"]);
    assert_eq!(ends, 1);
}

#[tokio::test]
async fn test_push_error_is_terminal() {
    let fs = Arc::new(MemoryFs::new());
    fs.add_file("/r/a", 1).add_dir("/r/locked").deny("/r/locked");
    let strict = WalkOptions {
        suppress_normal_flow_error: false,
        ..WalkOptions::default()
    };

    let mut events = start_walk(traverse_with("/r", strict, fs).unwrap());
    let mut kinds = Vec::new();
    while let Some(event) = events.recv().await {
        kinds.push(match event {
            WalkEvent::Data(_) => "data",
            WalkEvent::Warn(_) => "warn",
            WalkEvent::Error(_) => "error",
            WalkEvent::End => "end",
        });
    }
    assert_eq!(kinds, vec!["data", "error"]);
}

#[tokio::test]
async fn test_other_fs_errors_are_fatal_by_default() {
    let fs = Arc::new(MemoryFs::new());
    fs.add_file("/r", 1);

    let walker = traverse_with("/r", WalkOptions::default(), fs.clone()).unwrap();
    let err = walker.collect().await.unwrap_err();
    assert!(matches!(err, WalkError::Io { .. }));
    assert_eq!(err.code(), "EIO");

    let mut events = start_walk(traverse_with("/r", WalkOptions::default(), fs).unwrap());
    let mut kinds = Vec::new();
    while let Some(event) = events.recv().await {
        kinds.push(match event {
            WalkEvent::Data(_) => "data",
            WalkEvent::Warn(_) => "warn",
            WalkEvent::Error(_) => "error",
            WalkEvent::End => "end",
        });
    }
    assert_eq!(kinds, vec!["error"]);
}

#[tokio::test]
async fn test_cancelled_push_walk_sends_no_end() {
    let fs = Arc::new(MemoryFs::new());
    for i in 0..500 {
        fs.add_file(format!("/r/f{i:03}"), 1);
    }
    let opts = WalkOptions {
        high_water_mark: 10,
        ..WalkOptions::default()
    };
    let walker = traverse_with("/r", opts, fs).unwrap();
    let token = walker.cancel_token();

    let mut events = start_walk(walker);
    assert!(matches!(events.recv().await, Some(WalkEvent::Data(_))));
    token.cancel();

    let mut received = 1;
    while let Some(event) = events.recv().await {
        assert!(matches!(event, WalkEvent::Data(_)));
        received += 1;
    }
    assert!(received < 500);
}

#[tokio::test]
async fn test_independent_walks() {
    let fs = Arc::new(MemoryFs::new());
    fs.add_file("/r/a", 1).add_file("/r/d/b", 1);

    let first = traverse_with("/r", WalkOptions::default(), fs.clone()).unwrap();
    let second = traverse_with("/r", WalkOptions::default(), fs.clone()).unwrap();
    let (first, second) = tokio::join!(first.collect(), second.collect());

    assert_eq!(paths(&first.unwrap()), vec!["a", "d/b"]);
    assert_eq!(paths(&second.unwrap()), vec!["a", "d/b"]);
}
