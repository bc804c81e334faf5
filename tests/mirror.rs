mod support;

use assert_matches::assert_matches;

use ocads_mirror::aggregate::{AggregateOutcome, DatasetAggregator};
use ocads_mirror::error::MirrorError;
use ocads_mirror::listing::NavigationFilter;
use ocads_mirror::state::StateStore;
use ocads_mirror::tree::{TraversalPolicy, TreeMirror};

use support::{DATA_URL, MockRemote, descriptor, scenario_remote, settings, tree_of, workspace};

#[test]
fn scenario_a_mirrors_metadata_and_data_tree() {
    let (_temp, root) = workspace();
    let remote = scenario_remote(MockRemote::new(), "X1");
    let state = StateStore::new(root.join("state.json"));
    let settings = settings(&root);
    let aggregator = DatasetAggregator::new(&remote, &state, &settings);

    let outcome = aggregator.aggregate(&descriptor("X1", false)).unwrap();

    assert_matches!(outcome, AggregateOutcome::Mirrored { ref metadata_files, ref data_files } => {
        assert_eq!(metadata_files.len(), 2);
        assert_eq!(data_files.len(), 2);
    });
    assert_eq!(
        tree_of(&root.join("X1")),
        vec![
            "data/",
            "data/a.csv",
            "data/sub/",
            "data/sub/b.csv",
            "metadata/",
            "metadata/iso.xml",
            "metadata/ocads.xml",
        ]
    );
    assert!(state.load().unwrap().contains("X1"));
}

#[test]
fn scenario_b_rerun_makes_no_calls() {
    let (_temp, root) = workspace();
    let state = StateStore::new(root.join("state.json"));
    let settings = settings(&root);

    let first = scenario_remote(MockRemote::new(), "X1");
    DatasetAggregator::new(&first, &state, &settings)
        .aggregate(&descriptor("X1", false))
        .unwrap();
    let before = std::fs::read(state.path().as_std_path()).unwrap();

    let second = scenario_remote(MockRemote::new(), "X1");
    let outcome = DatasetAggregator::new(&second, &state, &settings)
        .aggregate(&descriptor("X1", false))
        .unwrap();

    assert_eq!(outcome, AggregateOutcome::Skipped);
    assert_eq!(second.call_count(), 0);
    assert_eq!(std::fs::read(state.path().as_std_path()).unwrap(), before);
}

#[test]
fn unrecorded_folder_is_mirrored_again() {
    let (_temp, root) = workspace();
    std::fs::create_dir_all(root.join("X1/data").as_std_path()).unwrap();
    let remote = scenario_remote(MockRemote::new(), "X1");
    let state = StateStore::new(root.join("state.json"));
    let settings = settings(&root);

    let outcome = DatasetAggregator::new(&remote, &state, &settings)
        .aggregate(&descriptor("X1", false))
        .unwrap();

    assert_matches!(outcome, AggregateOutcome::Mirrored { .. });
    assert_eq!(remote.downloads().len(), 4);
}

#[test]
fn recorded_but_missing_folder_is_mirrored_again() {
    let (_temp, root) = workspace();
    let state = StateStore::new(root.join("state.json"));
    state.record(&"X1".parse().unwrap()).unwrap();
    let remote = scenario_remote(MockRemote::new(), "X1");
    let settings = settings(&root);

    let outcome = DatasetAggregator::new(&remote, &state, &settings)
        .aggregate(&descriptor("X1", false))
        .unwrap();

    assert_matches!(outcome, AggregateOutcome::Mirrored { .. });
    assert!(root.join("X1/data/sub/b.csv").as_std_path().is_file());
}

#[test]
fn lonlat_document_is_fetched_only_when_listed() {
    let (_temp, root) = workspace();
    let remote = scenario_remote(MockRemote::new(), "X1");
    let state = StateStore::new(root.join("state.json"));
    let settings = settings(&root);

    DatasetAggregator::new(&remote, &state, &settings)
        .aggregate(&descriptor("X1", true))
        .unwrap();

    assert!(root.join("X1/metadata/X1_lonlat.txt").as_std_path().is_file());
    assert!(remote.downloads().iter().any(|url| url.ends_with("X1_lonlat.txt")));

    let (_temp, root) = workspace();
    let remote = scenario_remote(MockRemote::new(), "X2");
    let state = StateStore::new(root.join("state.json"));
    let settings = support::settings(&root);
    DatasetAggregator::new(&remote, &state, &settings)
        .aggregate(&descriptor("X2", false))
        .unwrap();
    assert!(!remote.downloads().iter().any(|url| url.contains("lonlat")));
}

#[test]
fn failed_metadata_download_aborts_dataset() {
    let (_temp, root) = workspace();
    let remote = scenario_remote(MockRemote::new(), "X1")
        .failing("https://example.org/ocads/metadata/X1/ocads.xml");
    let state = StateStore::new(root.join("state.json"));
    let settings = settings(&root);

    let err = DatasetAggregator::new(&remote, &state, &settings)
        .aggregate(&descriptor("X1", false))
        .unwrap_err();

    assert_matches!(err, MirrorError::DownloadStatus { status: 500, .. });
    assert!(remote.fetches().is_empty());
    assert!(root.join("X1/metadata/iso.xml").as_std_path().is_file());
    assert!(state.load().unwrap().is_empty());
}

#[test]
fn failed_data_download_leaves_partial_tree_and_no_record() {
    let (_temp, root) = workspace();
    let remote = scenario_remote(MockRemote::new(), "X1")
        .failing(&format!("{DATA_URL}X1/sub/b.csv"));
    let state = StateStore::new(root.join("state.json"));
    let settings = settings(&root);

    let err = DatasetAggregator::new(&remote, &state, &settings)
        .aggregate(&descriptor("X1", false))
        .unwrap_err();

    assert_matches!(err, MirrorError::DownloadStatus { .. });
    assert!(root.join("X1/data/a.csv").as_std_path().is_file());
    assert!(!state.load().unwrap().contains("X1"));
}

#[test]
fn abort_policy_stops_at_first_error() {
    let (_temp, root) = workspace();
    let base = format!("{DATA_URL}T/");
    let remote = MockRemote::new()
        .with_listing(&base, &["first/", "second/", "z.csv"])
        .with_listing(&format!("{base}first/"), &["bad.csv", "after.csv"])
        .with_listing(&format!("{base}second/"), &["c.csv"])
        .with_file(&format!("{base}first/after.csv"), b"x")
        .with_file(&format!("{base}second/c.csv"), b"x")
        .with_file(&format!("{base}z.csv"), b"x")
        .failing(&format!("{base}first/bad.csv"));

    let report = TreeMirror::new(&remote, NavigationFilter::default(), TraversalPolicy::Abort)
        .mirror(&base, &root);

    assert_eq!(report.errors.len(), 1);
    assert!(report.files.is_empty());
    assert_eq!(remote.downloads(), vec![format!("{base}first/bad.csv")]);
    assert!(!root.join("second").as_std_path().exists());
}

#[test]
fn continue_policy_mirrors_siblings_and_collects_errors() {
    let (_temp, root) = workspace();
    let base = format!("{DATA_URL}T/");
    let remote = MockRemote::new()
        .with_listing(&base, &["first/", "second/", "missing/", "z.csv"])
        .with_listing(&format!("{base}first/"), &["bad.csv", "after.csv"])
        .with_listing(&format!("{base}second/"), &["c.csv"])
        .with_file(&format!("{base}first/after.csv"), b"x")
        .with_file(&format!("{base}second/c.csv"), b"x")
        .with_file(&format!("{base}z.csv"), b"x")
        .failing(&format!("{base}first/bad.csv"));

    let report = TreeMirror::new(&remote, NavigationFilter::default(), TraversalPolicy::Continue)
        .mirror(&base, &root);

    assert!(!report.is_complete());
    assert_eq!(report.errors.len(), 2);
    assert_matches!(report.errors[1], MirrorError::FetchStatus { status: 404, .. });
    assert_eq!(
        tree_of(&root),
        vec![
            "first/",
            "first/after.csv",
            "missing/",
            "second/",
            "second/c.csv",
            "z.csv",
        ]
    );
}

#[test]
fn mirror_reproduces_nested_tree_exactly() {
    let (_temp, root) = workspace();
    let base = format!("{DATA_URL}N/");
    let remote = MockRemote::new()
        .with_listing(&base, &["d1/", "top.txt"])
        .with_listing(&format!("{base}d1/"), &["d2/", "one.nc"])
        .with_listing(&format!("{base}d1/d2/"), &["two.nc", "three.nc"])
        .with_file(&format!("{base}top.txt"), b"t")
        .with_file(&format!("{base}d1/one.nc"), b"1")
        .with_file(&format!("{base}d1/d2/two.nc"), b"2")
        .with_file(&format!("{base}d1/d2/three.nc"), b"3");

    let files = TreeMirror::new(&remote, NavigationFilter::default(), TraversalPolicy::Abort)
        .mirror(&base, &root)
        .into_result()
        .unwrap();

    assert_eq!(files.len(), 4);
    assert_eq!(
        tree_of(&root),
        vec![
            "d1/",
            "d1/d2/",
            "d1/d2/three.nc",
            "d1/d2/two.nc",
            "d1/one.nc",
            "top.txt",
        ]
    );
    assert_eq!(
        remote.fetches(),
        vec![base.clone(), format!("{base}d1/"), format!("{base}d1/d2/")]
    );
}

#[test]
fn mirror_redownloads_existing_files() {
    let (_temp, root) = workspace();
    let base = format!("{DATA_URL}R/");
    let remote = MockRemote::new()
        .with_listing(&base, &["a.csv"])
        .with_file(&format!("{base}a.csv"), b"fresh");
    std::fs::write(root.join("a.csv").as_std_path(), b"stale").unwrap();

    TreeMirror::new(&remote, NavigationFilter::default(), TraversalPolicy::Abort)
        .mirror(&base, &root)
        .into_result()
        .unwrap();

    assert_eq!(remote.downloads().len(), 1);
    assert_eq!(std::fs::read(root.join("a.csv").as_std_path()).unwrap(), b"fresh");
}
