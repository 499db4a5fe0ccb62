use super::*;

/// Seals `inner/` as its own scope with one file.
fn sealed_inner_scope() -> (TempDir, PathRecord) {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("inner").join(MARKER_DIR)).unwrap();

    let mut inner = HistoryForest::load(&temp.path().join("inner")).unwrap();
    seal(&mut inner, &[Sha256], &[("f.txt", "inner content")]).unwrap();
    let root = inner
        .history(HistoryForest::ROOT)
        .latest()
        .unwrap()
        .root
        .clone();
    (temp, root)
}

/// Outer pass that reuses `inner` and hashes `top.txt`.
fn outer_pass(forest: &HistoryForest) -> CommitPlan {
    let mut session = GenerationSession::new(forest, config(&[Sha256]));
    let mut reducers = ReducerSet::new(&session.formats_for(ROOT_PATH, true));

    assert!(!session.is_ignored("inner", true).unwrap());
    let linked = session.link_existing_scope("inner").unwrap().unwrap();
    reducers.add_directory("inner", &linked).unwrap();

    let digests = [Sha256.digest_bytes(b"top")];
    session.record_file("top.txt", 3, 0, &digests).unwrap();
    reducers.add_file("top.txt", &digests).unwrap();

    session
        .record_directory(ROOT_PATH, &reducers.finish().unwrap())
        .unwrap();
    session.finish().unwrap()
}

#[test]
fn test_outer_generation_embeds_inner_root() {
    let (temp, inner_root) = sealed_inner_scope();
    let mut forest = HistoryForest::load(temp.path()).unwrap();
    let inner = forest.scope_at("inner").unwrap();

    let plan = outer_pass(&forest);
    let scopes: Vec<HistoryId> = plan.generations().map(|(id, _)| id).collect();
    assert_eq!(scopes, vec![HistoryForest::ROOT]);
    assert!(
        plan.report()
            .outcomes
            .iter()
            .all(|o| !o.path.starts_with("inner/"))
    );
    plan.commit(&mut forest).unwrap();

    let outer = forest.history(HistoryForest::ROOT).latest().unwrap();
    let linked = outer.record("inner").unwrap();
    assert!(linked.is_directory);
    assert_eq!(linked.hashes.len(), 1);
    assert_eq!(linked.hashes[0].digest, inner_root.hashes[0].digest);
    assert_eq!(linked.hashes[0].structure, inner_root.hashes[0].structure);
    assert_eq!(linked.hashes[0].timestamp, inner_root.hashes[0].timestamp);
    assert_eq!(linked.hashes[0].action, HashAction::Original);
    assert_eq!(
        outer.children,
        vec![ChildScopeRef {
            path: "inner".to_string(),
            generation: 1,
        }]
    );
    assert!(outer.record("inner/f.txt").is_none());
    assert_eq!(forest.history(inner).generations().len(), 1);

    // The outer root folds the inner root exactly as if it had been walked.
    let inner_digest = DirectoryDigest {
        content: inner_root.hashes[0].content_digest(),
        structure: inner_root.hashes[0].structure_digest().unwrap(),
    };
    let mut expected = ReducerSet::new(&[Sha256]);
    expected.add_directory("inner", &[inner_digest]).unwrap();
    expected
        .add_file("top.txt", &[Sha256.digest_bytes(b"top")])
        .unwrap();
    let expected = expected.finish().unwrap();
    assert_eq!(outer.root.hashes[0].digest, expected[0].content.as_str());
}

#[test]
fn test_reused_inner_root_verifies_on_next_outer_pass() {
    let (temp, _) = sealed_inner_scope();
    let mut forest = HistoryForest::load(temp.path()).unwrap();
    outer_pass(&forest).commit(&mut forest).unwrap();

    let report = outer_pass(&forest).commit(&mut forest).unwrap();
    assert!(report.is_clean());
    assert_eq!(
        actions(&report, "inner"),
        vec![(Sha256, HashAction::Verified)]
    );
}

#[test]
fn test_unsealed_nested_scope_is_not_linked() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("inner").join(MARKER_DIR)).unwrap();
    let forest = HistoryForest::load(temp.path()).unwrap();

    let mut session = GenerationSession::new(&forest, config(&[Sha256]));
    assert!(session.link_existing_scope("inner").unwrap().is_none());
    assert!(session.link_existing_scope("not-a-scope").unwrap().is_none());
}

#[test]
fn test_resealed_nested_scope_links_fresh_root() {
    let (temp, _) = sealed_inner_scope();
    let mut forest = HistoryForest::load(temp.path()).unwrap();
    let inner = forest.scope_at("inner").unwrap();

    let plan = run_pass(
        &forest,
        config(&[Sha256]),
        &[("inner/f.txt", "inner content"), ("top.txt", "top")],
    )
    .unwrap();

    // The inner file is decided against the inner scope's own history.
    assert_eq!(
        actions(plan.report(), "inner/f.txt"),
        vec![(Sha256, HashAction::Verified)]
    );
    let scopes: Vec<HistoryId> = plan.generations().map(|(id, _)| id).collect();
    assert_eq!(scopes, vec![inner, HistoryForest::ROOT]);

    plan.commit(&mut forest).unwrap();

    let inner_latest = forest.history(inner).latest().unwrap();
    assert_eq!(inner_latest.number, 2);
    let outer = forest.history(HistoryForest::ROOT).latest().unwrap();
    assert_eq!(
        outer.children,
        vec![ChildScopeRef {
            path: "inner".to_string(),
            generation: 2,
        }]
    );
    assert_eq!(
        outer.record("inner").unwrap().hashes[0].digest,
        inner_latest.root.hashes[0].digest
    );
    assert!(outer.record("inner/f.txt").is_none());
}
