use super::*;

#[test]
fn test_empty_directory_sealed_twice() {
    let temp = TempDir::new().unwrap();
    let mut forest = HistoryForest::load(temp.path()).unwrap();

    let first = seal(&mut forest, &[Sha256], &[]).unwrap();
    assert!(first.is_clean());
    assert_eq!(actions(&first, ROOT_PATH), vec![(Sha256, HashAction::Original)]);

    let second = seal(&mut forest, &[Sha256], &[]).unwrap();
    assert!(second.is_clean());
    assert!(!second.outcomes.is_empty());
    assert!(
        second
            .outcomes
            .iter()
            .all(|o| o.action == HashAction::Verified)
    );
    assert_eq!(generation_count(&forest), 2);

    let root = &forest.history(HistoryForest::ROOT).latest().unwrap().root;
    let empty = Sha256.digest_bytes(b"");
    assert_eq!(root.hashes[0].digest, empty.as_str());
    assert_eq!(root.hashes[0].structure.as_deref(), Some(empty.as_str()));
}

#[test]
fn test_unchanged_tree_verifies() {
    let temp = TempDir::new().unwrap();
    let mut forest = HistoryForest::load(temp.path()).unwrap();
    let files = [("a.txt", "alpha"), ("docs/b.md", "beta"), ("docs/deep/c", "gamma")];

    let first = seal(&mut forest, &[Sha256, Xxh3], &files).unwrap();
    assert_eq!(first.count(HashAction::Original), first.outcomes.len());

    let second = seal(&mut forest, &[Sha256, Xxh3], &files).unwrap();
    assert!(second.is_clean());
    assert_eq!(second.count(HashAction::Verified), second.outcomes.len());
    // Three files and three directories in two formats.
    assert_eq!(second.outcomes.len(), 12);
}

#[test]
fn test_appended_file_fails_then_new_format_is_refused() {
    let temp = TempDir::new().unwrap();
    let mut forest = HistoryForest::load(temp.path()).unwrap();

    seal(&mut forest, &[Sha256], &[("a.txt", "hello")]).unwrap();

    // Content failures are reported but still committed.
    let second = seal(&mut forest, &[Sha256], &[("a.txt", "hello, appended")]).unwrap();
    assert_eq!(actions(&second, "a.txt"), vec![(Sha256, HashAction::Failed)]);
    assert_eq!(
        failure_kinds(&second, "a.txt"),
        vec![FailureKind::ContentMismatch(Sha256)]
    );
    assert_eq!(
        failure_kinds(&second, ROOT_PATH),
        vec![FailureKind::DirectoryMismatch(Sha256)]
    );
    assert_eq!(
        second.worst_category(),
        Some(FailureCategory::ContentMismatch)
    );
    assert_eq!(generation_count(&forest), 2);
    assert_eq!(
        latest_record(&forest, "a.txt").hashes[0].action,
        HashAction::Failed
    );

    // Adding a format cannot be confirmed by the still-failing original one.
    let plan = run_pass(&forest, config(&[Blake3]), &[("a.txt", "hello, appended")]).unwrap();
    assert_eq!(
        actions(plan.report(), "a.txt"),
        vec![(Sha256, HashAction::Failed), (Blake3, HashAction::New)]
    );

    let violations = match plan.commit(&mut forest) {
        Err(SessionError::UnverifiedNew(violations)) => violations,
        other => panic!("Expected UnverifiedNew, got {other:?}"),
    };
    assert!(violations.contains(&Violation {
        path: "a.txt".to_string(),
        format: Blake3,
    }));
    assert!(violations.contains(&Violation {
        path: ROOT_PATH.to_string(),
        format: Blake3,
    }));

    assert_eq!(generation_count(&forest), 2);
    assert!(
        !temp
            .path()
            .join(MARKER_DIR)
            .join(generation_file::file_name(3))
            .exists()
    );
    let reloaded = HistoryForest::load(temp.path()).unwrap();
    assert_eq!(generation_count(&reloaded), 2);
}

#[test]
fn test_new_format_promoted_when_confirmed() {
    let temp = TempDir::new().unwrap();
    let mut forest = HistoryForest::load(temp.path()).unwrap();
    let files = [("a.txt", "hello"), ("sub/b.txt", "world")];

    seal(&mut forest, &[Sha256], &files).unwrap();

    let plan = run_pass(&forest, config(&[ContentId]), &files).unwrap();
    assert_eq!(
        actions(plan.report(), "sub/b.txt"),
        vec![(Sha256, HashAction::Verified), (ContentId, HashAction::New)]
    );
    let report = plan.commit(&mut forest).unwrap();
    assert!(report.is_clean());

    let record = latest_record(&forest, "sub/b.txt");
    assert_eq!(record.entry(ContentId).unwrap().action, HashAction::Verified);
    assert_eq!(record.entry(Sha256).unwrap().action, HashAction::Verified);

    // The promoted format now verifies on its own.
    let third = seal(&mut forest, &[ContentId], &files).unwrap();
    assert!(third.is_clean());
    assert_eq!(
        actions(&third, "a.txt"),
        vec![(ContentId, HashAction::Verified)]
    );
}

#[test]
fn test_new_without_trusted_sibling_is_rejected() {
    let temp = TempDir::new().unwrap();
    let mut forest = HistoryForest::load(temp.path()).unwrap();
    seal(&mut forest, &[Sha256], &[("a.txt", "hello")]).unwrap();

    let mut record = PathRecord::new("a.txt", false);
    record.set_entry(HashEntry {
        format: Blake3,
        digest: Blake3.digest_bytes(b"hello").as_str().to_string(),
        action: HashAction::New,
        structure: None,
        timestamp: Utc::now(),
    });
    let generation = Generation {
        number: 2,
        ignore: Vec::new(),
        creator: Creator::current(Utc::now()),
        root: PathRecord::new(ROOT_PATH, true),
        children: Vec::new(),
        records: vec![record],
    };
    let plan = CommitPlan::new(
        vec![(HistoryForest::ROOT, generation)],
        SessionReport::default(),
    );

    assert!(matches!(
        plan.commit(&mut forest),
        Err(SessionError::UnverifiedNew(_))
    ));
    assert_eq!(generation_count(&forest), 1);
}

/// Many passes with shifting formats and content never record `Original`
/// twice for the same path and format.
///
/// Formats are only introduced while every already recorded path still
/// matches its first digests, so each introduction can be confirmed.
/// Content changes happen on passes that only use recorded formats.
#[test]
fn test_original_recorded_at_most_once() {
    let temp = TempDir::new().unwrap();
    let mut forest = HistoryForest::load(temp.path()).unwrap();

    let base: &[(&str, &str)] = &[("a.txt", "v1"), ("dir/c.txt", "c")];
    let changed: &[(&str, &str)] = &[("a.txt", "changed"), ("dir/c.txt", "c")];
    let grown: &[(&str, &str)] = &[
        ("a.txt", "changed"),
        ("b.txt", "late"),
        ("dir/c.txt", "c"),
        ("dir/sub/d.txt", "d"),
    ];

    let plan: [(&[HashFormat], &[(&str, &str)]); 8] = [
        (&[Sha256], base),
        (&[Blake3], base),
        (&[Sha256, Xxh3], base),
        (&[ContentId], base),
        (&[Sha256], changed),
        (&[Blake3, Xxh3], grown),
        (&[Sha256, Blake3, Xxh3, ContentId], grown),
        (&[Sha256], base),
    ];

    for (pass, (formats, files)) in plan.iter().enumerate() {
        if let Err(e) = seal(&mut forest, formats, files) {
            panic!("Pass {pass} was not committed: {e}");
        }
    }

    let reloaded = HistoryForest::load(temp.path()).unwrap();
    let history = reloaded.history(HistoryForest::ROOT);
    assert_eq!(history.generations().len(), plan.len());

    // The tree is back to its first state, so the root verifies again.
    let root = &history.latest().unwrap().root;
    assert_eq!(root.entry(Sha256).unwrap().action, HashAction::Verified);

    let mut originals: BTreeMap<(String, HashFormat), usize> = BTreeMap::new();
    for generation in history.generations() {
        for record in std::iter::once(&generation.root).chain(&generation.records) {
            for hash in &record.hashes {
                assert_ne!(hash.action, HashAction::New);
                if hash.action == HashAction::Original {
                    *originals.entry((record.path.clone(), hash.format)).or_default() += 1;
                }
            }
        }
    }
    assert!(!originals.is_empty());
    for (key, count) in originals {
        assert_eq!(count, 1, "{key:?} recorded as original {count} times");
    }
}
