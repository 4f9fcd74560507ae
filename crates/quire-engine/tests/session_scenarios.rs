//! End-to-end behaviour of an artifact session against both backends.

use std::sync::Arc;
use std::time::Duration;

use quire_core::{Artifact, ArtifactStatus, BackendKind, DeltaEvent, DocumentId};
use quire_engine::{
    ArtifactSession, DeltaIngestor, EngineError, Ingested, KindRegistry, Mode, RevealThresholds,
    SaveOutcome, SessionConfig, SuggestionStore, delta_channel,
};
use quire_storage::{
    InMemoryDocumentApi, InMemoryKeyValueStore, LocalDocumentRepository, RemoteDocumentRepository,
    RepositoryResolver,
};
use tokio_test::{assert_err, assert_ok};

struct Harness {
    api: Arc<InMemoryDocumentApi>,
    resolver: RepositoryResolver,
}

impl Harness {
    fn new() -> Self {
        let api = Arc::new(InMemoryDocumentApi::new("user-1"));
        let resolver = RepositoryResolver::new(
            Arc::new(RemoteDocumentRepository::new(Arc::clone(&api))),
            Arc::new(LocalDocumentRepository::new(
                InMemoryKeyValueStore::new(),
                "user-1",
            )),
        );
        Self { api, resolver }
    }

    fn open(&self, artifact: Artifact) -> ArtifactSession {
        let config = SessionConfig::new("user-1");
        let registry = Arc::new(KindRegistry::with_defaults(&config.reveal_thresholds));
        ArtifactSession::open(config, registry, self.resolver.clone(), artifact).unwrap()
    }
}

fn artifact(id: DocumentId) -> Artifact {
    Artifact {
        document_id: id,
        title: "Draft".into(),
        ..Artifact::initial()
    }
}

#[tokio::test]
async fn test_stream_folds_into_artifact() {
    let harness = Harness::new();
    let mut session = harness.open(Artifact::initial());
    let (tx, rx) = delta_channel("chat-1");
    session.attach_stream(rx);

    for event in [
        DeltaEvent::id("doc1"),
        DeltaEvent::text_delta("Hello"),
        DeltaEvent::text_delta("Hello world"),
        DeltaEvent::finish(),
    ] {
        tx.send(event).unwrap();
    }

    assert_eq!(assert_ok!(session.drive_stream().await), 4);
    let artifact = session.artifact();
    assert_eq!(artifact.document_id, DocumentId::new("doc1"));
    assert_eq!(artifact.content, "Hello world");
    assert_eq!(artifact.status, ArtifactStatus::Idle);

    // "doc1" is not a server id: the streamed result is stored locally
    assert_eq!(session.backend(), BackendKind::Local);
    assert_eq!(session.versions().len(), 1);
    assert_eq!(session.versions().versions()[0].content, "Hello world");
}

#[tokio::test]
async fn test_repeated_save_does_not_create_version() {
    let harness = Harness::new();
    for id in [DocumentId::new("local-notes"), DocumentId::generate()] {
        let mut session = harness.open(artifact(id));

        assert!(matches!(
            session.save_content("a", false).await,
            SaveOutcome::Written(_)
        ));
        assert_eq!(session.save_content("a", false).await, SaveOutcome::Skipped);
        assert!(matches!(
            session.save_content("b", false).await,
            SaveOutcome::Written(_)
        ));

        assert_eq!(session.versions().len(), 2, "{:?}", session.backend());
        assert!(session.is_current_version());
    }
}

#[tokio::test]
async fn test_restore_to_second_of_four_versions() {
    let harness = Harness::new();
    for id in [DocumentId::new("local-essay"), DocumentId::generate()] {
        let mut session = harness.open(artifact(id));
        for content in ["v0", "v1", "v2", "v3"] {
            session.save_content(content, false).await;
        }
        assert_eq!(session.versions().len(), 4);

        session.prev_version();
        session.prev_version();
        assert_eq!(session.navigator().index(), Some(1));
        assert_eq!(session.displayed_content(), "v1");

        let outcome = assert_ok!(session.restore_current_version().await);
        assert_eq!(outcome.removed, 2);
        assert_eq!(
            outcome.requires_reload,
            session.backend() == BackendKind::Local
        );
        assert_eq!(session.versions().len(), 2);
        assert_eq!(session.navigator().current_version_index(), 1);
        assert!(session.is_current_version());
        assert_eq!(session.artifact().content, "v1");
        assert!(
            session
                .versions()
                .versions()
                .iter()
                .all(|d| d.created_at <= outcome.versions[1].created_at)
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_debounced_autosave() {
    let harness = Harness::new();
    let mut session = harness.open(artifact(DocumentId::new("local-debounce")));
    session.save_content("a", false).await;

    let first = session.save_content("ab", true).await;
    assert!(matches!(first, SaveOutcome::Scheduled(_)));
    assert!(session.autosave().is_dirty());

    tokio::time::advance(Duration::from_millis(1500)).await;
    // Each edit pushes the deadline back
    session.save_content("abc", true).await;
    tokio::time::advance(Duration::from_millis(1500)).await;
    assert!(matches!(
        session.poll_autosave().await,
        SaveOutcome::Scheduled(_)
    ));

    match session.wait_autosave().await {
        SaveOutcome::Written(doc) => assert_eq!(doc.content, "abc"),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!session.autosave().is_dirty());
    assert_eq!(session.versions().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_revert_before_debounce_writes_nothing() {
    let harness = Harness::new();
    let mut session = harness.open(artifact(DocumentId::new("local-revert")));
    session.save_content("same", false).await;

    session.save_content("changed", true).await;
    assert_eq!(session.save_content("same", true).await, SaveOutcome::Skipped);
    assert!(!session.autosave().is_dirty());

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(session.poll_autosave().await, SaveOutcome::Skipped);
    assert_eq!(session.versions().len(), 1);
}

#[tokio::test]
async fn test_edit_during_stream_is_dropped() {
    let harness = Harness::new();
    let mut session = harness.open(Artifact::initial());
    let (tx, rx) = delta_channel("chat-2");
    session.attach_stream(rx);

    tx.send(DeltaEvent::id("local-streamed")).unwrap();
    tx.send(DeltaEvent::text_delta("partial")).unwrap();
    session.pump_stream().await;
    assert!(session.artifact().is_streaming());

    let outcome = session.save_content("user edit", false).await;
    assert_eq!(outcome, SaveOutcome::Streaming);
    assert_eq!(session.artifact().content, "partial");
    assert!(!session.autosave().is_dirty());
    assert!(session.versions().is_empty());

    tx.send(DeltaEvent::text_delta("partial and final")).unwrap();
    tx.send(DeltaEvent::finish()).unwrap();
    session.pump_stream().await;
    assert!(!session.artifact().is_streaming());

    // Nothing left over to overwrite the streamed result
    assert_eq!(session.poll_autosave().await, SaveOutcome::Skipped);
    assert_eq!(session.versions().len(), 1);
    assert_eq!(
        session.versions().latest().map(|d| d.content.as_str()),
        Some("partial and final")
    );
    assert_eq!(session.displayed_content(), "partial and final");
}

#[tokio::test(start_paused = true)]
async fn test_stream_supersedes_pending_edit() {
    let harness = Harness::new();
    let mut session = harness.open(artifact(DocumentId::new("local-superseded")));
    session.save_content("base", false).await;
    assert!(matches!(
        session.save_content("typed", true).await,
        SaveOutcome::Scheduled(_)
    ));

    let (tx, rx) = delta_channel("chat-4");
    session.attach_stream(rx);
    for event in [
        DeltaEvent::text_delta("streamed"),
        DeltaEvent::finish(),
    ] {
        tx.send(event).unwrap();
    }
    assert_eq!(assert_ok!(session.drive_stream().await), 2);
    assert!(!session.autosave().is_dirty());

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(session.poll_autosave().await, SaveOutcome::Skipped);
    let contents: Vec<_> = session
        .versions()
        .versions()
        .iter()
        .map(|d| d.content.as_str())
        .collect();
    assert_eq!(contents, ["base", "streamed"]);
    assert_eq!(session.artifact().content, "streamed");
}

#[test]
fn test_gapped_index_waits_for_missing_events() {
    let registry = Arc::new(KindRegistry::with_defaults(&RevealThresholds::default()));
    let mut ingestor = DeltaIngestor::new(registry);
    let store = SuggestionStore::new();
    let mut artifact = Artifact::initial();
    let log = [
        DeltaEvent::id("local-gap"),
        DeltaEvent::text_delta("Hello"),
        DeltaEvent::text_delta("Hello world"),
        DeltaEvent::finish(),
    ];

    ingestor.ingest(0, &log[0], &mut artifact, &store);
    assert_eq!(
        ingestor.ingest(3, &log[3], &mut artifact, &store),
        Ingested::OutOfOrder { expected: 1 }
    );
    assert!(artifact.is_streaming());
    assert_eq!(ingestor.processed(), 1);

    // Redelivering the log fills the gap and then applies the held-back event
    assert_eq!(ingestor.replay(&log, &mut artifact, &store), 3);
    assert_eq!(artifact.content, "Hello world");
    assert_eq!(artifact.status, ArtifactStatus::Idle);
}

#[tokio::test]
async fn test_session_replays_log_after_reconnect() {
    let harness = Harness::new();
    let mut session = harness.open(Artifact::initial());
    let (tx, rx) = delta_channel("chat-5");
    session.attach_stream(rx);

    let log = [
        DeltaEvent::id("local-resumed"),
        DeltaEvent::text_delta("Hello"),
        DeltaEvent::text_delta("Hello world"),
        DeltaEvent::finish(),
    ];
    tx.send(log[0].clone()).unwrap();
    tx.send(log[1].clone()).unwrap();
    assert_eq!(session.pump_stream().await, 2);

    // The producer reconnects and resends everything
    assert_eq!(session.replay_log(&log).await, 2);
    assert_eq!(session.replay_log(&log).await, 0);
    assert_eq!(session.artifact().content, "Hello world");
    assert_eq!(session.artifact().status, ArtifactStatus::Idle);
    assert_eq!(session.versions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_keeps_pending_autosave() {
    let harness = Harness::new();
    let mut session = harness.open(artifact(DocumentId::new("local-cancel")));
    session.save_content("base", false).await;

    let (tx, rx) = delta_channel("chat-3");
    session.attach_stream(rx);
    session.save_content("edited", true).await;
    session.cancel_stream();

    assert!(!session.has_stream());
    assert_eq!(session.artifact().status, ArtifactStatus::Idle);
    assert!(tx.is_closed());

    assert!(matches!(
        session.wait_autosave().await,
        SaveOutcome::Written(_)
    ));
    assert_eq!(session.versions().len(), 2);
}

#[tokio::test]
async fn test_offline_save_and_restore_fail_cleanly() {
    let harness = Harness::new();
    let mut session = harness.open(artifact(DocumentId::generate()));
    for content in ["one", "two", "three"] {
        session.save_content(content, false).await;
    }

    harness.api.set_offline(true);
    match session.save_content("four", false).await {
        SaveOutcome::Failed(message) => assert!(message.contains("offline")),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(session.autosave().is_dirty());
    assert_eq!(session.artifact().content, "four");

    let err = assert_err!(session.restore_version(0).await);
    assert!(err.is_transient());
    assert_eq!(session.versions().len(), 3);

    // Reads degrade to an empty history instead of failing
    assert!(session.refresh_versions().await.is_empty());

    harness.api.set_offline(false);
    assert_eq!(session.refresh_versions().await.len(), 3);
    assert!(matches!(
        session.save_content("four!", false).await,
        SaveOutcome::Written(_)
    ));
}

#[tokio::test]
async fn test_diff_mode_and_growth() {
    let harness = Harness::new();
    let mut session = harness.open(artifact(DocumentId::new("local-diff")));
    session.save_content("# Plan\n\nship monday", false).await;
    session.save_content("# Plan\n\nship friday", false).await;

    session.toggle_mode();
    let diff = session.displayed_diff().unwrap().unwrap();
    assert_eq!(diff.old_text(), "Plan\nship monday");
    assert_eq!(diff.new_text(), "Plan\nship friday");

    // Following the latest: a new version switches back to edit mode
    session.save_content("# Plan\n\nship never", false).await;
    assert_eq!(session.navigator().mode(), Mode::Edit);
    assert_eq!(session.navigator().index(), Some(2));

    let err = session.diff_versions(0, 7).unwrap_err();
    assert!(matches!(
        err,
        EngineError::VersionOutOfRange { index: 7, len: 3 }
    ));
}
