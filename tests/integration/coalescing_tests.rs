/*!
 * Integration tests for request coalescing, cancellation and state notifications
 */

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use readalong::cache::{build_translation_key, ArtifactStore, MemoryStore};
use readalong::errors::ReconcileError;
use readalong::providers::mock::{MockSynthesizer, MockTranslator};
use readalong::reconciler::{ArtifactState, ServedFrom};
use readalong::session::ReaderSession;
use crate::common;

fn slow_reader(dir: &std::path::Path, store: Arc<MemoryStore>) -> common::TestReader {
    common::test_reader(
        store,
        dir,
        MockTranslator::working().with_delay(Duration::from_millis(150)).with_response("Bonjour"),
        MockSynthesizer::working().with_delay(Duration::from_millis(150)),
    )
}

/// Two callers asking for the same audio trigger one synthesis
#[tokio::test]
async fn test_speak_concurrentCallers_shouldShareOneRequest() -> Result<()> {
    common::init_logging();
    let dir = common::create_temp_dir()?;
    let reader = slow_reader(dir.path(), Arc::new(MemoryStore::new()));
    let document = common::sample_document("bookA", 2);

    let (a, b) = tokio::join!(reader.reconciler.speak(&document, 0), reader.reconciler.speak(&document, 0));
    let (a, b) = (a?, b?);

    assert_eq!(reader.synthesizer.call_count(), 1);
    assert_eq!(a.value.handle.path(), b.value.handle.path());
    let mut sources = [a.source, b.source];
    sources.sort_by_key(|s| *s == ServedFrom::InFlight);
    assert_eq!(sources, [ServedFrom::Provider, ServedFrom::InFlight]);
    assert_eq!(reader.reconciler.inflight_count(), 0);
    Ok(())
}

/// Two sessions over one reconciler share in-flight translations
#[tokio::test]
async fn test_translate_fromTwoSessions_shouldCallProviderOnce() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let reader = slow_reader(dir.path(), Arc::new(MemoryStore::new()));
    let first = ReaderSession::new(common::sample_document("bookA", 4), reader.reconciler.clone(), "fr")?;
    let second = ReaderSession::new(common::sample_document("bookA", 4), reader.reconciler.clone(), "fre")?;

    let (a, b) = tokio::join!(first.translate(3), second.translate(3));
    assert_eq!(a?.value.text, "Bonjour");
    assert_eq!(b?.value.text, "Bonjour");
    assert_eq!(reader.translator.call_count(), 1);
    Ok(())
}

/// Different keys are fetched independently
#[tokio::test]
async fn test_translate_differentParagraphs_shouldRunConcurrently() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let reader = slow_reader(dir.path(), Arc::new(MemoryStore::new()));
    let document = common::sample_document("bookA", 3);

    let started = tokio::time::Instant::now();
    let (a, b, c) = tokio::join!(
        reader.reconciler.translate(&document, 0, "fr"),
        reader.reconciler.translate(&document, 1, "fr"),
        reader.reconciler.translate(&document, 2, "fr"),
    );

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(reader.translator.call_count(), 3);
    assert!(started.elapsed() < Duration::from_millis(400));
    Ok(())
}

/// A failure is shared by every attached caller and counted once
#[tokio::test]
async fn test_translate_concurrentFailure_shouldReachEveryCaller() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let reader = common::test_reader(
        Arc::new(MemoryStore::new()),
        dir.path(),
        MockTranslator::failing().with_delay(Duration::from_millis(50)),
        MockSynthesizer::working(),
    );
    let document = common::sample_document("bookA", 1);

    let (a, b) = tokio::join!(
        reader.reconciler.translate(&document, 0, "fr"),
        reader.reconciler.translate(&document, 0, "fr")
    );

    assert!(matches!(a, Err(ReconcileError::Provider(_))));
    assert!(matches!(b, Err(ReconcileError::Provider(_))));
    assert_eq!(reader.translator.call_count(), 1);
    Ok(())
}

/// Leaving a paragraph releases its waiters while the request finishes quietly
#[tokio::test]
async fn test_navigateAway_whileTranslating_shouldCancelWaiterButStillCache() -> Result<()> {
    common::init_logging();
    let dir = common::create_temp_dir()?;
    let store = Arc::new(MemoryStore::new());
    let reader = slow_reader(dir.path(), store.clone());
    let session = ReaderSession::new(common::sample_document("bookA", 4), reader.reconciler.clone(), "fr")?;
    let key = build_translation_key("bookA", 2, "fr")?;
    let mut updates = session.reconciler().subscribe(&key);

    session.navigate_to(2)?;
    let navigate_away = async {
        common::wait_until(|| session.reconciler().inflight_count() == 1).await;
        session.navigate_to(3)
    };
    let (result, navigated) = tokio::join!(session.translate(2), navigate_away);
    navigated?;

    assert!(matches!(result, Err(ReconcileError::Cancelled(2))));
    assert_eq!(*updates.borrow_and_update(), ArtifactState::Requesting);

    common::wait_until(|| session.reconciler().inflight_count() == 0).await;
    assert_eq!(session.reconciler().state(&key), ArtifactState::Cached);
    assert!(store.has(&key).await?);
    // The paragraph was no longer visible, so nobody was woken
    assert!(!updates.has_changed()?);
    assert_eq!(*updates.borrow(), ArtifactState::Cached);

    // Coming back serves the cached result without a second call
    session.navigate_to(2)?;
    assert_eq!(session.translate(2).await?.source, ServedFrom::Cache);
    assert_eq!(reader.translator.call_count(), 1);
    Ok(())
}

/// A visible paragraph's subscribers see the final state
#[tokio::test]
async fn test_subscribe_whileVisible_shouldNotifyCompletion() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let reader = common::working_reader(dir.path());
    let document = common::sample_document("bookA", 1);
    let key = reader.reconciler.audio_key(&document, 0)?;
    let mut updates = reader.reconciler.subscribe(&key);

    reader.reconciler.speak(&document, 0).await?;

    assert!(updates.has_changed()?);
    assert_eq!(*updates.borrow_and_update(), ArtifactState::Cached);
    Ok(())
}

/// Closing a session cancels waiters on every paragraph
#[tokio::test]
async fn test_close_whileSpeaking_shouldCancelWaiters() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let reader = slow_reader(dir.path(), Arc::new(MemoryStore::new()));
    let session = ReaderSession::new(common::sample_document("bookA", 2), reader.reconciler.clone(), "fr")?;

    let close = async {
        common::wait_until(|| session.reconciler().inflight_count() == 2).await;
        session.close();
    };
    let (a, b, _) = tokio::join!(session.speak(0), session.speak(1), close);

    assert!(matches!(a, Err(ReconcileError::Cancelled(0))));
    assert!(matches!(b, Err(ReconcileError::Cancelled(1))));

    common::wait_until(|| session.reconciler().inflight_count() == 0).await;
    assert_eq!(reader.library.usage().files, 2);
    Ok(())
}

/// A forced regeneration joins a generation already running
#[tokio::test]
async fn test_regenerate_whileSpeaking_shouldAttachToRunningRequest() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let reader = slow_reader(dir.path(), Arc::new(MemoryStore::new()));
    let document = common::sample_document("bookA", 1);

    let regenerate = async {
        common::wait_until(|| reader.reconciler.inflight_count() == 1).await;
        reader.reconciler.regenerate_audio(&document, 0).await
    };
    let (spoken, regenerated) = tokio::join!(reader.reconciler.speak(&document, 0), regenerate);

    assert_eq!(spoken?.source, ServedFrom::Provider);
    assert_eq!(regenerated?.source, ServedFrom::InFlight);
    assert_eq!(reader.synthesizer.call_count(), 1);
    Ok(())
}
