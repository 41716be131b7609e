/*!
 * Common test utilities for the readalong test suite
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use readalong::audio::{AudioLibrary, FsAudioProbe};
use readalong::cache::{ArtifactStore, MemoryStore};
use readalong::document::{Document, DocumentId};
use readalong::providers::mock::{MockSynthesizer, MockTranslator};
use readalong::reconciler::{Reconciler, SpeechSelection};

/// Route library logs through env_logger; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a small plain-text book with four paragraphs
pub fn create_test_book(dir: &Path, filename: &str) -> Result<PathBuf> {
    let content = "The night was cold.\nThe wind was loud.\n\n\
                   Nobody came to the door.\n\n\
                   Morning brought snow.\n\n\
                   Hello.\n";
    create_test_file(dir, filename, content)
}

/// Document `id` with `count` short paragraphs
pub fn sample_document(id: &str, count: usize) -> Document {
    let texts = (0..count).map(|i| format!("Paragraph number {}.", i)).collect();
    Document::new(DocumentId::new(id), texts)
}

/// Reconciler under test plus handles on its collaborators
pub struct TestReader {
    pub reconciler: Reconciler,
    pub translator: MockTranslator,
    pub synthesizer: MockSynthesizer,
    pub library: AudioLibrary,
}

/// Build a reconciler over `store`, keeping audio under `audio_dir`
pub fn test_reader(
    store: Arc<dyn ArtifactStore>,
    audio_dir: &Path,
    translator: MockTranslator,
    synthesizer: MockSynthesizer,
) -> TestReader {
    let library = AudioLibrary::new(audio_dir);
    let reconciler = Reconciler::new(
        store,
        Arc::new(translator.clone()),
        Arc::new(synthesizer.clone()),
        Arc::new(FsAudioProbe::new(library.clone())),
        library.clone(),
        SpeechSelection::new("alloy", "tts-1"),
    );

    TestReader {
        reconciler,
        translator,
        synthesizer,
        library,
    }
}

/// Reconciler over a fresh in-memory store with working mocks
pub fn working_reader(audio_dir: &Path) -> TestReader {
    test_reader(
        Arc::new(MemoryStore::new()),
        audio_dir,
        MockTranslator::working(),
        MockSynthesizer::working(),
    )
}

/// Poll `condition` until it holds, failing the test after about a second
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
