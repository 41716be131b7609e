/*!
 * # readalong - paragraph translation and narration for e-books
 *
 * A Rust library that translates and narrates the paragraphs of a book,
 * caching every artifact so each one is produced at most once.
 *
 * ## Features
 *
 * - Deterministic, injective cache keys per (document, paragraph, variant)
 * - Persistent SQLite cache with an in-memory alternative
 * - Translation through OpenAI or Anthropic
 * - Speech synthesis, direct or through a caching TTS proxy
 * - At most one in-flight request per artifact, shared by every waiter
 * - Post-render reconciliation of audio files already on disk
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `app_controller`: Wiring configuration into sessions
 * - `document`: Books split into paragraphs
 * - `cache`: Cache keys, entries and the `ArtifactStore` trait
 * - `database`: SQLite-backed `ArtifactStore`
 * - `audio`: Audio file names, the local audio library and its probe
 * - `providers`: Translation and speech clients:
 *   - `providers::openai`: OpenAI chat completions
 *   - `providers::anthropic`: Anthropic messages API
 *   - `providers::speech`: Speech adapter with direct and proxy routes
 * - `reconciler`: Request coalescing and artifact state tracking
 * - `session`: Reader sessions over one document
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod audio;
pub mod cache;
pub mod database;
pub mod document;
pub mod errors;
pub mod language_utils;
pub mod providers;
pub mod reconciler;
pub mod session;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::Controller;
pub use cache::{build_audio_key, build_translation_key, ArtifactStore, CacheKey};
pub use document::{Document, DocumentId};
pub use errors::{AppError, KeyError, ProviderError, ReconcileError, StoreError};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part1_or_part2t};
pub use reconciler::{ArtifactState, ReconcileOutcome, Reconciler, ServedFrom};
pub use session::ReaderSession;
