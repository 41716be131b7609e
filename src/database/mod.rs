/*!
 * Database module for persistent storage of paragraph artifacts.
 *
 * This module provides SQLite-based persistence for:
 * - Translated paragraph text, keyed by document, paragraph and language
 * - Audio file references, keyed by document, paragraph, voice and model
 */

pub mod schema;
pub mod connection;
pub mod repository;

// Re-export main types
pub use connection::DatabaseConnection;
pub use repository::Repository;
