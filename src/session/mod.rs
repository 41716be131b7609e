/*!
 * Reader session module.
 *
 * This module provides:
 * - One loaded document bound to a reconciler and a target language
 * - Paragraph navigation with visibility-scoped cancellation
 * - The post-render audio reconcile pass
 */

pub mod models;
pub mod reader;

// Re-export main types
pub use models::ReconcileSummary;
pub use reader::ReaderSession;
