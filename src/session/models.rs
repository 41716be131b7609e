/*!
 * Data types reported by reader sessions.
 */

use std::fmt;

use crate::errors::ReconcileError;
use crate::reconciler::ReconcileOutcome;

/// Totals of one post-render reconcile pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Paragraphs whose local audio was attached by this pass
    pub attached: usize,
    /// Paragraphs attached by an earlier pass
    pub already_attached: usize,
    /// Paragraphs without a playable file
    pub absent: usize,
    /// Paragraphs with a generation in flight
    pub busy: usize,
    /// Paragraphs whose reconcile step failed
    pub failed: usize,
}

impl ReconcileSummary {
    /// Count one paragraph's result
    pub fn record(&mut self, result: &Result<ReconcileOutcome, ReconcileError>) {
        match result {
            Ok(ReconcileOutcome::Attached(_)) => self.attached += 1,
            Ok(ReconcileOutcome::AlreadyAttached) => self.already_attached += 1,
            Ok(ReconcileOutcome::Absent) => self.absent += 1,
            Ok(ReconcileOutcome::Busy) => self.busy += 1,
            Err(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.attached + self.already_attached + self.absent + self.busy + self.failed
    }

    /// Paragraphs that have playable audio after the pass
    pub fn available(&self) -> usize {
        self.attached + self.already_attached
    }
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attached, {} already attached, {} absent, {} busy, {} failed",
            self.attached, self.already_attached, self.absent, self.busy, self.failed
        )
    }
}
