/// Training progress events
use std::time::Duration;

use super::history::JointLosses;
use crate::data::NUM_JOINTS;

/// End-of-epoch statistics
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EpochSummary {
    /// 1-based epoch number
    pub epoch: usize,
    pub total_epochs: usize,
    pub train_rows: usize,
    pub val_rows: usize,
    pub train_loss: JointLosses,
    pub val_loss: JointLosses,
    pub elapsed: Duration,
}

/// Receives progress from the training loop.
///
/// The trainer calls these at fixed points and never prints on its own.
pub trait TrainingObserver {
    fn on_run_start(&mut self, _samples: usize, _epochs: usize) {}

    /// After every training row
    fn on_row(
        &mut self,
        _epoch: usize,
        _row: usize,
        _total_rows: usize,
        _losses: &[f32; NUM_JOINTS],
    ) {
    }

    fn on_epoch_end(&mut self, _summary: &EpochSummary) {}

    fn on_run_end(&mut self) {}
}

/// Ignores every event
#[derive(Debug, Default)]
pub struct NoopObserver;

impl TrainingObserver for NoopObserver {}

/// Reports progress through the `log` facade
#[derive(Debug)]
pub struct LogObserver {
    /// Rows between progress lines
    every: usize,
}

impl LogObserver {
    pub fn new(every: usize) -> Self {
        Self { every: every.max(1) }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl TrainingObserver for LogObserver {
    fn on_run_start(&mut self, samples: usize, epochs: usize) {
        log::info!("Starting training: {} samples, {} epochs", samples, epochs);
    }

    fn on_row(&mut self, epoch: usize, row: usize, total_rows: usize, _losses: &[f32; NUM_JOINTS]) {
        if (row + 1) % self.every == 0 || row + 1 == total_rows {
            log::debug!("Epoch {} progress: {}/{}", epoch, row + 1, total_rows);
        }
    }

    fn on_epoch_end(&mut self, summary: &EpochSummary) {
        log::info!(
            "Epoch {}/{} complete in {:.1?} ({} train / {} val rows)",
            summary.epoch,
            summary.total_epochs,
            summary.elapsed,
            summary.train_rows,
            summary.val_rows
        );
        log::info!("  avg train loss: {}", format_losses(&summary.train_loss));
        log::info!("  avg val loss:   {}", format_losses(&summary.val_loss));
    }

    fn on_run_end(&mut self) {
        log::info!("Training complete!");
    }
}

fn format_losses(losses: &JointLosses) -> String {
    losses
        .iter()
        .map(|l| format!("{:.6}", l))
        .collect::<Vec<_>>()
        .join(" ")
}
