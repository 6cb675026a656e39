// ============================================================
// Layer 5 — Training Orchestrator
// ============================================================
// Drives the whole run through a small state machine:
//
//   Idle ──► Running(epoch, iteration) ──► Validating(epoch) ──┐
//              ▲                                               │
//              └──────────── next epoch ◄──────────────────────┤
//                                                              ▼
//                                                            Done
//
// Per iteration:
//   lr = schedule.rate(iteration)    iteration never resets per epoch
//   learner.set_learning_rate(lr)
//   loss = learner.step(batch)       forward + loss + backward + update
//   iteration += 1
//
// Per epoch:
//   validator: reset → update per batch → get once
//   score = (pixAcc + mIoU) / 2
//   score > best  →  save Best checkpoint, best = score
//   always        →  save Regular checkpoint
//
// After the last epoch one more Regular save is made and both
// checkpoint files are handed to the run tracker as artifacts.
//
// Failure policy:
//   - learner errors abort the run, tagged with epoch/iteration
//   - checkpoint write errors abort the run
//   - tracker errors are logged and ignored
//
// Reference: Burn Book §5 (Training), Chen et al. (2017) DeepLab poly LR

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::domain::error::ConfigError;
use crate::domain::parameter_set::ParameterSet;
use crate::domain::traits::{
    BatchStream, CheckpointKind, CheckpointSink, ParameterStore, RunTracker, SegmentationLearner,
};
use crate::infra::metrics::EpochMetrics;
use crate::ml::lr_schedule::PolyLrSchedule;
use crate::ml::metric::SegmentationMetric;

// ─── Phase ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running { epoch: usize, iteration: usize },
    Validating { epoch: usize },
    Done,
}

// ─── BestScore ────────────────────────────────────────────────────────────────
/// Highest composite score seen so far in this run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestScore {
    best: f64,
}

impl BestScore {
    pub fn new() -> Self {
        Self { best: 0.0 }
    }

    /// Record `score`; true only on strict improvement.
    pub fn observe(&mut self, score: f64) -> bool {
        if score > self.best {
            self.best = score;
            true
        } else {
            false
        }
    }

    pub fn value(&self) -> f64 {
        self.best
    }
}

impl Default for BestScore {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Validator ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidationReport {
    pub pixel_accuracy: f64,
    pub mean_iou:       f64,
}

impl ValidationReport {
    /// Composite score used for best-checkpoint selection.
    pub fn score(&self) -> f64 {
        (self.pixel_accuracy + self.mean_iou) / 2.0
    }
}

/// One full pass over the validation set through the metric.
pub struct Validator {
    metric: SegmentationMetric,
}

impl Validator {
    pub fn new(num_classes: usize) -> Self {
        Self { metric: SegmentationMetric::new(num_classes) }
    }

    pub fn metric(&self) -> &SegmentationMetric {
        &self.metric
    }

    pub fn run<L, V>(&mut self, learner: &L, batches: &V) -> Result<ValidationReport>
    where
        L: SegmentationLearner,
        V: BatchStream<Item = L::ValidBatch> + ?Sized,
    {
        self.metric.reset();
        for (i, batch) in batches.batches().enumerate() {
            let pixels = learner
                .predict(batch)
                .with_context(|| format!("prediction failed on validation batch {i}"))?;
            self.metric
                .update(&pixels)
                .with_context(|| format!("invalid labels in validation batch {i}"))?;
        }
        let (pixel_accuracy, mean_iou) = self.metric.get();
        tracing::debug!("Validated {} labelled pixels", self.metric.labeled_pixels());
        Ok(ValidationReport { pixel_accuracy, mean_iou })
    }
}

// ─── RunSummary ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub best_score:      f64,
    pub best_epoch:      Option<usize>,
    pub iterations:      usize,
    pub checkpoint:      PathBuf,
    pub best_checkpoint: Option<PathBuf>,
    pub history:         Vec<EpochMetrics>,
}

// ─── TrainingOrchestrator ─────────────────────────────────────────────────────
pub struct TrainingOrchestrator<'a, L> {
    learner:      L,
    schedule:     PolyLrSchedule,
    validator:    Validator,
    checkpoints:  &'a dyn CheckpointSink,
    tracker:      &'a mut dyn RunTracker,
    epochs:       usize,
    log_interval: usize,
    phase:        Phase,
    iteration:    usize,
    best:         BestScore,
}

impl<'a, L> TrainingOrchestrator<'a, L>
where
    L: SegmentationLearner + ParameterStore,
{
    pub fn new(
        learner:      L,
        schedule:     PolyLrSchedule,
        validator:    Validator,
        checkpoints:  &'a dyn CheckpointSink,
        tracker:      &'a mut dyn RunTracker,
        epochs:       usize,
        log_interval: usize,
    ) -> Result<Self, ConfigError> {
        if epochs == 0 {
            return Err(ConfigError::NonPositive { field: "epochs", value: epochs.to_string() });
        }
        if log_interval == 0 {
            return Err(ConfigError::NonPositive {
                field: "log_interval",
                value: log_interval.to_string(),
            });
        }
        Ok(Self {
            learner,
            schedule,
            validator,
            checkpoints,
            tracker,
            epochs,
            log_interval,
            phase: Phase::Idle,
            iteration: 0,
            best: BestScore::new(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Global iteration counter across all epochs.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn best_score(&self) -> f64 {
        self.best.value()
    }

    pub fn run<T, V>(&mut self, train: &T, valid: &V) -> Result<RunSummary>
    where
        T: BatchStream<Item = L::TrainBatch> + ?Sized,
        V: BatchStream<Item = L::ValidBatch> + ?Sized,
    {
        if self.phase != Phase::Idle {
            bail!("orchestrator already ran (phase {:?})", self.phase);
        }

        let iters_per_epoch = train.num_batches();
        if iters_per_epoch * self.epochs != self.schedule.total_iters() {
            tracing::warn!(
                "LR schedule spans {} iterations but the run has {}",
                self.schedule.total_iters(),
                iters_per_epoch * self.epochs
            );
        }
        tracing::info!(
            "Starting training: {} epochs × {} iterations, base lr {}",
            self.epochs,
            iters_per_epoch,
            self.schedule.base_lr()
        );

        let start = Instant::now();
        let mut history         = Vec::with_capacity(self.epochs);
        let mut best_epoch      = None;
        let mut best_checkpoint = None;

        for epoch in 0..self.epochs {
            // ── Training phase ────────────────────────────────────────────────
            let mut loss_sum = 0.0f64;
            let mut steps    = 0usize;
            let mut lr       = self.schedule.rate(self.iteration);

            for (i, batch) in train.batches().enumerate() {
                self.phase = Phase::Running { epoch, iteration: self.iteration };

                lr = self.schedule.rate(self.iteration);
                self.learner.set_learning_rate(lr);
                let loss = self.learner.step(batch).with_context(|| {
                    format!("training step failed at epoch {epoch}, iteration {}", self.iteration)
                })?;

                self.iteration += 1;
                loss_sum += loss;
                steps    += 1;

                if self.iteration % self.log_interval == 0 {
                    tracing::info!(
                        "Epoch: {}/{} || Iters: {}/{} || Time: {:.1}s || Lr: {:.8} || Loss: {:.4}",
                        epoch,
                        self.epochs,
                        i + 1,
                        iters_per_epoch,
                        start.elapsed().as_secs_f64(),
                        lr,
                        loss
                    );
                }
            }
            let train_loss = if steps > 0 { loss_sum / steps as f64 } else { f64::NAN };

            // ── Validation phase ──────────────────────────────────────────────
            self.phase = Phase::Validating { epoch };
            let report = self
                .validator
                .run(&self.learner, valid)
                .with_context(|| format!("validation failed after epoch {epoch}"))?;
            let score = report.score();
            tracing::info!(
                "Epoch {} validation: pixAcc: {:.3}%, mIoU: {:.3}%",
                epoch,
                report.pixel_accuracy * 100.0,
                report.mean_iou * 100.0
            );
            tracing::debug!("Per-class IoU: {:?}", self.validator.metric().per_class_iou());

            if steps > 0 {
                self.track("loss", train_loss, epoch);
            }
            self.track("learningrate", lr, epoch);
            self.track("val_acc", report.pixel_accuracy, epoch);
            self.track("val_miou", report.mean_iou, epoch);
            self.track("val_score", score, epoch);

            // ── Checkpointing ─────────────────────────────────────────────────
            let params = self
                .learner
                .state_dict()
                .with_context(|| format!("cannot export parameters after epoch {epoch}"))?;

            let improved = self.best.observe(score);
            if improved {
                let path = self.save(CheckpointKind::Best, &params, epoch)?;
                tracing::info!("New best score {:.4} at epoch {} → '{}'", score, epoch, path.display());
                best_epoch      = Some(epoch);
                best_checkpoint = Some(path);
            }
            self.save(CheckpointKind::Regular, &params, epoch)?;

            history.push(EpochMetrics {
                epoch,
                train_loss,
                learning_rate: lr,
                pixel_accuracy: report.pixel_accuracy,
                mean_iou: report.mean_iou,
                score,
                improved,
            });
        }

        // ── Completion ────────────────────────────────────────────────────────
        self.phase = Phase::Done;
        let params = self.learner.state_dict().context("cannot export final parameters")?;
        let checkpoint = self.save(CheckpointKind::Regular, &params, self.epochs)?;

        self.upload(&checkpoint);
        if let Some(best) = &best_checkpoint {
            self.upload(best);
        }

        tracing::info!(
            "Training complete: {} iterations, best score {:.4} in {:.1}s",
            self.iteration,
            self.best.value(),
            start.elapsed().as_secs_f64()
        );

        Ok(RunSummary {
            best_score: self.best.value(),
            best_epoch,
            iterations: self.iteration,
            checkpoint,
            best_checkpoint,
            history,
        })
    }

    fn save(&self, kind: CheckpointKind, params: &ParameterSet, epoch: usize) -> Result<PathBuf> {
        self.checkpoints
            .save(kind, params)
            .with_context(|| format!("failed to save {kind:?} checkpoint at epoch {epoch}"))
    }

    fn track(&mut self, name: &str, value: f64, step: usize) {
        if let Err(e) = self.tracker.log_scalar(name, value, step) {
            tracing::warn!("Could not log '{}' at step {}: {:#}", name, step, e);
        }
    }

    fn upload(&mut self, path: &Path) {
        if let Err(e) = self.tracker.add_artifact(path) {
            tracing::warn!("Could not store artifact '{}': {:#}", path.display(), e);
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parameter_set::ParamTensor;
    use crate::domain::pixel_batch::PixelBatch;
    use anyhow::anyhow;
    use approx::assert_relative_eq;
    use std::cell::{Cell, RefCell};
    use std::collections::{BTreeMap, BTreeSet};
    use std::rc::Rc;

    // Two classes, ten pixels of class 0; `k` correct predictions give
    // pixAcc k/10, mIoU k/20 and a composite score of 0.075·k.
    struct FakeLearner {
        correct:     Vec<usize>,
        validations: Cell<usize>,
        lrs:         Rc<RefCell<Vec<f64>>>,
        fail_at:     Option<usize>,
        weight:      f32,
    }

    impl FakeLearner {
        fn new(correct: Vec<usize>) -> Self {
            Self {
                correct,
                validations: Cell::new(0),
                lrs: Rc::default(),
                fail_at: None,
                weight: 0.0,
            }
        }
    }

    impl SegmentationLearner for FakeLearner {
        type TrainBatch = ();
        type ValidBatch = ();

        fn set_learning_rate(&mut self, lr: f64) {
            self.lrs.borrow_mut().push(lr);
        }

        fn step(&mut self, _batch: ()) -> Result<f64> {
            if self.fail_at == Some(self.lrs.borrow().len() - 1) {
                return Err(anyhow!("out of memory"));
            }
            self.weight += 1.0;
            Ok(0.5)
        }

        fn predict(&self, _batch: ()) -> Result<PixelBatch> {
            let epoch = self.validations.get();
            self.validations.set(epoch + 1);
            let k = self.correct[epoch];
            let predicted = (0..10).map(|i| if i < k { 0 } else { 1 }).collect();
            Ok(PixelBatch::new([1, 2, 5], predicted, vec![0; 10]))
        }
    }

    impl ParameterStore for FakeLearner {
        fn parameter_shapes(&self) -> BTreeMap<String, Vec<usize>> {
            BTreeMap::from([("w".to_string(), vec![1])])
        }

        fn state_dict(&self) -> Result<ParameterSet> {
            Ok(ParameterSet::from_iter([("w".to_string(), ParamTensor::scalar(self.weight))]))
        }

        fn load_state_dict(&mut self, params: ParameterSet) -> Result<()> {
            if let Some(w) = params.get("w") {
                self.weight = w.values[0];
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        saves: RefCell<Vec<(CheckpointKind, f32)>>,
    }

    impl CheckpointSink for RecordingSink {
        fn save(&self, kind: CheckpointKind, params: &ParameterSet) -> Result<PathBuf> {
            let w = params.get("w").map(|t| t.values[0]).unwrap_or(f32::NAN);
            self.saves.borrow_mut().push((kind, w));
            Ok(PathBuf::from(match kind {
                CheckpointKind::Regular => "run.safetensors",
                CheckpointKind::Best => "run_best.safetensors",
            }))
        }
    }

    #[derive(Default)]
    struct RecordingTracker {
        scalars:   Vec<(String, f64, usize)>,
        artifacts: Vec<PathBuf>,
    }

    impl RunTracker for RecordingTracker {
        fn log_scalar(&mut self, name: &str, value: f64, step: usize) -> Result<()> {
            self.scalars.push((name.to_string(), value, step));
            Ok(())
        }

        fn add_artifact(&mut self, path: &Path) -> Result<()> {
            self.artifacts.push(path.to_path_buf());
            Ok(())
        }
    }

    struct BrokenTracker;

    impl RunTracker for BrokenTracker {
        fn log_scalar(&mut self, _: &str, _: f64, _: usize) -> Result<()> {
            Err(anyhow!("tracking server unreachable"))
        }

        fn add_artifact(&mut self, _: &Path) -> Result<()> {
            Err(anyhow!("tracking server unreachable"))
        }
    }

    fn schedule(total: usize) -> PolyLrSchedule {
        PolyLrSchedule::new(1.0, total, 1.0).unwrap()
    }

    #[test]
    fn test_best_score_requires_strict_improvement() {
        let mut best = BestScore::new();
        let seen: Vec<bool> = [0.4, 0.5, 0.45, 0.6, 0.6].iter().map(|&s| best.observe(s)).collect();
        assert_eq!(seen, vec![true, true, false, true, false]);
        assert_relative_eq!(best.value(), 0.6);
    }

    #[test]
    fn test_zero_score_never_counts_as_improvement() {
        assert!(!BestScore::new().observe(0.0));
    }

    #[test]
    fn test_best_checkpoint_written_only_on_improvement() {
        let sink        = RecordingSink::default();
        let mut tracker = RecordingTracker::default();
        let learner     = FakeLearner::new(vec![4, 6, 5, 8]);

        let mut orch = TrainingOrchestrator::new(
            learner, schedule(8), Validator::new(2), &sink, &mut tracker, 4, 100,
        )
        .unwrap();
        let summary = orch.run(&vec![(); 2], &vec![()]).unwrap();

        let improved: Vec<usize> = summary.history.iter().filter(|m| m.improved).map(|m| m.epoch).collect();
        assert_eq!(improved, vec![0, 1, 3]);
        assert_eq!(summary.best_epoch, Some(3));
        assert_relative_eq!(summary.best_score, 0.6, epsilon = 1e-12);
        assert_relative_eq!(summary.history[2].score, 0.375, epsilon = 1e-12);
        assert_eq!(orch.phase(), Phase::Done);

        use CheckpointKind::*;
        let kinds: Vec<CheckpointKind> = sink.saves.borrow().iter().map(|s| s.0).collect();
        assert_eq!(kinds, vec![Best, Regular, Best, Regular, Regular, Best, Regular, Regular]);
    }

    #[test]
    fn test_final_checkpoint_and_artifacts() {
        let sink        = RecordingSink::default();
        let mut tracker = RecordingTracker::default();

        let summary = TrainingOrchestrator::new(
            FakeLearner::new(vec![4, 2]), schedule(6), Validator::new(2), &sink, &mut tracker, 2, 100,
        )
        .unwrap()
        .run(&vec![(); 3], &vec![()])
        .unwrap();

        // final save carries the weights after all six steps
        assert_eq!(sink.saves.borrow().last(), Some(&(CheckpointKind::Regular, 6.0)));
        assert_eq!(summary.checkpoint, PathBuf::from("run.safetensors"));
        assert_eq!(
            tracker.artifacts,
            vec![PathBuf::from("run.safetensors"), PathBuf::from("run_best.safetensors")]
        );

        let names: BTreeSet<&str> = tracker.scalars.iter().map(|s| s.0.as_str()).collect();
        assert_eq!(names, BTreeSet::from(["loss", "learningrate", "val_acc", "val_miou", "val_score"]));
    }

    #[test]
    fn test_schedule_follows_global_iteration() {
        let sink        = RecordingSink::default();
        let mut tracker = RecordingTracker::default();

        let learner     = FakeLearner::new(vec![1, 1]);
        let lrs         = Rc::clone(&learner.lrs);

        let mut orch = TrainingOrchestrator::new(
            learner, schedule(4), Validator::new(2), &sink, &mut tracker, 2, 1,
        )
        .unwrap();
        orch.run(&vec![(); 2], &vec![()]).unwrap();

        assert_eq!(orch.iteration(), 4);
        assert_eq!(*lrs.borrow(), vec![1.0, 0.75, 0.5, 0.25]);
    }

    #[test]
    fn test_step_failure_carries_epoch_and_iteration() {
        let sink        = RecordingSink::default();
        let mut tracker = RecordingTracker::default();
        let mut learner = FakeLearner::new(vec![1, 1]);
        learner.fail_at = Some(3);

        let mut orch = TrainingOrchestrator::new(
            learner, schedule(4), Validator::new(2), &sink, &mut tracker, 2, 100,
        )
        .unwrap();
        let err = format!("{:#}", orch.run(&vec![(); 2], &vec![()]).unwrap_err());

        assert!(err.contains("epoch 1, iteration 3"), "{err}");
        assert!(err.contains("out of memory"), "{err}");
        assert_eq!(orch.phase(), Phase::Running { epoch: 1, iteration: 3 });
        // epoch 0 finished: one best + one regular save, nothing after the failure
        assert_eq!(sink.saves.borrow().len(), 2);
    }

    #[test]
    fn test_tracker_failures_do_not_abort() {
        let sink        = RecordingSink::default();
        let mut tracker = BrokenTracker;

        let summary = TrainingOrchestrator::new(
            FakeLearner::new(vec![3]), schedule(1), Validator::new(2), &sink, &mut tracker, 1, 100,
        )
        .unwrap()
        .run(&vec![()], &vec![()])
        .unwrap();

        assert_eq!(summary.iterations, 1);
        assert_eq!(sink.saves.borrow().len(), 3);
    }

    #[test]
    fn test_zero_epochs_rejected() {
        let sink        = RecordingSink::default();
        let mut tracker = RecordingTracker::default();
        let result = TrainingOrchestrator::new(
            FakeLearner::new(vec![]), schedule(1), Validator::new(2), &sink, &mut tracker, 0, 100,
        );
        assert!(matches!(result, Err(ConfigError::NonPositive { field: "epochs", .. })));
    }

    #[test]
    fn test_validator_aggregates_whole_pass() {
        let learner = FakeLearner::new(vec![10, 0]);
        let mut validator = Validator::new(2);
        let report = validator.run(&learner, &vec![(), ()]).unwrap();

        // 10 correct + 0 correct over 20 pixels, not the last batch alone
        assert_relative_eq!(report.pixel_accuracy, 0.5);
        assert_eq!(validator.metric().labeled_pixels(), 20);
    }
}
