//! Offline training
//!
//! Fits the vocabulary and scaler on the full corpus, holds out a stratified
//! validation split, then runs mini-batch Adam with early stopping on
//! validation loss. The best epoch's weights are always the ones returned.

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::artifacts::Artifacts;
use super::features::{extract, FeatureVector, FEATURE_COUNT};
use super::labels::{Label, ProbabilityTriple};
use super::model::{cross_entropy, Adam, ScoringModel};
use super::normalize::normalize;
use super::scaler::Scaler;
use super::vocabulary::Vocabulary;
use crate::config::{ModelConfig, TrainingConfig};
use crate::dataset::EmailRecord;
use crate::error::{Result, ScanError};

/// Loss and accuracy after one epoch
#[derive(Debug, Clone, Serialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f32,
    pub train_accuracy: f32,
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
}

impl EpochMetrics {
    /// Value early stopping watches: validation loss, or training loss when
    /// there is no validation split
    pub fn monitored_loss(&self) -> f32 {
        self.val_loss.unwrap_or(self.train_loss)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub epochs: Vec<EpochMetrics>,
    /// 1-based epoch whose weights were kept
    pub best_epoch: usize,
    pub stopped_early: bool,
    pub train_samples: usize,
    pub validation_samples: usize,
    pub vocabulary_size: usize,
}

impl TrainingReport {
    pub fn best(&self) -> Option<&EpochMetrics> {
        self.epochs.iter().find(|m| m.epoch == self.best_epoch)
    }
}

/// Encoded training matrices, row-aligned with the input records
struct Encoded {
    tokens: Array2<u32>,
    numeric: Array2<f32>,
    targets: Array2<f32>,
    labels: Vec<Label>,
}

impl Encoded {
    fn rows(&self, idx: &[usize]) -> (Array2<u32>, Array2<f32>, Array2<f32>) {
        (
            self.tokens.select(Axis(0), idx),
            self.numeric.select(Axis(0), idx),
            self.targets.select(Axis(0), idx),
        )
    }
}

pub struct Trainer {
    model: ModelConfig,
    training: TrainingConfig,
}

impl Trainer {
    pub fn new(model: ModelConfig, training: TrainingConfig) -> Self {
        Self { model, training }
    }

    pub fn train(&self, records: &[EmailRecord]) -> Result<(Artifacts, TrainingReport)> {
        if records.is_empty() {
            return Err(ScanError::Dataset("no records to train on".to_string()));
        }
        let cfg = &self.training;
        let started = Instant::now();

        let normalized: Vec<String> = records.iter().map(|r| normalize(&r.body)).collect();
        let vocabulary =
            Vocabulary::fit(normalized.iter().map(String::as_str), self.model.max_words);
        debug!("Vocabulary holds {} words", vocabulary.len());

        let raw_features: Vec<FeatureVector> = records.iter().map(|r| extract(&r.body)).collect();
        let scaler = Scaler::fit(&raw_features)?;

        let data = self.encode(records, &normalized, &vocabulary, &scaler)?;
        let (train_idx, val_idx) =
            stratified_split(&data.labels, cfg.validation_split, cfg.seed);
        if train_idx.is_empty() {
            return Err(ScanError::Dataset(
                "validation split leaves no training samples".to_string(),
            ));
        }
        if val_idx.is_empty() {
            warn!("No validation samples, early stopping will watch training loss");
        }

        info!(
            "Training on {} samples, validating on {} ({} epochs max, batch {})",
            train_idx.len(),
            val_idx.len(),
            cfg.epochs,
            cfg.batch_size
        );

        let mut model = ScoringModel::new(self.model.clone(), cfg.seed);
        let mut adam = Adam::new(model.parameters(), cfg.learning_rate);
        let mut rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(1));
        let batch_size = cfg.batch_size.max(1);

        let mut history = Vec::with_capacity(cfg.epochs);
        let mut best: Option<(f32, usize, _)> = None;
        let mut wait = 0usize;
        let mut stopped_early = false;
        let mut order = train_idx.clone();

        for epoch in 1..=cfg.epochs {
            order.shuffle(&mut rng);

            let mut loss_sum = 0.0f32;
            let mut correct = 0usize;
            for batch in order.chunks(batch_size) {
                let (tokens, numeric, targets) = data.rows(batch);
                let pass = model.forward(&tokens, &numeric, Some(&mut rng as &mut dyn RngCore));
                loss_sum += cross_entropy(&pass.probs, &targets) * batch.len() as f32;
                correct += count_correct(&pass.probs, &targets);

                let grads = model.backward(&pass, &tokens, &targets);
                adam.update(model.parameters_mut(), &grads);
            }

            let train_loss = loss_sum / order.len() as f32;
            if !train_loss.is_finite() {
                return Err(ScanError::Dataset(format!(
                    "training diverged at epoch {} (loss {})",
                    epoch, train_loss
                )));
            }

            let (val_loss, val_accuracy) = if val_idx.is_empty() {
                (None, None)
            } else {
                let (loss, accuracy) = evaluate(&model, &data, &val_idx, batch_size);
                (Some(loss), Some(accuracy))
            };

            let metrics = EpochMetrics {
                epoch,
                train_loss,
                train_accuracy: correct as f32 / order.len() as f32,
                val_loss,
                val_accuracy,
            };
            info!(
                "Epoch {}/{}: loss {:.4}, accuracy {:.4}, val_loss {}, val_accuracy {}",
                epoch,
                cfg.epochs,
                metrics.train_loss,
                metrics.train_accuracy,
                fmt_metric(metrics.val_loss),
                fmt_metric(metrics.val_accuracy)
            );

            let monitored = metrics.monitored_loss();
            history.push(metrics);

            let improved = best
                .as_ref()
                .map_or(true, |(best_loss, _, _)| monitored < *best_loss);
            if improved {
                best = Some((monitored, epoch, model.parameters().clone()));
                wait = 0;
            } else {
                wait += 1;
                if wait >= cfg.patience {
                    info!("No improvement for {} epochs, stopping", wait);
                    stopped_early = epoch < cfg.epochs;
                    break;
                }
            }
        }

        let best_epoch = match best {
            Some((loss, epoch, params)) => {
                model.set_parameters(params);
                info!("Restored weights from epoch {} (monitored loss {:.4})", epoch, loss);
                epoch
            }
            None => 0,
        };

        let report = TrainingReport {
            epochs: history,
            best_epoch,
            stopped_early,
            train_samples: train_idx.len(),
            validation_samples: val_idx.len(),
            vocabulary_size: vocabulary.len(),
        };
        let artifacts = Artifacts {
            vocabulary,
            scaler,
            model,
        };
        artifacts.validate()?;

        info!("Training finished in {:.1}s", started.elapsed().as_secs_f32());
        Ok((artifacts, report))
    }

    fn encode(
        &self,
        records: &[EmailRecord],
        normalized: &[String],
        vocabulary: &Vocabulary,
        scaler: &Scaler,
    ) -> Result<Encoded> {
        let n = records.len();
        let max_len = self.model.max_len;

        let mut tokens = Vec::with_capacity(n * max_len);
        for text in normalized {
            tokens.extend(vocabulary.encode(text, max_len));
        }
        let mut numeric = Vec::with_capacity(n * FEATURE_COUNT);
        let mut targets = Vec::with_capacity(n * Label::COUNT);
        for record in records {
            numeric.extend(scaler.transform(&extract(&record.body)));
            targets.extend(record.label.one_hot());
        }

        let shape_err = |e: ndarray::ShapeError| ScanError::Dataset(e.to_string());
        Ok(Encoded {
            tokens: Array2::from_shape_vec((n, max_len), tokens).map_err(shape_err)?,
            numeric: Array2::from_shape_vec((n, FEATURE_COUNT), numeric).map_err(shape_err)?,
            targets: Array2::from_shape_vec((n, Label::COUNT), targets).map_err(shape_err)?,
            labels: records.iter().map(|r| r.label).collect(),
        })
    }
}

/// Split indices so each label keeps the same share in both halves.
///
/// Returns `(train, validation)`, each sorted. A label with a single sample
/// always lands in the training half.
pub fn stratified_split(labels: &[Label], fraction: f32, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut validation = Vec::new();

    for label in Label::ALL {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == label)
            .map(|(i, _)| i)
            .collect();
        members.shuffle(&mut rng);

        let take = ((members.len() as f32 * fraction).round() as usize)
            .min(members.len().saturating_sub(1));
        validation.extend_from_slice(&members[..take]);
        train.extend_from_slice(&members[take..]);
    }

    train.sort_unstable();
    validation.sort_unstable();
    (train, validation)
}

/// Mean loss and accuracy with dropout disabled
fn evaluate(model: &ScoringModel, data: &Encoded, idx: &[usize], batch_size: usize) -> (f32, f32) {
    let mut loss_sum = 0.0f32;
    let mut correct = 0usize;
    for batch in idx.chunks(batch_size) {
        let (tokens, numeric, targets) = data.rows(batch);
        let probs = model.predict_batch(&tokens, &numeric);
        loss_sum += cross_entropy(&probs, &targets) * batch.len() as f32;
        correct += count_correct(&probs, &targets);
    }
    let n = idx.len().max(1) as f32;
    (loss_sum / n, correct as f32 / n)
}

fn count_correct(probs: &Array2<f32>, targets: &Array2<f32>) -> usize {
    probs
        .outer_iter()
        .zip(targets.outer_iter())
        .filter(|(p, t)| row_triple(p.iter()).argmax() == row_triple(t.iter()).argmax())
        .count()
}

fn row_triple<'a>(values: impl Iterator<Item = &'a f32>) -> ProbabilityTriple {
    let mut row = [0.0; Label::COUNT];
    for (slot, &v) in row.iter_mut().zip(values) {
        *slot = v;
    }
    ProbabilityTriple::from(row)
}

fn fmt_metric(value: Option<f32>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}
