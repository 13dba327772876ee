// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Causal-LM training and evaluation using Burn's DataLoader and
// AdamW.
//
//   - Training runs on the autodiff backend B
//   - model.valid() gives the same weights on B::InnerBackend,
//     with dropout off; evaluation uses that copy
//   - The learning rate follows WarmupCosine, one value per step
//   - Every `save_steps` optimizer steps a rolling checkpoint is
//     written and old ones beyond `save_total_limit` are deleted
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use anyhow::Result;
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, Wgpu},
    data::dataloader::{DataLoader, DataLoaderBuilder},
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;

use crate::data::{
    batcher::{LmBatch, LmBatcher},
    dataset::LmDataset,
    loader::TokenizedDatasets,
};
use crate::infra::{
    checkpoint::{CheckpointManager, TrainerState},
    metrics::{perplexity, EvalMetrics, MetricsLogger},
};
use crate::ml::{model::Gpt2Model, scheduler::WarmupCosine};

pub type DefaultBackend = Autodiff<Wgpu>;

pub fn default_device() -> WgpuDevice {
    WgpuDevice::default()
}

// ─── Training Arguments ───────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingArgs {
    /// Where rolling checkpoints and metrics.csv are written
    pub output_dir:                  PathBuf,
    pub num_train_epochs:            usize,
    pub per_device_train_batch_size: usize,
    pub per_device_eval_batch_size:  usize,
    /// Peak learning rate reached at the end of warmup
    pub learning_rate:               f64,
    pub weight_decay:                f32,
    pub adam_epsilon:                f32,
    pub max_grad_norm:               f32,
    pub warmup_steps:                usize,
    /// 0 disables rolling checkpoints
    pub save_steps:                  usize,
    /// 0 keeps every checkpoint
    pub save_total_limit:            usize,
    pub logging_steps:               usize,
    pub seed:                        u64,
    /// Evaluate on the validation partition after every epoch
    pub evaluate_each_epoch:         bool,
}

impl Default for TrainingArgs {
    fn default() -> Self {
        Self {
            output_dir:                  PathBuf::from("/tmp/checkpoints"),
            num_train_epochs:            3,
            per_device_train_batch_size: 8,
            per_device_eval_batch_size:  8,
            learning_rate:               5e-4,
            weight_decay:                0.1,
            adam_epsilon:                1e-8,
            max_grad_norm:               1.0,
            warmup_steps:                1_000,
            save_steps:                  10_000,
            save_total_limit:            2,
            logging_steps:               500,
            seed:                        42,
            evaluate_each_epoch:         true,
        }
    }
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("training loss became non-finite ({loss}) at step {step}")]
    NonFiniteLoss { step: usize, loss: f64 },

    #[error("the {0} partition has no usable sequences")]
    EmptyDataset(&'static str),

    #[error("batch size must be at least 1")]
    ZeroBatchSize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalOutcome {
    pub loss:       f64,
    pub perplexity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOutcome {
    pub global_step: usize,
    /// Mean training loss over the last epoch
    pub train_loss:  f64,
}

// ─── Trainer ──────────────────────────────────────────────────────────────────
pub struct Trainer<B: AutodiffBackend> {
    model:           Gpt2Model<B>,
    args:            TrainingArgs,
    train_loader:    Arc<dyn DataLoader<LmBatch<B>>>,
    eval_loader:     Arc<dyn DataLoader<LmBatch<B::InnerBackend>>>,
    steps_per_epoch: usize,
    checkpoints:     CheckpointManager,
    metrics:         MetricsLogger,
    global_step:     usize,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(
        model:    Gpt2Model<B>,
        args:     TrainingArgs,
        datasets: TokenizedDatasets,
        pad_id:   u32,
        device:   &B::Device,
    ) -> Result<Self> {
        let TokenizedDatasets { train, validation } = datasets;
        if train.sample_count() == 0 {
            return Err(TrainingError::EmptyDataset("train").into());
        }
        if validation.sample_count() == 0 {
            return Err(TrainingError::EmptyDataset("validation").into());
        }

        if args.per_device_train_batch_size == 0 || args.per_device_eval_batch_size == 0 {
            return Err(TrainingError::ZeroBatchSize.into());
        }

        let batch_size      = args.per_device_train_batch_size;
        let steps_per_epoch = train.sample_count().div_ceil(batch_size);

        let train_loader = build_loader::<B>(train, batch_size, Some(args.seed), pad_id, device);
        let eval_loader  = build_loader::<B::InnerBackend>(
            validation,
            args.per_device_eval_batch_size,
            None,
            pad_id,
            device,
        );

        let checkpoints = CheckpointManager::new(&args.output_dir, args.save_total_limit);
        let metrics     = MetricsLogger::new(&args.output_dir)?;

        Ok(Self {
            model,
            args,
            train_loader,
            eval_loader,
            steps_per_epoch,
            checkpoints,
            metrics,
            global_step: 0,
        })
    }

    pub fn model(&self) -> &Gpt2Model<B> {
        &self.model
    }

    pub fn total_steps(&self) -> usize {
        self.steps_per_epoch * self.args.num_train_epochs
    }

    /// Mean per-token validation loss with dropout disabled. Batches
    /// are weighted by their non-pad target count. The result is also
    /// appended to metrics.csv under `phase`.
    pub fn evaluate(&self, phase: &str) -> Result<EvalOutcome> {
        let model = self.model.valid();
        let pad   = i64::from(model.pad_token_id);

        let mut loss_sum = 0.0f64;
        let mut tokens   = 0.0f64;
        for batch in self.eval_loader.iter() {
            let batch_tokens: f64 = batch
                .targets
                .clone()
                .equal_elem(pad)
                .bool_not()
                .int()
                .sum()
                .into_scalar()
                .elem::<f64>();
            let loss: f64 = model
                .forward_loss(batch.inputs, batch.targets)
                .into_scalar()
                .elem::<f64>();
            loss_sum += loss * batch_tokens;
            tokens   += batch_tokens;
        }

        let loss = if tokens > 0.0 { loss_sum / tokens } else { f64::NAN };
        let outcome = EvalOutcome { loss, perplexity: perplexity(loss) };

        tracing::info!(
            "Eval [{}] step={} loss={:.4} perplexity={:.2}",
            phase, self.global_step, outcome.loss, outcome.perplexity
        );
        self.metrics.log(&EvalMetrics::new(phase, self.global_step, loss))?;
        Ok(outcome)
    }

    /// Run every epoch to completion. Errors from the loop are not
    /// recovered; a non-finite loss stops training immediately.
    pub fn train(&mut self) -> Result<TrainOutcome> {
        let total_steps = self.total_steps();
        let schedule = WarmupCosine::new(
            self.args.learning_rate,
            self.args.warmup_steps,
            total_steps,
        );

        let mut optim = AdamWConfig::new()
            .with_weight_decay(self.args.weight_decay)
            .with_epsilon(self.args.adam_epsilon)
            .with_grad_clipping(Some(GradientClippingConfig::Norm(self.args.max_grad_norm)))
            .init::<B, Gpt2Model<B>>();

        tracing::info!(
            "Training: {} epochs x {} steps (batch size {}), warmup={}, peak lr={:e}",
            self.args.num_train_epochs,
            self.steps_per_epoch,
            self.args.per_device_train_batch_size,
            self.args.warmup_steps,
            self.args.learning_rate,
        );

        let mut model = self.model.clone();
        let mut last_epoch_loss = f64::NAN;

        for epoch in 1..=self.args.num_train_epochs {
            let mut loss_sum = 0.0f64;
            let mut batches  = 0usize;

            for batch in self.train_loader.iter() {
                let lr   = schedule.lr_at(self.global_step);
                let loss = model.forward_loss(batch.inputs, batch.targets);

                let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
                if !loss_val.is_finite() {
                    return Err(TrainingError::NonFiniteLoss {
                        step: self.global_step,
                        loss: loss_val,
                    }
                    .into());
                }

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(lr, model, grads);

                self.global_step += 1;
                loss_sum += loss_val;
                batches  += 1;

                if self.args.logging_steps > 0 && self.global_step % self.args.logging_steps == 0 {
                    tracing::info!(
                        "step {}/{} | loss={:.4} | lr={:.3e}",
                        self.global_step, total_steps, loss_val, lr
                    );
                }

                if self.args.save_steps > 0 && self.global_step % self.args.save_steps == 0 {
                    self.checkpoints.save_checkpoint(
                        &model,
                        &TrainerState {
                            global_step:   self.global_step,
                            epoch,
                            learning_rate: lr,
                            loss:          loss_val,
                        },
                    )?;
                }
            }

            last_epoch_loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };
            tracing::info!(
                "Epoch {:>3}/{} | train_loss={:.4}",
                epoch, self.args.num_train_epochs, last_epoch_loss
            );

            self.model = model.clone();
            if self.args.evaluate_each_epoch {
                self.evaluate(&format!("epoch_{epoch}"))?;
            }
        }

        self.model = model;
        Ok(TrainOutcome {
            global_step: self.global_step,
            train_loss:  last_epoch_loss,
        })
    }
}

fn build_loader<B: Backend>(
    dataset:    LmDataset,
    batch_size: usize,
    shuffle:    Option<u64>,
    pad_id:     u32,
    device:     &B::Device,
) -> Arc<dyn DataLoader<LmBatch<B>>> {
    let builder = DataLoaderBuilder::new(LmBatcher::<B>::new(device.clone(), pad_id))
        .batch_size(batch_size)
        .num_workers(1);
    match shuffle {
        Some(seed) => builder.shuffle(seed).build(dataset),
        None       => builder.build(dataset),
    }
}
