// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Staged fine-tuning of the pretrained summarizer:
//
//   for each TrainStage { trainable_groups, epochs, lr_max }:
//     freeze_to(model, trainable_groups)
//     fresh AdamW + one-cycle schedule over the stage's steps
//     for each epoch: train → validate → log → checkpoint
//
// Burn notes:
//   - Training runs on an AutodiffBackend (Autodiff<Wgpu>)
//   - model.valid() returns the model on the inner backend,
//     so the validation batcher is built for B::InnerBackend
//   - Frozen parameters have no gradient, so AdamW skips them
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use anyhow::{bail, Result};
use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::SummaryBatcher, dataset::SummaryDataset};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
    pretrained::PretrainedDir,
};
use crate::ml::{
    freeze::{freeze_to, trainable_params},
    loss::SequenceLoss,
    model::{BartConfig, BartModel},
    schedule::OneCycleSchedule,
};

pub type MyBackend      = burn::backend::Autodiff<burn::backend::Wgpu>;
pub type MyInnerBackend = burn::backend::Wgpu;

/// Build the model on the GPU, load the pretrained weights and fine-tune.
pub fn run_training(
    cfg:           &TrainConfig,
    model_cfg:     &BartConfig,
    pretrained:    &PretrainedDir,
    train_dataset: SummaryDataset,
    val_dataset:   SummaryDataset,
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
) -> Result<BartModel<MyBackend>> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    let model: BartModel<MyBackend> = model_cfg.init(&device);
    let model = pretrained.load_weights(model, &device)?;
    tracing::info!(
        "Model ready: {} encoder / {} decoder layers, d_model={}, {} parameters",
        model_cfg.encoder_layers,
        model_cfg.decoder_layers,
        model_cfg.d_model,
        model.num_params(),
    );

    train_loop(
        cfg,
        model,
        model_cfg.pad_token_id as u32,
        train_dataset,
        val_dataset,
        ckpt_manager,
        metrics,
        device,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn train_loop<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    mut model:     BartModel<B>,
    pad_id:        u32,
    train_dataset: SummaryDataset,
    val_dataset:   SummaryDataset,
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
    device:        B::Device,
) -> Result<BartModel<B>> {
    if train_dataset.is_empty() {
        bail!("The training split is empty; nothing to fine-tune on");
    }
    let loss_fn = SequenceLoss::new(pad_id);
    let steps_per_epoch = train_dataset.len().div_ceil(cfg.batch_size);

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = DataLoaderBuilder::new(SummaryBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_dataset);

    let val_loader = DataLoaderBuilder::new(SummaryBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    let mut best_val_loss = f64::INFINITY;

    for (stage_idx, stage) in cfg.stages.iter().enumerate() {
        let stage_no = stage_idx + 1;

        // ── Unfreeze the top groups and start a fresh optimiser ───────────────
        model = freeze_to(model, stage.trainable_groups);
        tracing::info!(
            "Stage {}/{}: top {} groups trainable ({} params), {} epochs, lr_max={}",
            stage_no,
            cfg.stages.len(),
            stage.trainable_groups,
            trainable_params(&model),
            stage.epochs,
            stage.lr_max,
        );

        let mut optim = AdamWConfig::new()
            .with_weight_decay(cfg.weight_decay as f32)
            .with_grad_clipping(Some(GradientClippingConfig::Norm(cfg.grad_clip as f32)))
            .init::<B, BartModel<B>>();
        let schedule = OneCycleSchedule::new(stage.lr_max, steps_per_epoch * stage.epochs);
        let mut step = 0usize;

        for epoch in 1..=stage.epochs {

            // ── Training phase ────────────────────────────────────────────────
            let mut train_loss_sum = 0.0f64;
            let mut train_batches  = 0usize;
            let mut lr             = schedule.lr_at(step);

            for batch in train_loader.iter() {
                let (loss, _) = model.forward_loss(batch, &loss_fn);

                train_loss_sum += loss.clone().into_scalar().elem::<f64>();
                train_batches  += 1;

                lr = schedule.lr_at(step);
                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(lr, model, grads);
                step += 1;
            }

            let avg_train_loss = if train_batches > 0 {
                train_loss_sum / train_batches as f64
            } else { f64::NAN };

            // ── Validation phase ──────────────────────────────────────────────
            // dropout disabled, no autodiff graph
            let model_valid = model.valid();

            let mut val_loss_sum = 0.0f64;
            let mut val_batches  = 0usize;

            for batch in val_loader.iter() {
                let (loss, _) = model_valid.forward_loss(batch, &loss_fn);
                val_loss_sum += loss.into_scalar().elem::<f64>();
                val_batches  += 1;
            }

            let avg_val_loss = if val_batches > 0 {
                val_loss_sum / val_batches as f64
            } else { f64::NAN };

            println!(
                "Stage {}/{} | Epoch {:>3}/{} | train_loss={:.4} | valid_loss={:.4} | lr={:.2e}",
                stage_no, cfg.stages.len(), epoch, stage.epochs, avg_train_loss, avg_val_loss, lr,
            );

            let row = EpochMetrics::new(stage_no, epoch, avg_train_loss, avg_val_loss, lr);
            if row.is_improvement(best_val_loss) {
                best_val_loss = avg_val_loss;
                tracing::info!("New best valid_loss {:.4}", best_val_loss);
            }
            metrics.log(&row)?;

            ckpt_manager.save_model(&model, stage_no, epoch)?;
            tracing::info!("Checkpoint saved for stage {} epoch {}", stage_no, epoch);
        }
    }

    tracing::info!("Training complete!");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainStage;
    use crate::data::dataset::SummarySample;
    use crate::ml::model::fixtures::tiny_config;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn dataset(n: usize) -> SummaryDataset {
        SummaryDataset::new(
            (0..n)
                .map(|i| {
                    let word = 4 + (i % 6) as u32;
                    SummarySample::new(
                        vec![0, word, 5, 6, 2, 1],
                        vec![1, 1, 1, 1, 1, 0],
                        vec![0, word, 2, 1],
                        2,
                    )
                })
                .collect(),
        )
    }

    fn config(stages: Vec<TrainStage>) -> TrainConfig {
        TrainConfig { batch_size: 2, stages, ..TrainConfig::default() }
    }

    #[test]
    fn test_two_stages_log_and_checkpoint_every_epoch() {
        let dir     = tempfile::tempdir().unwrap();
        let ckpt    = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new(dir.path()).unwrap();
        let cfg = config(vec![
            TrainStage { trainable_groups: 2, epochs: 1, lr_max: 1e-3 },
            TrainStage { trainable_groups: 4, epochs: 2, lr_max: 5e-4 },
        ]);
        let model: BartModel<TestBackend> = tiny_config().init(&Default::default());

        let trained = train_loop(
            &cfg, model, 1, dataset(4), dataset(2), &ckpt, &metrics, Default::default(),
        )
        .unwrap();

        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 1 + 3);
        assert!(csv.lines().nth(3).unwrap().starts_with("2,2,"));

        let latest = ckpt.latest_checkpoint().unwrap();
        assert_eq!((latest.stage, latest.epoch), (2, 2));

        // The last stage leaves the encoder frozen
        let encoder = trained.encoder.num_params();
        assert_eq!(trainable_params(&trained) + encoder + 10, trained.num_params());
    }

    #[test]
    fn test_frozen_groups_do_not_move() {
        let dir     = tempfile::tempdir().unwrap();
        let ckpt    = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new(dir.path()).unwrap();
        let cfg = config(vec![TrainStage { trainable_groups: 1, epochs: 1, lr_max: 1e-2 }]);

        let model: BartModel<TestBackend> = tiny_config().init(&Default::default());
        let before = model.shared.weight.val().into_data();

        let trained = train_loop(
            &cfg, model, 1, dataset(4), dataset(0), &ckpt, &metrics, Default::default(),
        )
        .unwrap();

        trained.shared.weight.val().into_data().assert_eq(&before, true);
    }

    #[test]
    fn test_empty_train_split_is_error() {
        let dir     = tempfile::tempdir().unwrap();
        let ckpt    = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new(dir.path()).unwrap();
        let model: BartModel<TestBackend> = tiny_config().init(&Default::default());

        let result = train_loop(
            &config(TrainConfig::default().stages), model, 1, dataset(0), dataset(0),
            &ckpt, &metrics, Default::default(),
        );
        assert!(result.is_err());
    }
}
