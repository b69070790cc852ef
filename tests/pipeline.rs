use std::io::Write;
use std::path::Path;

use joint_effort::data::{self, TelemetryCache, FEATURE_DIM, LABEL_DIM, NUM_JOINTS};
use joint_effort::training::artifacts::read_loss_table;
use joint_effort::training::{
    ArtifactLayout, ArtifactWriter, EpochSummary, JointEnsemble, LossHistory, NoopObserver,
    Trainer, TrainingObserver,
};
use joint_effort::{
    ComputeContext, Dataset, EffortError, JointModel, ModelConfig, TrainingConfig,
};
use ndarray::Array2;

/// effort_j = 1 + 2·pos_j − 1.5·vel_j + 0.5·pos_{j+1}
fn linear_dataset(n: usize) -> Dataset {
    let features = Array2::from_shape_fn((n, FEATURE_DIM), |(i, k)| {
        (0.37 * i as f64 + 1.3 * k as f64).sin()
    });
    let labels = Array2::from_shape_fn((n, LABEL_DIM), |(i, j)| {
        1.0 + 2.0 * features[[i, j]] - 1.5 * features[[i, j + NUM_JOINTS]]
            + 0.5 * features[[i, (j + 1) % NUM_JOINTS]]
    });
    Dataset::new(features, labels).unwrap()
}

fn small_model() -> ModelConfig {
    ModelConfig {
        hidden_size: 16,
        ..Default::default()
    }
}

fn seeded(epochs: usize, seed: u64) -> TrainingConfig {
    TrainingConfig {
        epochs,
        shuffle_seed: Some(seed),
        init_seed: Some(seed),
        force_cpu: true,
        ..Default::default()
    }
}

#[derive(Default)]
struct RecordingObserver {
    epochs: Vec<EpochSummary>,
    rows: usize,
    started: bool,
    finished: bool,
}

impl TrainingObserver for RecordingObserver {
    fn on_run_start(&mut self, _samples: usize, _epochs: usize) {
        self.started = true;
    }

    fn on_row(
        &mut self,
        _epoch: usize,
        _row: usize,
        _total_rows: usize,
        _losses: &[f32; NUM_JOINTS],
    ) {
        self.rows += 1;
    }

    fn on_epoch_end(&mut self, summary: &EpochSummary) {
        self.epochs.push(summary.clone());
    }

    fn on_run_end(&mut self) {
        self.finished = true;
    }
}

fn assert_close(a: &LossHistory, b: &LossHistory, joints: std::ops::Range<usize>) {
    assert_eq!(a.epochs(), b.epochs());
    for epoch in 0..a.epochs() {
        for j in joints.clone() {
            let (ta, tb) = (a.train()[epoch][j], b.train()[epoch][j]);
            let (va, vb) = (a.validation()[epoch][j], b.validation()[epoch][j]);
            assert!((ta - tb).abs() <= 1e-6, "epoch {} joint {}: train {} vs {}", epoch, j, ta, tb);
            assert!((va - vb).abs() <= 1e-6, "epoch {} joint {}: val {} vs {}", epoch, j, va, vb);
        }
    }
}

#[test]
fn hundred_samples_five_epochs() -> joint_effort::Result<()> {
    let trainer = Trainer::new(&small_model(), seeded(5, 11), ComputeContext::cpu())?;
    let mut observer = RecordingObserver::default();
    let outcome = trainer.train(&linear_dataset(100), &mut observer)?;

    assert_eq!(outcome.history.train().len(), 5);
    assert_eq!(outcome.history.validation().len(), 5);
    assert!(observer.started && observer.finished);
    assert_eq!(observer.epochs.len(), 5);
    for summary in &observer.epochs {
        assert_eq!(summary.val_rows, 20);
        assert_eq!(summary.train_rows, 80);
    }
    assert_eq!(observer.rows, 5 * 80);
    Ok(())
}

#[test]
fn fixed_seeds_are_deterministic() -> joint_effort::Result<()> {
    let dataset = linear_dataset(60);

    let a = Trainer::new(&small_model(), seeded(3, 21), ComputeContext::cpu())?
        .train(&dataset, &mut NoopObserver)?;
    let b = Trainer::new(&small_model(), seeded(3, 21), ComputeContext::cpu())?
        .train(&dataset, &mut NoopObserver)?;

    assert_close(&a.history, &b.history, 0..NUM_JOINTS);
    Ok(())
}

#[test]
fn joints_train_independently() -> joint_effort::Result<()> {
    let dataset = linear_dataset(60);
    let config = seeded(3, 5);
    let ctx = ComputeContext::cpu();
    let model_cfg = small_model();

    let build = |joint0_seed: u64| -> joint_effort::Result<JointEnsemble> {
        let models = (0..NUM_JOINTS)
            .map(|j| {
                let seed = if j == 0 { joint0_seed } else { 5 + j as u64 };
                JointModel::with_seed(j, &model_cfg, &config, &ctx, seed)
            })
            .collect::<joint_effort::Result<Vec<_>>>()?;
        JointEnsemble::from_models(models)
    };

    let baseline = Trainer::with_models(build(5)?, config.clone(), ctx.clone())
        .train(&dataset, &mut NoopObserver)?;
    let perturbed = Trainer::with_models(build(1234)?, config.clone(), ctx.clone())
        .train(&dataset, &mut NoopObserver)?;

    // Joints 1..5 see exactly the same data and updates
    assert_close(&baseline.history, &perturbed.history, 1..NUM_JOINTS);

    let joint3_a = baseline.models.get(3).unwrap().snapshot()?;
    let joint3_b = perturbed.models.get(3).unwrap().snapshot()?;
    for (name, tensor) in &joint3_a {
        let diff = (tensor - &joint3_b[name])?
            .abs()?
            .sum_all()?
            .to_scalar::<f32>()?;
        assert!(diff <= 1e-6, "parameter {} differs by {}", name, diff);
    }

    // Joint 0 itself did change
    let first_a = baseline.history.train()[0][0];
    let first_b = perturbed.history.train()[0][0];
    assert_ne!(first_a, first_b);
    Ok(())
}

#[test]
fn training_loss_decreases_on_linear_targets() -> joint_effort::Result<()> {
    let config = TrainingConfig {
        epochs: 5,
        learning_rate: 1e-3,
        shuffle_seed: Some(3),
        init_seed: Some(3),
        force_cpu: true,
        ..Default::default()
    };
    let trainer = Trainer::new(&ModelConfig::default(), config, ComputeContext::cpu())?;
    let outcome = trainer.train(&linear_dataset(250), &mut NoopObserver)?;

    for joint in 0..NUM_JOINTS {
        let curve = outcome.history.joint_train_curve(joint);
        assert!(
            curve[curve.len() - 1] < curve[0],
            "joint {} did not improve: {:?}",
            joint,
            curve
        );

        let transitions = curve.len() - 1;
        let decreasing = curve.windows(2).filter(|pair| pair[1] < pair[0]).count();
        assert!(
            decreasing * 5 >= transitions * 4,
            "joint {}: only {}/{} epoch transitions decreased: {:?}",
            joint,
            decreasing,
            transitions,
            curve
        );
    }
    Ok(())
}

const TOOL_IO_LINE: &str =
    r#"{"timestamp": 0.0, "channel": "/ur/tool_io", "message": {"digital": [0, 1]}}"#;

fn write_log(path: &Path, rows: usize, drop_effort_at: Option<usize>) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    for i in 0..rows {
        let pos: Vec<f64> = (0..6).map(|k| (0.1 * i as f64 + k as f64).sin()).collect();
        let vel: Vec<f64> = (0..6).map(|k| (0.2 * i as f64 - k as f64).cos()).collect();
        let eff: Vec<f64> = (0..6).map(|k| pos[k] - 0.5 * vel[k]).collect();

        let message = if drop_effort_at == Some(i) {
            serde_json::json!({ "position": pos, "velocity": vel })
        } else {
            serde_json::json!({ "position": pos, "velocity": vel, "effort": eff })
        };
        let record = serde_json::json!({
            "timestamp": 1_584_625_339.0 + 0.01 * i as f64,
            "channel": "/ur/state_joint_current",
            "message": message,
        });
        writeln!(file, "{}", record)?;

        // interleave an unrelated channel
        writeln!(file, "{}", TOOL_IO_LINE)?;
    }
    Ok(())
}

#[test]
fn log_to_artifacts_end_to_end() -> joint_effort::Result<()> {
    let work = tempfile::tempdir()?;
    let log_path = work.path().join("run.jsonl");
    let models_dir = work.path().join("models");
    let results_dir = work.path().join("train_results");
    std::fs::create_dir(&models_dir)?;
    std::fs::create_dir(&results_dir)?;
    write_log(&log_path, 30, None)?;

    let cache = TelemetryCache::new(work.path());
    let parsed = data::load_or_parse(&log_path, "state_joint_current", &cache)?;
    assert_eq!(parsed.len(), 30);
    assert!(cache.features_path().exists() && cache.labels_path().exists());

    // The second run is served from the cache alone
    std::fs::remove_file(&log_path)?;
    let cached = data::load_or_parse(&log_path, "state_joint_current", &cache)?;
    assert_eq!(cached.len(), parsed.len());
    for (a, b) in cached.features().iter().zip(parsed.features().iter()) {
        assert!((a - b).abs() <= 1e-10);
    }

    let outcome = Trainer::new(&small_model(), seeded(2, 8), ComputeContext::cpu())?
        .train(&cached, &mut NoopObserver)?;

    let layout = ArtifactLayout::new(&models_dir, &results_dir);
    ArtifactWriter::new(layout.clone()).save(&outcome.models, &outcome.history)?;

    for joint in 0..NUM_JOINTS {
        assert!(models_dir.join(format!("network{}.safetensors", joint + 1)).is_file());
    }
    let train = read_loss_table(layout.train_loss_path())?;
    let val = read_loss_table(layout.val_loss_path())?;
    assert_eq!(train.len(), 2);
    assert_eq!(val.len(), 2);
    Ok(())
}

#[test]
fn wrong_channel_does_not_poison_cache() -> joint_effort::Result<()> {
    let work = tempfile::tempdir()?;
    let log_path = work.path().join("run.jsonl");
    write_log(&log_path, 10, None)?;

    let cache = TelemetryCache::new(work.path());
    let typo = data::load_or_parse(&log_path, "state_joint_curent", &cache)?;
    assert!(typo.is_empty());
    assert!(cache.load()?.is_none());

    let dataset = data::load_or_parse(&log_path, "state_joint_current", &cache)?;
    assert_eq!(dataset.len(), 10);
    assert_eq!(cache.load()?.map(|d| d.len()), Some(10));
    Ok(())
}

#[test]
fn missing_effort_aborts_without_cache() -> joint_effort::Result<()> {
    let work = tempfile::tempdir()?;
    let log_path = work.path().join("run.jsonl");
    write_log(&log_path, 10, Some(4))?;

    let cache = TelemetryCache::new(work.path());
    let result = data::load_or_parse(&log_path, "state_joint_current", &cache);

    match result {
        Err(EffortError::MalformedMessage { line, reason }) => {
            // two lines per sample
            assert_eq!(line, 9);
            assert!(reason.contains("effort"));
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("malformed log was accepted"),
    }
    assert!(!cache.features_path().exists());
    assert!(!cache.labels_path().exists());
    Ok(())
}
