//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use candle_core::{Device, Tensor};
use tracing::{debug, error, info, warn};

use mutsig_baseline::{baseline_output_path, create_baseline_dataset, Baseline, BaselineMethod};
use mutsig_common::ExperimentConfig;
use mutsig_io::{read_column, read_table, write_table, CsvSignatureProvider};
use mutsig_metrics::{metrics_by_mutation_count, MetricsReport};
use mutsig_models::store;
use mutsig_models::{
    load_combined, refine_realistic, select_device, ClassifierNet, Generator, RefineBatch,
};
use mutsig_train::{
    append_run_summary, GeneratorTrainer, JsonLinesLogger, MultiLogger, SpectraDataset,
    TracingLogger, TrainingLogger,
};

// ── baseline ──────────────────────────────────────────────────────────────────

pub fn baseline(config: &ExperimentConfig, inputs: &[PathBuf]) -> Result<()> {
    // An unknown method stops the run before any file is touched
    let method = BaselineMethod::parse(&config.baseline.method)?;

    let provider =
        CsvSignatureProvider::new(&config.signatures.file, &config.signatures.mutation_type_order);
    let mut solver = Baseline::from_provider(&provider).with_context(|| {
        format!("loading signatures from {}", config.signatures.file.display())
    })?;
    if let Some(ms) = config.baseline.time_budget_ms {
        solver = solver.with_time_budget(Duration::from_millis(ms));
    }

    let mut failed = 0;
    for input in inputs {
        let output = baseline_output_path(input);
        match create_baseline_dataset(input, &output, &solver, method, config.baseline.workers) {
            Ok(report) => debug!("{:?}", report),
            Err(e) => {
                error!("{}: {}; skipping", input.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        warn!("{} of {} input files were skipped", failed, inputs.len());
    }
    Ok(())
}

// ── train-generator ───────────────────────────────────────────────────────────

pub fn train_generator(config: &ExperimentConfig) -> Result<()> {
    let g = &config.generator;
    let (Some(train_path), Some(val_path)) = (&g.train_input, &g.val_input) else {
        bail!("generator.train_input and generator.val_input must be set");
    };
    let train = SpectraDataset::from_file(train_path)?;
    let val = SpectraDataset::from_file(val_path)?;
    let device = select_device(&config.execution.device)?;

    let mut loggers: Vec<Box<dyn TrainingLogger>> = vec![Box::new(TracingLogger)];
    if let Some(log_file) = &g.log_file {
        let logger = JsonLinesLogger::new(log_file)?;
        info!("Training records for run {} go to {}", logger.run_id(), log_file.display());
        loggers.push(Box::new(logger));
    }
    let logger = MultiLogger::new(loggers);

    let (_, summary) = GeneratorTrainer::new(g, device, &logger).train(&train, &val)?;

    if let Some(results) = &g.results_csv {
        append_run_summary(results, g, &summary)?;
        info!("Run summary appended to {}", results.display());
    }
    Ok(())
}

// ── refine ────────────────────────────────────────────────────────────────────

pub struct RefinePaths {
    pub inputs: PathBuf,
    pub baseline: PathBuf,
    pub num_mut: PathBuf,
    pub output: PathBuf,
}

pub fn refine(config: &ExperimentConfig, paths: &RefinePaths) -> Result<()> {
    let r = &config.refine;
    let (Some(low_dir), Some(large_dir)) = (&r.low_model_dir, &r.large_model_dir) else {
        bail!("refine.low_model_dir and refine.large_model_dir must be set");
    };
    let device = select_device(&config.execution.device)?;

    let spectra = table_tensor(&paths.inputs, &device)?;
    let baseline = table_tensor(&paths.baseline, &device)?;
    let counts = read_column(&paths.num_mut)
        .with_context(|| format!("reading {}", paths.num_mut.display()))?;
    let num_mut = Tensor::from_vec(counts.clone(), counts.len(), &device)?;

    let router = load_combined(low_dir, large_dir, r.cutoff, &device)?;

    match &r.classifier_dir {
        Some(dir) => {
            let classifier = store::load::<ClassifierNet>(dir, &device)?.into_model();
            let batch = RefineBatch {
                spectra: &spectra,
                baseline: &baseline,
                num_mut: &num_mut,
            };
            let refined = refine_realistic(&router, &classifier, &batch, r.small_weight_floor)?;
            let Some(weights) = refined.weights else {
                warn!("No sample passed the realism filter; nothing written");
                return Ok(());
            };
            write_table(&paths.output, &weights.to_vec2::<f32>()?)?;

            let kept_path = sibling(&paths.output, "kept");
            let kept: Vec<[f32; 1]> = refined.kept_indices.iter().map(|&i| [i as f32]).collect();
            write_table(&kept_path, &kept)?;
            info!(
                "Refined {} of {} samples to {} (kept rows in {})",
                refined.kept_indices.len(),
                refined.input_len,
                paths.output.display(),
                kept_path.display()
            );
        }
        None => {
            let weights = router.correct(&spectra, &baseline, &num_mut, r.small_weight_floor)?;
            write_table(&paths.output, &weights.to_vec2::<f32>()?)?;
            info!("Refined {} samples to {}", counts.len(), paths.output.display());
        }
    }
    Ok(())
}

// ── evaluate ──────────────────────────────────────────────────────────────────

pub fn evaluate(guess: &Path, label: &Path, threshold: f32, num_mut: Option<&Path>) -> Result<()> {
    let mut guess_rows = read_table(guess).with_context(|| format!("reading {}", guess.display()))?;
    let label_rows = read_table(label).with_context(|| format!("reading {}", label.display()))?;

    // Refined guesses may carry a trailing unknown column
    let k = label_rows.first().map(|r| r.len()).unwrap_or(0);
    if guess_rows.first().is_some_and(|r| r.len() == k + 1) {
        info!("Dropping unknown column from {}", guess.display());
        guess_rows.iter_mut().for_each(|r| r.truncate(k));
    }

    let report = MetricsReport::compute(&guess_rows, &label_rows, threshold)?;
    println!("{}", report.to_json_pretty()?);

    if let Some(path) = num_mut {
        let counts = read_column(path).with_context(|| format!("reading {}", path.display()))?;
        let by_count = metrics_by_mutation_count(&guess_rows, &label_rows, &counts, threshold)?;
        println!("{}", serde_json::to_string_pretty(&by_count)?);
    }
    Ok(())
}

// ── generate ──────────────────────────────────────────────────────────────────

pub fn generate(config: &ExperimentConfig, model_dir: &Path, n: usize, output: &Path) -> Result<()> {
    let device = select_device(&config.execution.device)?;
    let generator = store::load::<Generator>(model_dir, &device)?.into_model();
    let samples = generator.generate(n)?.to_vec2::<f32>()?;
    write_table(output, &samples)?;
    info!("Wrote {} synthetic spectra to {}", n, output.display());
    Ok(())
}

// ── helpers ───────────────────────────────────────────────────────────────────

fn table_tensor(path: &Path, device: &Device) -> Result<Tensor> {
    let rows = read_table(path).with_context(|| format!("reading {}", path.display()))?;
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    let data: Vec<f32> = rows.iter().flatten().copied().collect();
    Ok(Tensor::from_vec(data, (rows.len(), width), device)?)
}

/// `dir/name.csv` -> `dir/name_<suffix>.csv`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    path.with_file_name(format!("{stem}_{suffix}{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_path() {
        assert_eq!(
            sibling(Path::new("out/refined.csv"), "kept"),
            PathBuf::from("out/refined_kept.csv")
        );
    }

    #[test]
    fn test_unknown_method_is_fatal() {
        let mut config = ExperimentConfig::default();
        config.baseline.method = "lasso".to_string();
        let err = baseline(&config, &[PathBuf::from("missing_input.csv")]).unwrap_err();
        assert!(err.to_string().contains("lasso"));
    }

    #[test]
    fn test_missing_input_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let sigs = dir.path().join("sigs.csv");
        let order = dir.path().join("order.csv");
        std::fs::write(&sigs, "Type,SBS1,SBS2\nA,1.0,0.0\nB,0.0,1.0\n").unwrap();
        std::fs::write(&order, "A\nB\n").unwrap();
        let good = dir.path().join("train_input.csv");
        std::fs::write(&good, "0.25,0.75\n").unwrap();

        let mut config = ExperimentConfig::default();
        config.signatures.file = sigs;
        config.signatures.mutation_type_order = order;
        config.baseline.workers = 1;

        let inputs = vec![dir.path().join("absent_input.csv"), good];
        baseline(&config, &inputs).unwrap();
        let written = read_table(dir.path().join("train_baseline.csv")).unwrap();
        assert!((written[0][1] - 0.75).abs() < 1e-6);
    }
}
