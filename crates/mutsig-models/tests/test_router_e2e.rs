use candle_core::{Device, Tensor};
use mutsig_models::{
    refine_realistic, CombinedCorrector, Corrector, CorrectorInput, ModelError, Partition,
    RealismClassifier, RefineBatch, Result,
};
use proptest::prelude::*;

/// Returns the baseline guess unchanged.
struct Identity;

impl Corrector for Identity {
    fn correct(&self, input: &CorrectorInput<'_>) -> Result<Tensor> {
        Ok(input.baseline.clone())
    }
}

/// Marks its output so tests can tell which branch handled a row.
struct Offset(f32);

impl Corrector for Offset {
    fn correct(&self, input: &CorrectorInput<'_>) -> Result<Tensor> {
        Ok((input.baseline + self.0 as f64)?)
    }
}

/// Scores every sample with a fixed list of probabilities.
struct FixedScores(Vec<f32>);

impl RealismClassifier for FixedScores {
    fn score(&self, spectra: &Tensor, _num_mut: &Tensor) -> Result<Tensor> {
        Ok(Tensor::new(self.0.as_slice(), spectra.device())?)
    }
}

fn identity_router(cutoff: f32) -> CombinedCorrector {
    CombinedCorrector::new(Box::new(Identity), Box::new(Identity), cutoff, Device::Cpu)
}

/// Row i carries the marker value i in every column.
fn marked(n: usize, width: usize) -> Tensor {
    let data: Vec<f32> = (0..n).flat_map(|i| vec![i as f32; width]).collect();
    Tensor::from_vec(data, (n, width), &Device::Cpu).unwrap()
}

#[test]
fn ten_samples_two_branches_identity_round_trip() {
    let device = Device::Cpu;
    let k = 5;
    let num_mut = vec![
        20f32, 5000.0, 300.0, 999.0, 1001.0, 1000.0, 64.0, 25_000.0, 7.0, 1500.0,
    ];
    let partition = Partition::by_cutoff(&num_mut, 1000.0);
    assert_eq!(partition.low.len(), 6);
    assert_eq!(partition.high.len(), 4);

    let baseline: Vec<f32> = (0..10 * k).map(|v| v as f32 / 100.0).collect();
    let baseline = Tensor::from_vec(baseline, (10, k), &device).unwrap();
    let spectra = Tensor::full(1.0f32 / 96.0, (10, 96), &device).unwrap();
    let num_mut = Tensor::from_vec(num_mut, 10, &device).unwrap();

    let out = identity_router(1000.0)
        .correct(&spectra, &baseline, &num_mut, 0.01)
        .unwrap();

    assert_eq!(out.dims(), &[10, k]);
    assert_eq!(
        out.to_vec2::<f32>().unwrap(),
        baseline.to_vec2::<f32>().unwrap()
    );
}

#[test]
fn each_branch_handles_its_own_rows() {
    let device = Device::Cpu;
    let router = CombinedCorrector::new(Box::new(Offset(0.0)), Box::new(Offset(100.0)), 50.0, device.clone());
    let baseline = marked(4, 2);
    let spectra = marked(4, 3);
    let num_mut = Tensor::new(&[10f32, 60.0, 50.0, 51.0], &device).unwrap();

    let out = router.correct(&spectra, &baseline, &num_mut, 0.0).unwrap();
    let rows = out.to_vec2::<f32>().unwrap();
    assert_eq!(rows[0], vec![0.0, 0.0]);
    assert_eq!(rows[1], vec![101.0, 101.0]);
    assert_eq!(rows[2], vec![2.0, 2.0]);
    assert_eq!(rows[3], vec![103.0, 103.0]);
}

#[test]
fn single_branch_batches_are_routed() {
    let device = Device::Cpu;
    let baseline = marked(3, 2);
    let spectra = marked(3, 4);
    let all_low = Tensor::new(&[1f32, 2.0, 3.0], &device).unwrap();
    let all_high = Tensor::new(&[1e4f32, 2e4, 3e4], &device).unwrap();

    for counts in [all_low, all_high] {
        let out = identity_router(1000.0)
            .correct(&spectra, &baseline, &counts, 0.01)
            .unwrap();
        assert_eq!(out.to_vec2::<f32>().unwrap(), baseline.to_vec2::<f32>().unwrap());
    }
}

#[test]
fn mismatched_batch_sizes_rejected() {
    let device = Device::Cpu;
    let err = identity_router(1000.0).correct(
        &marked(3, 4),
        &marked(2, 2),
        &Tensor::new(&[1f32, 2.0, 3.0], &device).unwrap(),
        0.01,
    );
    assert!(matches!(err, Err(ModelError::InvalidInput(_))));
}

#[test]
fn realism_filter_shrinks_batch_consistently() {
    let device = Device::Cpu;
    let spectra = marked(5, 4);
    let baseline = marked(5, 3);
    let num_mut = Tensor::new(&[10f32, 2000.0, 30.0, 4000.0, 50.0], &device).unwrap();
    let classifier = FixedScores(vec![0.9, 0.5, 0.2, 0.51, 0.7]);

    let batch = RefineBatch {
        spectra: &spectra,
        baseline: &baseline,
        num_mut: &num_mut,
    };
    let refined = refine_realistic(&identity_router(1000.0), &classifier, &batch, 0.01).unwrap();

    assert_eq!(refined.kept_indices, vec![0, 3, 4]);
    assert_eq!(refined.dropped(), 2);
    assert_eq!(refined.num_mut, vec![10.0, 4000.0, 50.0]);
    assert_eq!(refined.scores, vec![0.9, 0.51, 0.7]);
    let weights = refined.weights.unwrap().to_vec2::<f32>().unwrap();
    assert_eq!(weights, vec![vec![0.0; 3], vec![3.0; 3], vec![4.0; 3]]);
}

#[test]
fn realism_filter_with_no_survivors() {
    let device = Device::Cpu;
    let spectra = marked(2, 4);
    let baseline = marked(2, 3);
    let num_mut = Tensor::new(&[10f32, 20.0], &device).unwrap();
    let batch = RefineBatch {
        spectra: &spectra,
        baseline: &baseline,
        num_mut: &num_mut,
    };

    let refined =
        refine_realistic(&identity_router(1000.0), &FixedScores(vec![0.1, 0.4]), &batch, 0.01)
            .unwrap();
    assert!(refined.weights.is_none());
    assert!(refined.kept_indices.is_empty());
    assert_eq!(refined.dropped(), 2);
}

// ── Order preservation and partition completeness ───────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn merge_preserves_input_order(
        counts in prop::collection::vec(0f32..5000.0, 1..40),
        cutoff in 0f32..5000.0,
    ) {
        let n = counts.len();
        let device = Device::Cpu;
        let router = CombinedCorrector::new(
            Box::new(Offset(0.0)),
            Box::new(Offset(0.0)),
            cutoff,
            device.clone(),
        );
        let baseline = marked(n, 3);
        let spectra = marked(n, 6);
        let num_mut = Tensor::from_vec(counts, n, &device).unwrap();

        let out = router.correct(&spectra, &baseline, &num_mut, 0.0).unwrap();
        let rows = out.to_vec2::<f32>().unwrap();
        prop_assert_eq!(rows.len(), n);
        for (i, row) in rows.iter().enumerate() {
            prop_assert!(row.iter().all(|v| *v == i as f32));
        }
    }

    #[test]
    fn partition_covers_every_index_once(
        counts in prop::collection::vec(0f32..5000.0, 0..60),
        cutoff in 0f32..5000.0,
    ) {
        let p = Partition::by_cutoff(&counts, cutoff);
        let mut seen: Vec<usize> = p.low.iter().chain(&p.high).copied().collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..counts.len()).collect::<Vec<_>>());
        prop_assert!(p.low.iter().all(|&i| counts[i] <= cutoff));
        prop_assert!(p.high.iter().all(|&i| counts[i] > cutoff));
    }
}
