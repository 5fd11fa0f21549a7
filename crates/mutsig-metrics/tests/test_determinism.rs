use mutsig_metrics::{MetricsReport, DEFAULT_THRESHOLD};
use proptest::prelude::*;

fn arb_batch(n: usize, k: usize) -> impl Strategy<Value = Vec<Vec<f32>>> {
    prop::collection::vec(prop::collection::vec(0.0f32..1.0, k), n)
}

fn arb_pair() -> impl Strategy<Value = (Vec<Vec<f32>>, Vec<Vec<f32>>)> {
    (1usize..20, 1usize..8).prop_flat_map(|(n, k)| (arb_batch(n, k), arb_batch(n, k)))
}

proptest! {
    #[test]
    fn repeated_evaluation_is_bit_identical((pred, truth) in arb_pair()) {
        let a = MetricsReport::compute(&pred, &truth, DEFAULT_THRESHOLD).unwrap();
        let b = MetricsReport::compute(&pred, &truth, DEFAULT_THRESHOLD).unwrap();

        prop_assert_eq!(a.mae.to_bits(), b.mae.to_bits());
        prop_assert_eq!(a.kl.to_bits(), b.kl.to_bits());
        prop_assert_eq!(a.js.to_bits(), b.js.to_bits());
        prop_assert_eq!(a.precision.to_bits(), b.precision.to_bits());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn rates_are_never_nan((pred, truth) in arb_pair()) {
        let r = MetricsReport::compute(&pred, &truth, DEFAULT_THRESHOLD).unwrap();
        for v in [r.accuracy, r.precision, r.sensitivity, r.specificity, r.fpr, r.fnr, r.kl, r.js] {
            prop_assert!(v.is_finite());
        }
    }
}

#[test]
fn all_zero_label_column_yields_defined_rates() {
    let pred = vec![vec![0.5, 0.0], vec![0.5, 0.2]];
    let truth = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
    let r = MetricsReport::compute(&pred, &truth, DEFAULT_THRESHOLD).unwrap();

    // Column 1 has no positives; the one false positive still counts
    assert_eq!(r.counts.fp, 1);
    assert!(r.precision.is_finite());
    assert!(r.sensitivity.is_finite());
    assert_eq!(r.sensitivity, 1.0);

    let truth_zero = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
    let r = MetricsReport::compute(&pred, &truth_zero, DEFAULT_THRESHOLD).unwrap();
    assert_eq!(r.sensitivity, 0.0);
    assert_eq!(r.fnr, 0.0);
    assert_eq!(r.precision, 0.0);
}
