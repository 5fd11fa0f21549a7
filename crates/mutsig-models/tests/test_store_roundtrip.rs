use candle_core::{Device, Tensor};
use mutsig_models::store::{self, METADATA_FILE, WEIGHTS_FILE};
use mutsig_models::{
    load_combined, ExecutionMode, Finetuner, FinetunerHyperparams, FinetunerKind, Generator,
    GeneratorHyperparams, ModelError, ModelHandle,
};

fn generator_hp() -> GeneratorHyperparams {
    GeneratorHyperparams {
        input_dim: 8,
        num_hidden_layers: 1,
        latent_dim: 2,
    }
}

fn finetuner_hp(kind: FinetunerKind) -> FinetunerHyperparams {
    FinetunerHyperparams {
        kind,
        num_channels: 8,
        num_signatures: 3,
        num_hidden_layers: 1,
        hidden_dim: 6,
    }
}

#[test]
fn generator_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let device = Device::Cpu;
    let handle = ModelHandle::<Generator>::new(&generator_hp(), &device).unwrap();
    store::save(&handle, dir.path()).unwrap();

    assert!(dir.path().join(WEIGHTS_FILE).is_file());
    assert!(dir.path().join(METADATA_FILE).is_file());

    let loaded = store::load::<Generator>(dir.path(), &device).unwrap();
    let x = Tensor::full(0.125f32, (3, 8), &device).unwrap();
    let a = handle.model().forward(&x, ExecutionMode::Eval).unwrap();
    let b = loaded.model().forward(&x, ExecutionMode::Eval).unwrap();
    assert_eq!(
        a.reconstruction.to_vec2::<f32>().unwrap(),
        b.reconstruction.to_vec2::<f32>().unwrap()
    );
}

#[test]
fn missing_metadata_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = store::load::<Generator>(dir.path(), &Device::Cpu).err().unwrap();
    assert!(matches!(err, ModelError::MissingMetadata(p) if p.ends_with(METADATA_FILE)));
}

#[test]
fn wrong_kind_is_incompatible() {
    let dir = tempfile::tempdir().unwrap();
    let handle = ModelHandle::<Generator>::new(&generator_hp(), &Device::Cpu).unwrap();
    store::save(&handle, dir.path()).unwrap();

    let err = store::load::<Finetuner>(dir.path(), &Device::Cpu).err().unwrap();
    assert!(matches!(err, ModelError::IncompatibleMetadata { .. }));
}

#[test]
fn future_format_version_is_incompatible() {
    let dir = tempfile::tempdir().unwrap();
    let handle = ModelHandle::<Generator>::new(&generator_hp(), &Device::Cpu).unwrap();
    store::save(&handle, dir.path()).unwrap();

    let path = dir.path().join(METADATA_FILE);
    let mut meta: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    meta["format_version"] = serde_json::json!(99);
    std::fs::write(&path, meta.to_string()).unwrap();

    let err = store::load::<Generator>(dir.path(), &Device::Cpu).err().unwrap();
    assert!(matches!(err, ModelError::IncompatibleMetadata { reason, .. } if reason.contains("99")));
}

#[test]
fn mismatched_architecture_fails_on_tensors() {
    let dir = tempfile::tempdir().unwrap();
    let handle = ModelHandle::<Generator>::new(&generator_hp(), &Device::Cpu).unwrap();
    store::save(&handle, dir.path()).unwrap();

    // Metadata claims a wider latent space than the saved tensors have
    let path = dir.path().join(METADATA_FILE);
    let mut meta: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    meta["hyperparameters"]["latent_dim"] = serde_json::json!(4);
    std::fs::write(&path, meta.to_string()).unwrap();

    let err = store::load::<Generator>(dir.path(), &Device::Cpu).err().unwrap();
    assert!(matches!(err, ModelError::ModelLoad(_)));
}

#[test]
fn combined_corrector_loads_both_branches() {
    let root = tempfile::tempdir().unwrap();
    let (low_dir, large_dir) = (root.path().join("low"), root.path().join("large"));
    let device = Device::Cpu;
    store::save(
        &ModelHandle::<Finetuner>::new(&finetuner_hp(FinetunerKind::Low), &device).unwrap(),
        &low_dir,
    )
    .unwrap();
    store::save(
        &ModelHandle::<Finetuner>::new(&finetuner_hp(FinetunerKind::Large), &device).unwrap(),
        &large_dir,
    )
    .unwrap();

    let router = load_combined(&low_dir, &large_dir, 1000.0, &device).unwrap();
    let spectra = Tensor::full(0.125f32, (4, 8), &device).unwrap();
    let baseline = Tensor::full(1.0f32 / 3.0, (4, 3), &device).unwrap();
    let num_mut = Tensor::new(&[10f32, 5000.0, 999.0, 1e5], &device).unwrap();

    let out = router.correct(&spectra, &baseline, &num_mut, 0.01).unwrap();
    // K refined weights plus the unknown column
    assert_eq!(out.dims(), &[4, 4]);

    let swapped = load_combined(&large_dir, &low_dir, 1000.0, &device);
    assert!(matches!(swapped, Err(ModelError::IncompatibleMetadata { .. })));
}
