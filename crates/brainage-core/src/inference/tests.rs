//! Tests for the inference engine and its mode guard.

use candle_core::{DType, Tensor};

use crate::bins::AgeRange;
use crate::config::ArchitectureKind;
use crate::determinism;
use crate::device::ComputeDevice;
use crate::error::PredictionError;
use crate::model::ModelAdapter;

use super::*;

fn adapted(seed: u64, range: AgeRange) -> (ModelAdapter, ComputeDevice) {
    let device = ComputeDevice::parse("cpu").unwrap();
    determinism::seed_all(seed, &device).unwrap();
    let mut adapter = ModelAdapter::new(ArchitectureKind::Sfcn, &device).unwrap();
    adapter
        .adapt_output_layer(range.span().round() as usize)
        .unwrap();
    (adapter, device)
}

fn test_volume(device: &ComputeDevice) -> Tensor {
    // Deterministic, structured input rather than random noise.
    let data: Vec<f32> = (0..32 * 32 * 32)
        .map(|i| (i as f32 * 0.01).sin() * 0.5 + 0.5)
        .collect();
    Tensor::from_vec(data, (32, 32, 32), device.device()).unwrap()
}

#[test]
fn test_predict_stays_inside_range() {
    let range = AgeRange::new(42.0, 82.0).unwrap();
    let (adapter, device) = adapted(21, range);
    let engine = InferenceEngine::new(&adapter, range).unwrap();

    let estimate = engine.predict(&test_volume(&device)).unwrap();
    assert!(estimate.is_finite());
    assert!(
        (range.start..range.end).contains(&estimate),
        "estimate {estimate} escaped the configured range"
    );
}

#[test]
fn test_predict_accepts_4d_and_5d() {
    let range = AgeRange::new(42.0, 82.0).unwrap();
    let (adapter, device) = adapted(22, range);
    let engine = InferenceEngine::new(&adapter, range).unwrap();

    let volume = test_volume(&device);
    let flat = engine.predict(&volume).unwrap();
    let channeled = engine.predict(&volume.unsqueeze(0).unwrap()).unwrap();
    let batched = engine
        .predict(&volume.unsqueeze(0).unwrap().unsqueeze(0).unwrap())
        .unwrap();

    assert_eq!(flat, channeled);
    assert_eq!(flat, batched);
}

#[test]
fn test_predict_rejects_2d_input() {
    let range = AgeRange::new(42.0, 82.0).unwrap();
    let (adapter, device) = adapted(23, range);
    let engine = InferenceEngine::new(&adapter, range).unwrap();

    let image = Tensor::zeros((32, 32), DType::F32, device.device()).unwrap();
    let err = engine.predict(&image).unwrap_err();
    assert!(matches!(err, PredictionError::UnsupportedRank { rank: 2 }));
}

#[test]
fn test_predict_rejects_head_width_mismatch() {
    // Network head adapted to 40 bins, engine decoding over 50.
    let narrow = AgeRange::new(42.0, 82.0).unwrap();
    let wide = AgeRange::new(40.0, 90.0).unwrap();
    let (adapter, device) = adapted(24, narrow);
    let engine = InferenceEngine::new(&adapter, wide).unwrap();

    let err = engine.predict(&test_volume(&device)).unwrap_err();
    assert!(matches!(
        err,
        PredictionError::ShapeMismatch {
            context: "network output",
            expected: 50,
            actual: 40,
        }
    ));
}

#[test]
fn test_guard_restores_modes_after_success() {
    let range = AgeRange::new(42.0, 82.0).unwrap();
    let (adapter, device) = adapted(25, range);
    let engine = InferenceEngine::new(&adapter, range).unwrap();

    let network = adapter.network();
    network.set_training(true);
    network.set_grad_enabled(true);

    engine.predict(&test_volume(&device)).unwrap();

    assert!(network.is_training());
    assert!(network.grad_enabled());
}

#[test]
fn test_guard_restores_modes_after_failure() {
    let range = AgeRange::new(42.0, 82.0).unwrap();
    let (adapter, device) = adapted(26, range);
    let engine = InferenceEngine::new(&adapter, range).unwrap();

    let network = adapter.network();
    network.set_training(true);
    network.set_grad_enabled(true);

    // Too small to survive five spatial halvings: the forward pass fails.
    let tiny = Tensor::zeros((8, 8, 8), DType::F32, device.device()).unwrap();
    assert!(engine.predict(&tiny).is_err());

    assert!(network.is_training());
    assert!(network.grad_enabled());
}

#[test]
fn test_guard_scopes_modes() {
    let range = AgeRange::new(42.0, 82.0).unwrap();
    let (adapter, _device) = adapted(27, range);
    let network = adapter.network();

    network.set_training(true);
    network.set_grad_enabled(true);
    {
        let _guard = InferenceGuard::enter(network);
        assert!(!network.is_training());
        assert!(!network.grad_enabled());
    }
    assert!(network.is_training());
    assert!(network.grad_enabled());
}
