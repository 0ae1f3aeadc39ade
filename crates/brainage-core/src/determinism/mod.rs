//! Process-wide random-seed control for reproducible runs.
//!
//! All randomness in the pipeline flows through one shared generator, so a
//! single [`seed_all`] call pins every randomized computation (currently:
//! output-layer re-initialization). When the target device is an
//! accelerator, the accelerator RNG is seeded as well and the
//! deterministic-kernels flag is latched.
//!
//! This is process-wide mutable state with no teardown: re-seeding simply
//! overwrites the previous state. Seed before any randomized computation,
//! and serialize calls if seeding from more than one call site; concurrent
//! seeding is not supported.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use crate::device::ComputeDevice;
use crate::error::PredictionResult;

static SHARED_RNG: Lazy<Mutex<StdRng>> = Lazy::new(|| Mutex::new(StdRng::seed_from_u64(0)));

/// Latched once an accelerator has been seeded; kernels must then avoid
/// non-deterministic fast paths. Never cleared.
static DETERMINISTIC_KERNELS: AtomicBool = AtomicBool::new(false);

/// Seed every random source the pipeline consumes.
///
/// Seeds the shared host generator; on an accelerator device additionally
/// seeds the device RNG and latches deterministic kernel selection.
///
/// # Errors
/// Propagates backend failures from accelerator RNG seeding.
pub fn seed_all(seed: u64, device: &ComputeDevice) -> PredictionResult<()> {
    *SHARED_RNG.lock() = StdRng::seed_from_u64(seed);

    if device.is_accelerator() {
        device.device().set_seed(seed)?;
        DETERMINISTIC_KERNELS.store(true, Ordering::SeqCst);
        info!(seed, device = device.spec(), "seeded host and accelerator RNGs");
    } else {
        info!(seed, device = device.spec(), "seeded host RNG");
    }

    Ok(())
}

/// Run `f` with exclusive access to the shared seeded generator.
pub fn with_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    f(&mut SHARED_RNG.lock())
}

/// Whether deterministic kernel selection has been latched.
#[must_use]
pub fn deterministic_kernels() -> bool {
    DETERMINISTIC_KERNELS.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_reseeding_reproduces_sequence() {
        // Re-seed and draw inside one lock section so concurrently running
        // tests that also draw from the shared generator cannot interleave.
        let draw = || -> Vec<u32> {
            with_rng(|rng| {
                *rng = StdRng::seed_from_u64(42);
                (0..4).map(|_| rng.gen()).collect()
            })
        };
        assert_eq!(draw(), draw());
    }

    #[test]
    fn test_seed_all_succeeds_on_cpu() {
        let device = ComputeDevice::parse("cpu").unwrap();
        seed_all(42, &device).unwrap();
    }

    #[test]
    fn test_cpu_seeding_does_not_latch_deterministic_kernels() {
        let device = ComputeDevice::parse("cpu").unwrap();
        seed_all(7, &device).unwrap();
        // The latch may have been set by another test seeding an
        // accelerator, but a CPU-only seed never sets it on its own; this
        // test suite runs without accelerators.
        assert!(!deterministic_kernels());
    }
}
