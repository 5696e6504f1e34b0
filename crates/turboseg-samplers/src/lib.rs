//! Few-step diffusion sampling
//!
//! Building blocks for adversarially distilled ("turbo") sampling:
//!
//! - [`LegacyDdpmDiscretization`] - the SD 1.x/SDXL training noise schedule as sigmas
//! - [`DiscreteDenoiser`] - epsilon-prediction scalings and sigma → timestep mapping
//! - [`SeededNoise`] / [`seeded_randn`] - reproducible gaussian noise keyed by a seed
//! - [`SubstepSampler`] - ancestral Euler over a fixed subset of the sigma table
//!
//! # Example
//!
//! ```ignore
//! use turboseg_samplers::{LegacyDdpmDiscretization, SubstepConfig, SubstepSampler};
//!
//! let discretization = LegacyDdpmDiscretization::default();
//! let sampler = SubstepSampler::new(SubstepConfig::default(), &discretization)?;
//! assert_eq!(sampler.sigmas().len(), 5);
//! ```

pub mod denoiser;
pub mod discretization;
pub mod noise;
pub mod substep;

pub use denoiser::{DiscreteDenoiser, EpsScalings};
pub use discretization::LegacyDdpmDiscretization;
pub use noise::{SeededNoise, seeded_randn};
pub use substep::{DEFAULT_STEPS_SUBSET, SubstepConfig, SubstepSampler, get_ancestral_step};
