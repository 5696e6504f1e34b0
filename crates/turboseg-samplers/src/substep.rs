//! Ancestral Euler sampling over a fixed sigma subset
//!
//! Distilled "turbo" models are trained to denoise from a handful of
//! specific noise levels. Instead of spacing the steps evenly, the sampler
//! indexes the full descending sigma table at fixed positions
//! (`steps_subset`) and always finishes on the trailing zero sigma.

use burn::prelude::*;
use turboseg_core::ConfigError;

use crate::denoiser::{DiscreteDenoiser, EpsScalings};
use crate::discretization::LegacyDdpmDiscretization;
use crate::noise::SeededNoise;

/// Positions in the 1001-entry descending sigma table
///
/// Index 1000 is the appended zero sigma.
pub const DEFAULT_STEPS_SUBSET: [usize; 5] = [0, 100, 200, 300, 1000];

/// Sub-step sampler configuration
#[derive(Debug, Clone)]
pub struct SubstepConfig {
    /// Number of denoising iterations (1..=steps_subset.len() - 1)
    pub n_sample_steps: usize,
    /// Training timesteps of the discretization
    pub num_train_steps: usize,
    /// Ancestral noise amount (0 = deterministic Euler)
    pub eta: f32,
    /// Noise scale multiplier
    pub s_noise: f32,
    /// Table positions to sample at; the last entry is the final sigma
    pub steps_subset: Vec<usize>,
}

impl Default for SubstepConfig {
    fn default() -> Self {
        Self {
            n_sample_steps: 4,
            num_train_steps: 1000,
            eta: 1.0,
            s_noise: 1.0,
            steps_subset: DEFAULT_STEPS_SUBSET.to_vec(),
        }
    }
}

impl SubstepConfig {
    pub fn with_steps(mut self, n_sample_steps: usize) -> Self {
        self.n_sample_steps = n_sample_steps;
        self
    }

    pub fn with_eta(mut self, eta: f32) -> Self {
        self.eta = eta;
        self
    }
}

/// Split a step from `sigma` to `sigma_next` into a deterministic part and a noise part
///
/// Returns `(sigma_down, sigma_up)`. With `eta = 0` this is a plain ODE step.
pub fn get_ancestral_step(sigma: f32, sigma_next: f32, eta: f32) -> (f32, f32) {
    if eta == 0.0 {
        return (sigma_next, 0.0);
    }

    let sigma_up = (eta
        * (sigma_next.powi(2) * (sigma.powi(2) - sigma_next.powi(2)) / sigma.powi(2)).sqrt())
    .min(sigma_next);
    let sigma_down = (sigma_next.powi(2) - sigma_up.powi(2)).max(0.0).sqrt();

    (sigma_down, sigma_up)
}

/// Euler ancestral sampler restricted to `steps_subset`
#[derive(Debug, Clone)]
pub struct SubstepSampler {
    sigmas: Vec<f32>,
    denoiser: DiscreteDenoiser,
    eta: f32,
    s_noise: f32,
}

impl SubstepSampler {
    /// Build the sampler, validating the step count before anything runs
    pub fn new(
        config: SubstepConfig,
        discretization: &LegacyDdpmDiscretization,
    ) -> Result<Self, ConfigError> {
        let max_steps = config.steps_subset.len().saturating_sub(1);
        let n = config.n_sample_steps;
        let unsupported = ConfigError::UnsupportedSteps {
            requested: n,
            min: 1,
            max: max_steps,
        };
        if n == 0 || n > max_steps {
            return Err(unsupported);
        }

        let table = discretization.sigmas(config.num_train_steps)?;
        let positions = config.steps_subset[..n]
            .iter()
            .chain(config.steps_subset.last());
        let sigmas: Vec<f32> = positions.filter_map(|&i| table.get(i).copied()).collect();
        if sigmas.len() != n + 1 {
            return Err(unsupported);
        }

        Ok(Self {
            sigmas,
            denoiser: DiscreteDenoiser::new(discretization),
            eta: config.eta,
            s_noise: config.s_noise,
        })
    }

    /// Sigmas visited, including the final one
    pub fn sigmas(&self) -> &[f32] {
        &self.sigmas
    }

    /// Number of denoising iterations
    pub fn num_steps(&self) -> usize {
        self.sigmas.len() - 1
    }

    /// Training timestep the network is conditioned on at `step_index`
    pub fn timestep(&self, step_index: usize) -> usize {
        self.denoiser.timestep(self.sigmas[step_index])
    }

    /// Preconditioning for the network input at `step_index`
    pub fn scalings(&self, step_index: usize) -> EpsScalings {
        self.denoiser.scalings(self.sigmas[step_index])
    }

    /// Scale unit-variance noise to the first noise level
    pub fn prepare_latent<B: Backend>(&self, noise: Tensor<B, 4>) -> Tensor<B, 4> {
        let sigma = self.sigmas[0];
        noise * (1.0 + sigma * sigma).sqrt()
    }

    /// Denoised estimate from the network output evaluated on `latent * c_in`
    pub fn denoise<B: Backend>(
        &self,
        latent: Tensor<B, 4>,
        model_output: Tensor<B, 4>,
        step_index: usize,
    ) -> Tensor<B, 4> {
        self.denoiser
            .denoise(latent, model_output, self.sigmas[step_index])
    }

    /// One ancestral Euler step from `sigmas[step_index]` to `sigmas[step_index + 1]`
    ///
    /// Fresh noise is drawn from `noise` only when the next sigma is non-zero.
    pub fn step<B: Backend>(
        &self,
        latent: Tensor<B, 4>,
        denoised: Tensor<B, 4>,
        step_index: usize,
        noise: &mut SeededNoise,
    ) -> Tensor<B, 4> {
        let sigma = self.sigmas[step_index];
        let sigma_next = self.sigmas[step_index + 1];
        let (sigma_down, sigma_up) = get_ancestral_step(sigma, sigma_next, self.eta);

        let derivative = (latent.clone() - denoised) / sigma;
        let latent = latent + derivative * (sigma_down - sigma);

        if sigma_next > 0.0 && sigma_up > 0.0 {
            let device = latent.device();
            let fresh = noise.next::<B, 4>(latent.dims(), &device);
            latent + fresh * (self.s_noise * sigma_up)
        } else {
            latent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn sampler(config: SubstepConfig) -> Result<SubstepSampler, ConfigError> {
        SubstepSampler::new(config, &LegacyDdpmDiscretization::default())
    }

    fn to_vec(t: Tensor<TestBackend, 4>) -> Vec<f32> {
        t.into_data().to_vec().unwrap()
    }

    #[test]
    fn test_default_subset_timesteps() {
        let sampler = sampler(SubstepConfig::default()).unwrap();
        assert_eq!(sampler.num_steps(), 4);
        assert_eq!(sampler.sigmas().len(), 5);
        assert_eq!(sampler.sigmas()[4], 0.0);

        let timesteps: Vec<usize> = (0..4).map(|i| sampler.timestep(i)).collect();
        assert_eq!(timesteps, vec![999, 899, 799, 699]);
    }

    #[test]
    fn test_fewer_steps_keep_final_sigma() {
        let sampler = sampler(SubstepConfig::default().with_steps(1)).unwrap();
        assert_eq!(sampler.num_steps(), 1);
        assert_eq!(sampler.sigmas()[1], 0.0);
        assert_eq!(sampler.timestep(0), 999);
    }

    #[test]
    fn test_rejects_unsupported_steps() {
        for n in [0, 5] {
            assert_eq!(
                sampler(SubstepConfig::default().with_steps(n)).unwrap_err(),
                ConfigError::UnsupportedSteps {
                    requested: n,
                    min: 1,
                    max: 4
                }
            );
        }
    }

    #[test]
    fn test_ancestral_step_split() {
        let (down, up) = get_ancestral_step(2.0, 1.0, 1.0);
        assert!((down.powi(2) + up.powi(2) - 1.0).abs() < 1e-6);
        assert!(up <= 1.0);

        assert_eq!(get_ancestral_step(2.0, 1.0, 0.0), (1.0, 0.0));
        assert_eq!(get_ancestral_step(2.0, 0.0, 1.0), (0.0, 0.0));
    }

    #[test]
    fn test_prepare_latent_scale() {
        let device = Default::default();
        let sampler = sampler(SubstepConfig::default()).unwrap();
        let sigma = sampler.sigmas()[0];
        let latent = sampler.prepare_latent(Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device));

        for v in to_vec(latent) {
            assert!((v - (1.0 + sigma * sigma).sqrt()).abs() < 1e-4);
        }
    }

    #[test]
    fn test_final_step_returns_denoised() {
        let device = Default::default();
        let sampler = sampler(SubstepConfig::default()).unwrap();
        let latent = Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device) * 3.0;
        let denoised = Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device) * 0.25;

        let mut noise = SeededNoise::new(0);
        let out = sampler.step(latent, denoised, 3, &mut noise);

        for v in to_vec(out) {
            assert!((v - 0.25).abs() < 1e-5);
        }
        // Last step never draws noise
        assert_eq!(noise.seed(), 0);
    }

    #[test]
    fn test_ancestral_step_reproducible() {
        let device = Default::default();
        let sampler = sampler(SubstepConfig::default()).unwrap();
        let latent = Tensor::<TestBackend, 4>::ones([1, 4, 4, 4], &device);
        let denoised = Tensor::<TestBackend, 4>::zeros([1, 4, 4, 4], &device);

        let mut a = SeededNoise::new(5);
        let mut b = SeededNoise::new(5);
        let out_a = sampler.step(latent.clone(), denoised.clone(), 0, &mut a);
        let out_b = sampler.step(latent, denoised, 0, &mut b);

        assert_eq!(a.seed(), 6);
        assert_eq!(to_vec(out_a), to_vec(out_b));
    }
}
