//! Discrete-time denoiser wrapper for epsilon-prediction models

use burn::prelude::*;

use crate::discretization::LegacyDdpmDiscretization;

/// Preconditioning factors for an epsilon-prediction network
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsScalings {
    pub c_skip: f32,
    pub c_out: f32,
    pub c_in: f32,
}

impl EpsScalings {
    pub fn for_sigma(sigma: f32) -> Self {
        Self {
            c_skip: 1.0,
            c_out: -sigma,
            c_in: 1.0 / (sigma * sigma + 1.0).sqrt(),
        }
    }
}

/// Maps continuous sigmas back onto the model's training timesteps
///
/// The network only knows integer timesteps, so every sigma is quantized
/// to the nearest entry of the training table before use.
#[derive(Debug, Clone)]
pub struct DiscreteDenoiser {
    /// Ascending sigma per training timestep
    sigmas: Vec<f32>,
}

impl DiscreteDenoiser {
    pub fn new(discretization: &LegacyDdpmDiscretization) -> Self {
        Self {
            sigmas: discretization.timestep_sigmas(),
        }
    }

    /// Training timestep whose sigma is closest to `sigma`
    pub fn timestep(&self, sigma: f32) -> usize {
        self.sigmas
            .iter()
            .enumerate()
            .fold((0, f32::INFINITY), |(best, best_dist), (t, &s)| {
                let dist = (s - sigma).abs();
                if dist < best_dist {
                    (t, dist)
                } else {
                    (best, best_dist)
                }
            })
            .0
    }

    /// Snap `sigma` onto the training table
    pub fn quantize(&self, sigma: f32) -> f32 {
        self.sigmas[self.timestep(sigma)]
    }

    pub fn scalings(&self, sigma: f32) -> EpsScalings {
        EpsScalings::for_sigma(self.quantize(sigma))
    }

    /// Combine the network output with the noisy input into a denoised estimate
    ///
    /// `model_output` must come from the network evaluated on `x * c_in`.
    pub fn denoise<B: Backend>(
        &self,
        x: Tensor<B, 4>,
        model_output: Tensor<B, 4>,
        sigma: f32,
    ) -> Tensor<B, 4> {
        let s = self.scalings(sigma);
        x * s.c_skip + model_output * s.c_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_timestep_round_trip() {
        let disc = LegacyDdpmDiscretization::default();
        let denoiser = DiscreteDenoiser::new(&disc);
        let table = disc.timestep_sigmas();

        for t in [0, 1, 249, 500, 999] {
            assert_eq!(denoiser.timestep(table[t]), t);
        }
        // Between two entries snaps to the nearer one
        let mid = table[10] + (table[11] - table[10]) * 0.25;
        assert_eq!(denoiser.timestep(mid), 10);
    }

    #[test]
    fn test_scalings() {
        let s = EpsScalings::for_sigma(0.0);
        assert_eq!(s.c_in, 1.0);
        assert_eq!(s.c_out, 0.0);

        let s = EpsScalings::for_sigma(3.0);
        assert!((s.c_in - 1.0 / 10.0f32.sqrt()).abs() < 1e-6);
        assert_eq!(s.c_out, -3.0);
    }

    #[test]
    fn test_denoise_subtracts_scaled_noise() {
        let device = Default::default();
        let disc = LegacyDdpmDiscretization::default();
        let denoiser = DiscreteDenoiser::new(&disc);
        let sigma = disc.timestep_sigmas()[999];

        let x = Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device);
        let eps = Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device);
        let denoised: Vec<f32> = denoiser.denoise(x, eps, sigma).into_data().to_vec().unwrap();

        for v in denoised {
            assert!((v - (1.0 - sigma)).abs() < 1e-5);
        }
    }
}
