//! Noise schedule discretization
//!
//! Converts the discrete training schedule (betas over 1000 timesteps)
//! into the sigma parameterisation used by k-diffusion style samplers.

use turboseg_core::ConfigError;

/// Legacy DDPM discretization ("scaled linear" betas)
///
/// `betas = linspace(sqrt(start), sqrt(end), n)^2`, accumulated in f64.
#[derive(Debug, Clone)]
pub struct LegacyDdpmDiscretization {
    alphas_cumprod: Vec<f64>,
}

impl Default for LegacyDdpmDiscretization {
    fn default() -> Self {
        Self::new(0.00085, 0.012, 1000)
    }
}

impl LegacyDdpmDiscretization {
    pub fn new(linear_start: f64, linear_end: f64, num_timesteps: usize) -> Self {
        let start = linear_start.sqrt();
        let end = linear_end.sqrt();
        let denom = num_timesteps.saturating_sub(1).max(1) as f64;

        let mut alphas_cumprod = Vec::with_capacity(num_timesteps);
        let mut cumprod = 1.0f64;
        for i in 0..num_timesteps {
            let beta = (start + (end - start) * i as f64 / denom).powi(2);
            cumprod *= 1.0 - beta;
            alphas_cumprod.push(cumprod);
        }

        Self { alphas_cumprod }
    }

    pub fn num_timesteps(&self) -> usize {
        self.alphas_cumprod.len()
    }

    pub fn alphas_cumprod(&self) -> &[f64] {
        &self.alphas_cumprod
    }

    /// Sigma for every training timestep, ascending (index = timestep)
    pub fn timestep_sigmas(&self) -> Vec<f32> {
        self.alphas_cumprod
            .iter()
            .map(|&ac| ((1.0 - ac) / ac).sqrt() as f32)
            .collect()
    }

    /// Descending sigmas for `num_steps` steps, with a trailing `0.0`
    ///
    /// Fewer steps than training timesteps pick roughly equally spaced
    /// timesteps, always including the last one.
    pub fn sigmas(&self, num_steps: usize) -> Result<Vec<f32>, ConfigError> {
        let n = self.num_timesteps();
        if num_steps == 0 || num_steps > n {
            return Err(ConfigError::UnsupportedSteps {
                requested: num_steps,
                min: 1,
                max: n,
            });
        }

        let table = self.timestep_sigmas();
        let mut sigmas: Vec<f32> = if num_steps == n {
            table
        } else {
            spaced_timesteps(num_steps, n)
                .into_iter()
                .map(|t| table[t])
                .collect()
        };

        sigmas.reverse();
        sigmas.push(0.0);
        Ok(sigmas)
    }
}

/// Ascending timesteps from `linspace(max - 1, 0, n, endpoint=false)`, truncated
fn spaced_timesteps(num_steps: usize, num_timesteps: usize) -> Vec<usize> {
    let start = (num_timesteps - 1) as f64;
    let step = -start / num_steps as f64;
    let mut timesteps: Vec<usize> = (0..num_steps)
        .map(|i| (start + step * i as f64) as usize)
        .collect();
    timesteps.reverse();
    timesteps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_schedule_bounds() {
        let disc = LegacyDdpmDiscretization::default();
        let sigmas = disc.sigmas(1000).unwrap();

        assert_eq!(sigmas.len(), 1001);
        assert_eq!(sigmas[1000], 0.0);
        // SD sigma_max / sigma_min
        assert!((sigmas[0] - 14.6146).abs() < 1e-3, "sigma_max={}", sigmas[0]);
        assert!((sigmas[999] - 0.0292).abs() < 1e-3, "sigma_min={}", sigmas[999]);
        assert!(sigmas.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_spaced_timesteps() {
        assert_eq!(spaced_timesteps(4, 1000), vec![249, 499, 749, 999]);
        assert_eq!(spaced_timesteps(1, 1000), vec![999]);
    }

    #[test]
    fn test_sigmas_few_steps() {
        let disc = LegacyDdpmDiscretization::default();
        let table = disc.timestep_sigmas();
        let sigmas = disc.sigmas(4).unwrap();

        assert_eq!(sigmas, vec![table[999], table[749], table[499], table[249], 0.0]);
    }

    #[test]
    fn test_sigmas_rejects_out_of_range() {
        let disc = LegacyDdpmDiscretization::default();
        assert!(disc.sigmas(0).is_err());
        assert!(disc.sigmas(1001).is_err());
    }
}
