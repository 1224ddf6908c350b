use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::Normal;

use crate::error::{NetError, Result};
use crate::util::format_name;

/// Named strategy for sampling initial weights.
#[derive(Debug, Clone, Copy)]
pub enum Distribution {
    /// U(-l, l) with l = sqrt(6 / (fan_in + fan_out)). The default.
    XavierUniform,
    /// N(0, sqrt(2 / (fan_in + fan_out))).
    XavierNormal,
    /// U(-l, l) with l = sqrt(3 / fan_in).
    LecunUniform,
    /// N(0, sqrt(1 / fan_in)).
    LecunNormal,
    /// U(-limit, limit).
    Uniform,
    /// N(mean, std_deviation).
    Gaussian,
    /// Caller-supplied sampler; bypasses every built-in rule.
    Custom(fn(usize, &WeightsConfig, &mut StdRng) -> Vec<f64>),
}

/// Weight initialisation settings.
///
/// The network resolves one of these from its options; every layer then gets
/// its own copy, completed with the fan-in/fan-out of its position.
#[derive(Debug, Clone)]
pub struct WeightsConfig {
    pub distribution: Distribution,
    pub limit: Option<f64>,
    pub mean: Option<f64>,
    pub std_deviation: Option<f64>,
    pub fan_in: Option<usize>,
    pub fan_out: Option<usize>,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        WeightsConfig {
            distribution: Distribution::XavierUniform,
            limit: None,
            mean: None,
            std_deviation: None,
            fan_in: None,
            fan_out: None,
        }
    }
}

impl Distribution {
    pub fn from_name(name: &str) -> Result<Distribution> {
        match format_name(name).as_str() {
            "xavieruniform" => Ok(Distribution::XavierUniform),
            "xaviernormal" => Ok(Distribution::XavierNormal),
            "lecununiform" => Ok(Distribution::LecunUniform),
            "lecunnormal" => Ok(Distribution::LecunNormal),
            "uniform" => Ok(Distribution::Uniform),
            "gaussian" => Ok(Distribution::Gaussian),
            other => Err(NetError::UnknownDistribution(other.to_string())),
        }
    }
}

impl WeightsConfig {
    /// Samples `count` weights.
    pub fn generate(&self, count: usize, rng: &mut StdRng) -> Vec<f64> {
        // A layer's own fan-out is only known once its successor joins, so it
        // may still be absent here.
        let fan_in = self.fan_in.unwrap_or(count).max(1) as f64;
        let fan_out = self.fan_out.unwrap_or(0) as f64;

        match self.distribution {
            Distribution::XavierUniform => uniform(count, (6.0 / (fan_in + fan_out)).sqrt(), rng),
            Distribution::XavierNormal => gaussian(count, 0.0, (2.0 / (fan_in + fan_out)).sqrt(), rng),
            Distribution::LecunUniform => uniform(count, (3.0 / fan_in).sqrt(), rng),
            Distribution::LecunNormal => gaussian(count, 0.0, (1.0 / fan_in).sqrt(), rng),
            Distribution::Uniform => uniform(count, self.limit.unwrap_or(0.1), rng),
            Distribution::Gaussian => gaussian(
                count,
                self.mean.unwrap_or(0.0),
                self.std_deviation.unwrap_or(0.05),
                rng,
            ),
            Distribution::Custom(f) => f(count, self, rng),
        }
    }
}

fn uniform(count: usize, limit: f64, rng: &mut StdRng) -> Vec<f64> {
    let limit = limit.abs();
    (0..count).map(|_| rng.gen_range(-limit..=limit)).collect()
}

fn gaussian(count: usize, mean: f64, std_deviation: f64, rng: &mut StdRng) -> Vec<f64> {
    match Normal::new(mean, std_deviation.abs()) {
        Ok(normal) => (0..count).map(|_| rng.sample(normal)).collect(),
        Err(_) => vec![mean; count],
    }
}
