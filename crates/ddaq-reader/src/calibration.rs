//! Conversion of raw ADC counts into physical units.

use serde::{Deserialize, Serialize};

/// Fixed calibration constants of the ddaq acquisition chain.
///
/// All probe channels share the same ADC: a 16-bit converter spanning
/// `full_scale_volts`. The bias channel sits behind a divider of ratio
/// `bias_gain`, and probe currents are measured across a `current_divisor`
/// ohm shunt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Full-scale input range of the ADC in volts
    #[serde(default = "default_full_scale")]
    pub full_scale_volts: f64,
    /// Largest ADC count (2^16 - 1 for the ddaq boards)
    #[serde(default = "default_adc_max_count")]
    pub adc_max_count: u32,
    /// Gain applied to the bias-voltage channel
    #[serde(default = "default_bias_gain")]
    pub bias_gain: f64,
    /// Divisor turning a probe-channel voltage into amperes
    #[serde(default = "default_current_divisor")]
    pub current_divisor: f64,
    /// Sampling period in seconds
    #[serde(default = "default_sample_period")]
    pub sample_period_s: f64,
    /// Channel whose sample count defines the time axis
    #[serde(default = "default_time_channel")]
    pub time_channel: u32,
    /// Channel carrying the bias voltage
    #[serde(default = "default_bias_channel")]
    pub bias_channel: u32,
}

fn default_full_scale() -> f64 {
    20.0
}

fn default_adc_max_count() -> u32 {
    u16::MAX as u32
}

fn default_bias_gain() -> f64 {
    11.75
}

fn default_current_divisor() -> f64 {
    213.0
}

fn default_sample_period() -> f64 {
    1e-6
}

fn default_time_channel() -> u32 {
    2
}

fn default_bias_channel() -> u32 {
    7
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            full_scale_volts: default_full_scale(),
            adc_max_count: default_adc_max_count(),
            bias_gain: default_bias_gain(),
            current_divisor: default_current_divisor(),
            sample_period_s: default_sample_period(),
            time_channel: default_time_channel(),
            bias_channel: default_bias_channel(),
        }
    }
}

impl Calibration {
    /// Volts represented by a single ADC count.
    pub fn volts_per_count(&self) -> f64 {
        self.full_scale_volts / f64::from(self.adc_max_count)
    }

    /// Time axis in seconds for `samples` points.
    pub fn time_axis(&self, samples: usize) -> Vec<f64> {
        (0..samples)
            .map(|i| i as f64 * self.sample_period_s)
            .collect()
    }

    /// Bias voltage in volts from raw counts.
    pub fn bias_voltage(&self, raw: &[f64]) -> Vec<f64> {
        let factor = self.volts_per_count() * self.bias_gain;
        raw.iter().map(|&count| count * factor).collect()
    }

    /// Probe current in amperes from raw counts.
    pub fn current(&self, raw: &[f64]) -> Vec<f64> {
        let factor = self.volts_per_count() / self.current_divisor;
        raw.iter().map(|&count| count * factor).collect()
    }
}
