use std::path::{Path, PathBuf};
use registration::estimator::EstimatorConfig;
use registration::preprocess::PreprocessConfig;
use serde::{Deserialize, Serialize};

/// Session-level configuration, loaded from a toml file.
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct TrackingConfig {
    /// trailing length of saved-file identifiers in log records
    pub filename_log_len:usize,
    pub template:TemplateConfig,
    pub registration:RegistrationConfig,
    pub timing:TimingConfig,
    pub sweep:SweepConfig,
    pub reference_scan:ReferenceScanConfig,
    pub data_scan:DataScanConfig,
}

#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct TemplateConfig {
    /// take the instrument's most recently saved image as the template
    pub use_last_as_template:bool,
    /// fallback lookup location when not using the most recent image
    pub template_folder:Option<PathBuf>,
    pub template_file:Option<String>,
}

#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct RegistrationConfig {
    /// channel indices used for shift registration
    pub channels:Vec<usize>,
    pub upsample_factor:usize,
    /// abort threshold on correlation response; omit to disable the check
    pub min_response:Option<f32>,
    pub gaussian_sigma:f32,
}

#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct TimingConfig {
    /// settle time after commanding a positional offset, seconds
    pub reposition_delay_sec:f64,
    /// delay between scan status polls, seconds
    pub poll_interval_sec:f64,
    /// give up on a scan that has not reported idle after this long, seconds
    pub scan_timeout_sec:f64,
}

#[derive(Debug,Clone,Serialize,Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SweepConfig {
    /// bias and current each range linearly over `steps`; no height offset
    ConstantCurrent {
        start_bias_mv:f32,
        end_bias_mv:f32,
        start_current_pa:f32,
        end_current_pa:f32,
        steps:usize,
    },
    /// height ranges over `steps` with bias/current pinned to the template;
    /// an inner loop sweeps a secondary bias over `sub_bias_steps`
    ConstantHeight {
        start_height:f32,
        end_height:f32,
        steps:usize,
        start_sub_bias_mv:f32,
        end_sub_bias_mv:f32,
        sub_bias_steps:usize,
    },
}

/// Constant-current reference capture between alignment and data scan,
/// replacing the extrapolation baseline when enabled.
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct ReferenceScanConfig {
    pub in_use:bool,
    pub channels_code:i32,
    pub delta_x_dac:i32,
}

#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct DataScanConfig {
    pub ddelta_x:i32,
    pub channels_code:i32,
}

impl TrackingConfig {

    pub fn default_config() -> Self {
        Self {
            filename_log_len: 18,
            template: TemplateConfig {
                use_last_as_template: true,
                template_folder: None,
                template_file: None,
            },
            registration: RegistrationConfig {
                channels: vec![0],
                upsample_factor: 20,
                min_response: None,
                gaussian_sigma: 1.0,
            },
            timing: TimingConfig {
                reposition_delay_sec: 10.0,
                poll_interval_sec: 5.0,
                scan_timeout_sec: 1800.0,
            },
            sweep: SweepConfig::ConstantCurrent {
                start_bias_mv: 100.0,
                end_bias_mv: 500.0,
                start_current_pa: 30.0,
                end_current_pa: 30.0,
                steps: 5,
            },
            reference_scan: ReferenceScanConfig {
                in_use: false,
                channels_code: 3,
                delta_x_dac: 64,
            },
            data_scan: DataScanConfig {
                ddelta_x: 16,
                channels_code: 3,
            },
        }
    }

    pub fn from_file(filepath:&Path) -> Self {
        let s = utils::read_to_string(filepath,"toml");
        toml::from_str(&s).expect("cannot parse session config")
    }

    pub fn to_file(&self,filepath:&Path) {
        let s = toml::to_string(self).expect("cannot serialize session config");
        utils::write_to_file(filepath,"toml",&s);
    }

    pub fn estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig {
            channels: self.registration.channels.clone(),
            upsample_factor: self.registration.upsample_factor,
            min_response: self.registration.min_response,
            preprocess: PreprocessConfig {
                gaussian_sigma: self.registration.gaussian_sigma,
            },
        }
    }
}
