/*
    In-memory model of a captured probe-microscope image: one 2d plane per
    recorded channel, the acquisition timestamp, and the scan parameters the
    instrument was configured with when the image was taken. Parsing of the
    on-disk vendor format is the driver's job, not ours.
 */
use std::time::SystemTime;
use ndarray::Array2;
use serde::{Serialize,Deserialize};

/// Scan parameters as handed to the instrument before a scan. Field names
/// track the vendor parameter set (chmode, ddeltaX, deltaX_dac, ...).
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
pub struct AcquisitionParams {
    /// 0 = constant current, 1 = constant height
    pub chmode:i32,
    /// scan speed, dac increments per clock tick
    pub ddelta_x:i32,
    /// pixel step size in dac units
    pub delta_x_dac:i32,
    /// bitmask of recorded channels
    pub channels_code:i32,
    /// tip height offset in angstrom (constant height mode)
    pub ch_zoff:f32,
    /// secondary bias in mV (constant height mode)
    pub ch_bias:f32,
    pub bias:f32,
    pub current:f32,
}

impl AcquisitionParams {
    /// Same geometry and feedback settings, but with zeroed height/bias
    /// offsets. This is what an alignment scan against the template uses.
    pub fn with_zero_offsets(&self) -> Self {
        Self {
            ch_zoff: 0.0,
            ch_bias: 0.0,
            ..*self
        }
    }
}

#[derive(Debug,Clone)]
pub struct ScanImage {
    channels:Vec<Array2<f32>>,
    timestamp:SystemTime,
    params:AcquisitionParams,
}

impl ScanImage {

    /// Panics if `channels` is empty or the planes disagree in shape;
    /// a captured image always has at least one plane of uniform size.
    pub fn new(channels:Vec<Array2<f32>>,timestamp:SystemTime,params:AcquisitionParams) -> Self {
        if channels.is_empty() {
            panic!("a scan image must carry at least one channel");
        }
        let dim = channels[0].dim();
        for ch in &channels {
            if ch.dim() != dim {
                panic!("scan image channels disagree in shape: {:?} vs {:?}",ch.dim(),dim);
            }
        }
        Self {
            channels,
            timestamp,
            params,
        }
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self,idx:usize) -> Option<&Array2<f32>> {
        self.channels.get(idx)
    }

    pub fn shape(&self) -> (usize,usize) {
        self.channels[0].dim()
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn params(&self) -> &AcquisitionParams {
        &self.params
    }
}
