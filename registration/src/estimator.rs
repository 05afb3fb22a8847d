use log::debug;
use scan_img::ScanImage;

use crate::correlate::register_translation;
use crate::preprocess::{preprocess, PreprocessConfig};
use crate::{RegistrationError, ShiftVector};

#[derive(Debug,Clone)]
pub struct EstimatorConfig {
    /// channel indices averaged into the final estimate
    pub channels:Vec<usize>,
    pub upsample_factor:usize,
    /// abort threshold on the mean correlation response; None disables the
    /// check (degenerate images still fail regardless)
    pub min_response:Option<f32>,
    pub preprocess:PreprocessConfig,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            channels: vec![0],
            upsample_factor: 20,
            min_response: None,
            preprocess: PreprocessConfig::default(),
        }
    }
}

/// A confidence-qualified drift measurement.
#[derive(Debug,Clone,Copy)]
pub struct DriftEstimate {
    pub shift:ShiftVector,
    /// mean normalized correlation peak over the registered channels
    pub response:f32,
}

/// Measure the drift of `src` relative to `dst` (the template), averaging
/// the per-channel registrations over the configured channel subset.
pub fn estimate_drift(src:&ScanImage,dst:&ScanImage,config:&EstimatorConfig)
    -> Result<DriftEstimate,RegistrationError> {

    if config.channels.is_empty() {
        return Err(RegistrationError::NoChannels);
    }

    let mut dy_sum = 0.0;
    let mut dx_sum = 0.0;
    let mut response_sum = 0.0;
    for &ch in &config.channels {
        let src_plane = src.channel(ch)
            .ok_or(RegistrationError::BadChannel(ch,src.n_channels()))?;
        let dst_plane = dst.channel(ch)
            .ok_or(RegistrationError::BadChannel(ch,dst.n_channels()))?;
        let c = register_translation(
            &preprocess(src_plane,&config.preprocess),
            &preprocess(dst_plane,&config.preprocess),
            config.upsample_factor,
        )?;
        debug!("channel {} shift [{:.3}, {:.3}] response {:.4}",ch,c.dy,c.dx,c.response);
        dy_sum += c.dy;
        dx_sum += c.dx;
        response_sum += c.response;
    }

    let n = config.channels.len() as f64;
    let response = response_sum/config.channels.len() as f32;
    if let Some(threshold) = config.min_response {
        if response < threshold {
            return Err(RegistrationError::LowConfidence { response, threshold });
        }
    }
    Ok(DriftEstimate {
        shift: ShiftVector::instantaneous(dy_sum/n,dx_sum/n),
        response,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use scan_img::AcquisitionParams;
    use std::time::SystemTime;

    fn params() -> AcquisitionParams {
        AcquisitionParams {
            chmode: 0,
            ddelta_x: 16,
            delta_x_dac: 64,
            channels_code: 3,
            ch_zoff: 0.0,
            ch_bias: 0.0,
            bias: 100.0,
            current: 50.0,
        }
    }

    fn blob_image(cy:f64,cx:f64,n_channels:usize) -> ScanImage {
        let channels = (0..n_channels).map(|ch| {
            let amp = 1.0/(ch as f64 + 1.0);
            Array2::from_shape_fn((48,48),|(r,c)| {
                let dr = r as f64 - cy;
                let dc = c as f64 - cx;
                (amp*(-(dr*dr + dc*dc)/18.0).exp()) as f32
            })
        }).collect();
        ScanImage::new(channels,SystemTime::UNIX_EPOCH,params())
    }

    #[test]
    fn self_registration_any_subset(){
        let img = blob_image(24.0,20.0,3);
        for channels in [vec![0],vec![1,2],vec![0,1,2]] {
            let cfg = EstimatorConfig { channels, ..EstimatorConfig::default() };
            let est = estimate_drift(&img,&img,&cfg).unwrap();
            assert!(est.shift.dy.abs() < 1e-3);
            assert!(est.shift.dx.abs() < 1e-3);
        }
    }

    #[test]
    fn averaged_shift_over_channels(){
        let template = blob_image(24.0,24.0,2);
        let drifted = blob_image(26.0,23.0,2);
        let cfg = EstimatorConfig { channels: vec![0,1], ..EstimatorConfig::default() };
        let est = estimate_drift(&drifted,&template,&cfg).unwrap();
        assert!((est.shift.dy - 2.0).abs() < 0.1,"dy = {}",est.shift.dy);
        assert!((est.shift.dx + 1.0).abs() < 0.1,"dx = {}",est.shift.dx);
        assert_eq!(est.shift.kind,crate::ShiftKind::Instantaneous);
    }

    #[test]
    fn bad_channel_rejected(){
        let img = blob_image(24.0,24.0,2);
        let cfg = EstimatorConfig { channels: vec![5], ..EstimatorConfig::default() };
        assert!(matches!(
            estimate_drift(&img,&img,&cfg),
            Err(RegistrationError::BadChannel(5,2))
        ));
    }

    #[test]
    fn empty_subset_rejected(){
        let img = blob_image(24.0,24.0,2);
        let cfg = EstimatorConfig { channels: Vec::new(), ..EstimatorConfig::default() };
        assert!(matches!(
            estimate_drift(&img,&img,&cfg),
            Err(RegistrationError::NoChannels)
        ));
    }

    #[test]
    fn threshold_flags_low_confidence(){
        let template = blob_image(24.0,24.0,1);
        let drifted = blob_image(25.0,24.0,1);
        // an impossible threshold turns any real-world response into a failure
        let cfg = EstimatorConfig {
            channels: vec![0],
            min_response: Some(1.01),
            ..EstimatorConfig::default()
        };
        assert!(matches!(
            estimate_drift(&drifted,&template,&cfg),
            Err(RegistrationError::LowConfidence {..})
        ));
    }
}
