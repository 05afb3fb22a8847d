/*
    Sub-pixel drift measurement between probe-microscope images.

    The pipeline mirrors the registration chain used at the instrument:
    rescale -> gaussian smooth -> line-wise level correction, then
    frequency-domain cross-correlation with local upsampled-DFT refinement,
    averaged over the configured channel subset. Extrapolation projects a
    measured shift forward along the session timeline.
 */
pub mod correlate;
pub mod estimator;
pub mod extrapolate;
pub mod preprocess;

use thiserror::Error;

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum ShiftKind {
    /// measured between two images, valid at the source image's timestamp
    Instantaneous,
    /// projected forward to a future acquisition instant
    Extrapolated,
}

/// A 2-d translation in pixel units, (row, column).
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct ShiftVector {
    pub dy:f64,
    pub dx:f64,
    pub kind:ShiftKind,
}

impl ShiftVector {
    pub fn instantaneous(dy:f64,dx:f64) -> Self {
        Self { dy, dx, kind: ShiftKind::Instantaneous }
    }
}

#[derive(Debug,Error)]
pub enum RegistrationError {
    #[error("constant-valued image; correlation is undefined")]
    DegenerateImage,
    #[error("correlation response {response:.4} below configured threshold {threshold:.4}")]
    LowConfidence { response:f32, threshold:f32 },
    #[error("channel {0} out of range, image has {1} channels")]
    BadChannel(usize,usize),
    #[error("no registration channels configured")]
    NoChannels,
    #[error("image shapes differ: {0:?} vs {1:?}")]
    ShapeMismatch((usize,usize),(usize,usize)),
    #[error("elapsed baseline interval is not positive; cannot extrapolate")]
    ZeroBaseline,
}
