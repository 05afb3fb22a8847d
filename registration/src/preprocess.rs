use ndarray::{Array2, Axis};

#[derive(Debug,Clone,Copy)]
pub struct PreprocessConfig {
    /// width of the smoothing kernel in pixels
    pub gaussian_sigma:f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { gaussian_sigma: 1.0 }
    }
}

/// Full normalization chain applied to a channel plane before correlation.
pub fn preprocess(img:&Array2<f32>,config:&PreprocessConfig) -> Array2<f32> {
    level_correction(&gaussian_smooth(&rescale_intensity(img),config.gaussian_sigma))
}

/// Linearly map intensities onto [0,1]. A flat plane has no usable range
/// and passes through unchanged.
pub fn rescale_intensity(img:&Array2<f32>) -> Array2<f32> {
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for v in img.iter() {
        min = min.min(*v);
        max = max.max(*v);
    }
    if !(max > min) {
        return img.clone();
    }
    let span = max - min;
    img.mapv(|v| (v - min)/span)
}

/// Separable gaussian blur with clamped borders. sigma <= 0 is a no-op.
pub fn gaussian_smooth(img:&Array2<f32>,sigma:f32) -> Array2<f32> {
    if sigma <= 0.0 {
        return img.clone();
    }
    let radius = (4.0*sigma).ceil() as isize;
    let denom = 2.0*sigma*sigma;
    let mut kernel:Vec<f32> = (-radius..=radius)
        .map(|i| (-((i*i) as f32)/denom).exp())
        .collect();
    let sum:f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);

    let (rows,cols) = img.dim();
    let clamp = |idx:isize,n:usize| idx.clamp(0,n as isize - 1) as usize;

    let mut rows_pass = Array2::<f32>::zeros((rows,cols));
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0.0;
            for (k,w) in kernel.iter().enumerate() {
                let cc = clamp(c as isize + k as isize - radius,cols);
                acc += w*img[[r,cc]];
            }
            rows_pass[[r,c]] = acc;
        }
    }
    let mut out = Array2::<f32>::zeros((rows,cols));
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0.0;
            for (k,w) in kernel.iter().enumerate() {
                let rr = clamp(r as isize + k as isize - radius,rows);
                acc += w*rows_pass[[rr,c]];
            }
            out[[r,c]] = acc;
        }
    }
    out
}

/// Remove the per-line baseline: probe images carry a slowly varying offset
/// from one scan line to the next, which would dominate the correlation.
pub fn level_correction(img:&Array2<f32>) -> Array2<f32> {
    let mut out = img.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let mean = row.sum()/row.len() as f32;
        row.mapv_inplace(|v| v - mean);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};

    #[test]
    fn rescale_full_range(){
        let img = arr2(&[[2.0f32,4.0],[6.0,10.0]]);
        let r = rescale_intensity(&img);
        assert_eq!(r[[0,0]],0.0);
        assert_eq!(r[[1,1]],1.0);
        assert!((r[[0,1]] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn flat_image_passes_through(){
        let img = Array2::from_elem((8,8),3.7f32);
        let out = preprocess(&img,&PreprocessConfig::default());
        // flat in, flat out: rescale is degenerate, smoothing preserves it,
        // level correction zeroes every row
        for v in out.iter() {
            assert!(v.abs() < 1e-5);
        }
    }

    #[test]
    fn smoothing_preserves_mean(){
        // the image must be large enough that the kernel support around the
        // spike stays in-range; the clamped border would otherwise reweight
        // the tails and shift the mean
        let mut img = Array2::<f32>::zeros((11,11));
        img[[5,5]] = 10.0;
        let sm = gaussian_smooth(&img,1.0);
        let mean_in = img.sum()/img.len() as f32;
        let mean_out = sm.sum()/sm.len() as f32;
        assert!((mean_in - mean_out).abs() < 1e-3,"mean drift = {}",(mean_in - mean_out).abs());
        // energy spreads off the peak
        assert!(sm[[5,5]] < 10.0);
        assert!(sm[[5,6]] > 0.0);
    }

    #[test]
    fn level_correction_zeroes_row_means(){
        let img = arr2(&[[1.0f32,2.0,3.0],[10.0,20.0,30.0]]);
        let lc = level_correction(&img);
        for row in lc.axis_iter(ndarray::Axis(0)) {
            assert!(row.sum().abs() < 1e-5);
        }
    }
}
