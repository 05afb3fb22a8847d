/*
    Frequency-domain translation registration. Integer-pixel estimate from
    the cross-correlation peak, then local refinement by evaluating the
    inverse DFT on an upsampled grid around that peak (matrix DFT over a
    1.5 px neighborhood), which gives sub-pixel resolution without an
    exhaustive search.
 */
use ndarray::Array2;
use num_complex::Complex;
use utils::{arg_max_2d, fft_2d, ifft_2d, wrap_lag};

use crate::RegistrationError;

#[derive(Debug,Clone,Copy)]
pub struct Correlation {
    /// row shift mapping `dst` onto `src`
    pub dy:f64,
    /// column shift mapping `dst` onto `src`
    pub dx:f64,
    /// normalized correlation peak, 1.0 for a perfect match
    pub response:f32,
}

/// Find the translation (dy,dx) such that `dst` shifted by (dy,dx) best
/// matches `src`. `upsample_factor` n resolves shifts to 1/n of a pixel;
/// 1 disables refinement.
pub fn register_translation(src:&Array2<f32>,dst:&Array2<f32>,upsample_factor:usize)
    -> Result<Correlation,RegistrationError> {

    if src.dim() != dst.dim() {
        return Err(RegistrationError::ShapeMismatch(src.dim(),dst.dim()));
    }
    // a zero-sized plane would turn the mean into NaN and slip past the
    // norm check below
    if src.is_empty() {
        return Err(RegistrationError::DegenerateImage);
    }
    let (rows,cols) = src.dim();

    let src0 = demean(src);
    let dst0 = demean(dst);
    let src_norm = l2_norm(&src0);
    let dst_norm = l2_norm(&dst0);
    if src_norm <= f64::EPSILON || dst_norm <= f64::EPSILON {
        return Err(RegistrationError::DegenerateImage);
    }

    let f_src = fft_2d(&utils::to_complex(&src0));
    let f_dst = fft_2d(&utils::to_complex(&dst0));
    let mut cross = Array2::<Complex<f32>>::zeros((rows,cols));
    for ((r,c),v) in cross.indexed_iter_mut() {
        *v = f_src[[r,c]]*f_dst[[r,c]].conj();
    }

    let cc = ifft_2d(&cross);
    let mag = cc.mapv(|v| v.norm());
    let (pr,pc) = arg_max_2d(&mag);
    let mut dy = wrap_lag(pr,rows);
    let mut dx = wrap_lag(pc,cols);
    let response = (mag[[pr,pc]] as f64/(src_norm*dst_norm)) as f32;

    if upsample_factor > 1 {
        let usf = upsample_factor as f64;
        dy = (dy*usf).round()/usf;
        dx = (dx*usf).round()/usf;
        let region = (1.5*usf).ceil() as usize;
        let dftshift = (region/2) as f64;
        let cc_up = upsampled_dft(
            &cross,
            region,
            upsample_factor,
            dftshift - dy*usf,
            dftshift - dx*usf,
        );
        let up_mag = cc_up.mapv(|v| v.norm() as f32);
        let (ur,uc) = arg_max_2d(&up_mag);
        dy += (ur as f64 - dftshift)/usf;
        dx += (uc as f64 - dftshift)/usf;
    }

    Ok(Correlation { dy, dx, response })
}

fn demean(img:&Array2<f32>) -> Array2<f32> {
    let mean = img.sum()/img.len() as f32;
    img.mapv(|v| v - mean)
}

fn l2_norm(img:&Array2<f32>) -> f64 {
    img.iter().map(|v| (*v as f64)*(*v as f64)).sum::<f64>().sqrt()
}

// fftfreq-style bin frequencies scaled by the upsampling factor
fn dft_freqs(n:usize,upsample_factor:usize) -> Vec<f64> {
    (0..n).map(|k| {
        let kk = if k <= (n - 1)/2 {
            k as f64
        } else {
            k as f64 - n as f64
        };
        kk/(n as f64*upsample_factor as f64)
    }).collect()
}

/// Evaluate the inverse DFT of the cross-power spectrum on a `region` x
/// `region` grid with 1/upsample_factor pixel spacing, offset so the grid
/// is centered on the integer-resolution peak.
fn upsampled_dft(data:&Array2<Complex<f32>>,region:usize,upsample_factor:usize,
                 off_r:f64,off_c:f64) -> Array2<Complex<f64>> {

    let (rows,cols) = data.dim();
    let fr = dft_freqs(rows,upsample_factor);
    let fc = dft_freqs(cols,upsample_factor);
    let tau = std::f64::consts::TAU;

    let mut cols_pass = Array2::<Complex<f64>>::zeros((rows,region));
    for r in 0..rows {
        for u in 0..region {
            let mut acc = Complex::new(0.0,0.0);
            for k in 0..cols {
                let d = data[[r,k]];
                let w = Complex::from_polar(1.0,tau*fc[k]*(u as f64 - off_c));
                acc += Complex::new(d.re as f64,d.im as f64)*w;
            }
            cols_pass[[r,u]] = acc;
        }
    }

    let mut out = Array2::<Complex<f64>>::zeros((region,region));
    for v in 0..region {
        for u in 0..region {
            let mut acc = Complex::new(0.0,0.0);
            for r in 0..rows {
                let w = Complex::from_polar(1.0,tau*fr[r]*(v as f64 - off_r));
                acc += cols_pass[[r,u]]*w;
            }
            out[[v,u]] = acc;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn blob(rows:usize,cols:usize,cy:f64,cx:f64,sigma:f64) -> Array2<f32> {
        Array2::from_shape_fn((rows,cols),|(r,c)| {
            let dr = r as f64 - cy;
            let dc = c as f64 - cx;
            (-(dr*dr + dc*dc)/(2.0*sigma*sigma)).exp() as f32
        })
    }

    #[test]
    fn integer_shift_recovered(){
        let dst = blob(64,64,32.0,32.0,4.0);
        let src = blob(64,64,35.0,30.0,4.0);
        let c = register_translation(&src,&dst,1).unwrap();
        assert_eq!(c.dy,3.0);
        assert_eq!(c.dx,-2.0);
    }

    #[test]
    fn subpixel_shift_recovered(){
        let dst = blob(64,64,32.0,32.0,4.0);
        let src = blob(64,64,32.0 + 1.25,32.0 - 0.75,4.0);
        let c = register_translation(&src,&dst,20).unwrap();
        assert!((c.dy - 1.25).abs() < 0.1,"dy = {}",c.dy);
        assert!((c.dx + 0.75).abs() < 0.1,"dx = {}",c.dx);
    }

    #[test]
    fn self_registration_is_zero_with_full_response(){
        let img = blob(32,32,16.0,13.0,3.0);
        let c = register_translation(&img,&img,10).unwrap();
        assert!(c.dy.abs() < 1e-3 && c.dx.abs() < 1e-3);
        assert!(c.response > 0.99,"response = {}",c.response);
    }

    #[test]
    fn degenerate_input_rejected(){
        let flat = Array2::from_elem((32,32),1.0f32);
        let img = blob(32,32,16.0,16.0,3.0);
        match register_translation(&flat,&img,1) {
            Err(RegistrationError::DegenerateImage) => {}
            other => panic!("expected degenerate error, got {:?}",other.map(|_| ())),
        }
    }

    #[test]
    fn zero_sized_input_rejected(){
        let empty = Array2::<f32>::zeros((0,0));
        match register_translation(&empty,&empty,1) {
            Err(RegistrationError::DegenerateImage) => {}
            other => panic!("expected degenerate error, got {:?}",other.map(|_| ())),
        }
    }

    #[test]
    fn shape_mismatch_rejected(){
        let a = Array2::zeros((16,16));
        let b = Array2::zeros((16,32));
        assert!(matches!(
            register_translation(&a,&b,1),
            Err(RegistrationError::ShapeMismatch(_,_))
        ));
    }
}
