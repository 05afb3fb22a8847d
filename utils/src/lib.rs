use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use glob::glob;
use ndarray::Array2;
use num_complex::Complex;
use rustfft::FftPlanner;

pub fn linspace(start:f64,end:f64,n:usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start)/(n as f64 - 1.0);
            (0..n).map(|i| start + step*i as f64).collect()
        }
    }
}

pub fn arg_max_2d(arr:&Array2<f32>) -> (usize,usize) {
    let mut idx = (0,0);
    let mut max = f32::MIN;
    for ((r,c),v) in arr.indexed_iter() {
        if *v > max {
            max = *v;
            idx = (r,c);
        }
    }
    idx
}

// map a dft bin index to a signed lag (bins past the midpoint wrap negative)
pub fn wrap_lag(idx:usize,n:usize) -> f64 {
    if idx > n/2 {
        idx as f64 - n as f64
    } else {
        idx as f64
    }
}

pub fn to_complex(arr:&Array2<f32>) -> Array2<Complex<f32>> {
    arr.mapv(|v| Complex::new(v,0.0))
}

pub fn fft_2d(arr:&Array2<Complex<f32>>) -> Array2<Complex<f32>> {
    fft_2d_impl(arr,false)
}

pub fn ifft_2d(arr:&Array2<Complex<f32>>) -> Array2<Complex<f32>> {
    let (rows,cols) = arr.dim();
    let scale = 1.0/(rows*cols) as f32;
    let mut out = fft_2d_impl(arr,true);
    out.mapv_inplace(|v| v*scale);
    out
}

fn fft_2d_impl(arr:&Array2<Complex<f32>>,inverse:bool) -> Array2<Complex<f32>> {
    let (rows,cols) = arr.dim();
    let mut planner = FftPlanner::<f32>::new();
    let row_fft = match inverse {
        true => planner.plan_fft_inverse(cols),
        false => planner.plan_fft_forward(cols),
    };
    let col_fft = match inverse {
        true => planner.plan_fft_inverse(rows),
        false => planner.plan_fft_forward(rows),
    };
    let mut out = arr.clone();
    let mut buff = vec![Complex::new(0.0,0.0);cols];
    for r in 0..rows {
        for c in 0..cols {
            buff[c] = out[[r,c]];
        }
        row_fft.process(&mut buff);
        for c in 0..cols {
            out[[r,c]] = buff[c];
        }
    }
    let mut buff = vec![Complex::new(0.0,0.0);rows];
    for c in 0..cols {
        for r in 0..rows {
            buff[r] = out[[r,c]];
        }
        col_fft.process(&mut buff);
        for r in 0..rows {
            out[[r,c]] = buff[r];
        }
    }
    out
}

pub fn read_to_string(filepath:&Path,extension:&str) -> String {
    let p = filepath.with_extension(extension);
    let mut f = File::open(&p).expect(&format!("cannot open file {:?}",p));
    let mut s = String::new();
    f.read_to_string(&mut s).expect("trouble reading file");
    s
}

pub fn write_to_file(filepath:&Path,extension:&str,string:&str){
    let p = filepath.with_extension(extension);
    let mut f = File::create(p).expect("failed to create file");
    f.write_all(string.as_bytes()).expect("trouble writing to file");
}

pub fn get_first_match(dir:&Path,pattern:&str) -> Option<PathBuf>  {
    let pat = dir.join(pattern);
    let pat = pat.to_str().expect("cannot coerce to str");
    let matches:Vec<PathBuf> = glob(pat).expect("Failed to read glob pattern").flat_map(|m| m).collect();
    match matches.is_empty() {
        true => None,
        false => Some(matches[0].clone())
    }
}
