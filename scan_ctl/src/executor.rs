/*
    Adapter boundary to the instrument driver. The sequencer only ever talks
    to the `ScanExecutor` trait; the vendor binding (COM/TCP) lives outside
    this workspace and implements it there.
 */
use std::thread;
use std::time::{Duration, Instant};
use log::debug;
use scan_img::{AcquisitionParams, ScanImage};
use thiserror::Error;

/// Instrument timing parameter names, as reported by the scan software.
pub const PARAM_SECS_PER_IMAGE:&str = "Sec/Image:";
pub const PARAM_DELAY_Y:&str = "Delay Y";

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum Status {
    Idle,
    Scanning,
    Unknown,
}

impl Status {
    pub fn from_id(id:i32) -> Self {
        use Status::*;
        match id {
            0 => Idle,
            1 => Scanning,
            _=> Unknown
        }
    }
}

#[derive(Debug,Error)]
pub enum ScanCtlError {
    #[error("instrument communication failed: {0}")]
    Comm(String),
    #[error("instrument did not report idle within {waited:?}")]
    Timeout { waited:Duration },
    #[error("instrument parameter {0} is unavailable")]
    ParamUnavailable(String),
    #[error("no saved image available from the instrument")]
    NothingSaved,
    #[error("saved image {0} cannot be loaded")]
    LoadFailed(String),
}

/// Blocking surface of the scan software. Every call is synchronous from the
/// caller's point of view; only the physical scan itself runs asynchronously
/// on the instrument and is observed through `status`.
pub trait ScanExecutor {
    /// Push a full parameter set to the instrument before starting a scan.
    fn configure(&mut self,params:&AcquisitionParams) -> Result<(),ScanCtlError>;
    /// Begin a scan. Returns as soon as the instrument has accepted the
    /// command; completion is observed by polling `status`.
    fn start(&mut self) -> Result<(),ScanCtlError>;
    fn status(&mut self) -> Result<Status,ScanCtlError>;
    /// Read a named instrument parameter (timing values and the like).
    fn get_param(&mut self,name:&str) -> Result<f64,ScanCtlError>;
    /// Persist the most recent scan, returning its stored identifier.
    fn save(&mut self,path_hint:Option<&str>) -> Result<String,ScanCtlError>;
    /// Identifier of the most recently saved image, if any.
    fn last_saved(&mut self) -> Option<String>;
    /// Load a previously saved image back into memory.
    fn load_saved(&mut self,id:&str) -> Result<ScanImage,ScanCtlError>;
    /// Apply a pixel-space positional correction to the scan window.
    fn set_offset(&mut self,dy:f64,dx:f64) -> Result<(),ScanCtlError>;
    fn disconnect(&mut self) -> Result<(),ScanCtlError> {
        Ok(())
    }
}

#[derive(Debug,Clone,Copy)]
pub struct WaitPolicy {
    /// slept once before the first status poll
    pub initial:Duration,
    /// fixed delay between polls
    pub poll:Duration,
    /// total budget, measured from the first poll
    pub timeout:Duration,
}

/// Estimate how long to wait before the first status poll, from the
/// instrument-reported per-image duration and line delay:
/// secs_per_image / 2 * (1 + 1/delay_y). Avoids hammering the status
/// channel while a scan that takes minutes is known to be in flight.
pub fn initial_wait_estimate<E>(executor:&mut E) -> Result<Duration,ScanCtlError>
    where E:ScanExecutor + ?Sized {
    let secs_per_image = executor.get_param(PARAM_SECS_PER_IMAGE)?;
    let delay_y = executor.get_param(PARAM_DELAY_Y)?;
    if delay_y <= 0.0 {
        return Err(ScanCtlError::ParamUnavailable(PARAM_DELAY_Y.to_string()));
    }
    let secs = secs_per_image/2.0*(1.0 + 1.0/delay_y);
    Ok(Duration::from_secs_f64(secs.max(0.0)))
}

/// Block until the instrument reports idle. Bounded: a scan that never
/// terminates surfaces as `ScanCtlError::Timeout` instead of spinning
/// forever.
pub fn wait_for_idle<E>(executor:&mut E,policy:&WaitPolicy) -> Result<(),ScanCtlError>
    where E:ScanExecutor + ?Sized {
    thread::sleep(policy.initial);
    let started = Instant::now();
    loop {
        match executor.status()? {
            Status::Idle => {
                debug!("instrument idle after {:?}",policy.initial + started.elapsed());
                return Ok(())
            }
            s => {
                debug!("instrument status {:?}, waiting",s);
            }
        }
        if started.elapsed() >= policy.timeout {
            return Err(ScanCtlError::Timeout { waited: policy.initial + started.elapsed() });
        }
        thread::sleep(policy.poll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ids(){
        assert_eq!(Status::from_id(0),Status::Idle);
        assert_eq!(Status::from_id(1),Status::Scanning);
        assert_eq!(Status::from_id(9),Status::Unknown);
    }
}
