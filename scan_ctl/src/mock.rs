/*
    Deterministic stand-in for the instrument driver. Renders a gaussian
    feature that drifts at a constant velocity over a shared fake timeline,
    and honors commanded pixel offsets by shifting the render window, so a
    tracking session run against it behaves like a drifting instrument that
    can actually be compensated.
 */
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use ndarray::Array2;
use scan_img::{AcquisitionParams, ScanImage};

use crate::clock::Clock;
use crate::executor::{ScanCtlError, ScanExecutor, Status, PARAM_DELAY_Y, PARAM_SECS_PER_IMAGE};

#[derive(Debug,Clone)]
pub struct MockConfig {
    pub rows:usize,
    pub cols:usize,
    /// (dy,dx) pixels per second of simulated drift
    pub drift_per_sec:(f64,f64),
    /// width of the rendered gaussian feature
    pub feature_sigma:f64,
    pub n_channels:usize,
    /// how far the fake timeline advances per started scan
    pub scan_duration:Duration,
    /// number of Scanning polls reported before Idle
    pub scan_polls:usize,
    pub secs_per_image:f64,
    pub delay_y:f64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            rows: 64,
            cols: 64,
            drift_per_sec: (0.1,-0.05),
            feature_sigma: 5.0,
            n_channels: 2,
            scan_duration: Duration::from_secs(30),
            scan_polls: 2,
            secs_per_image: 20.0,
            delay_y: 4.0,
        }
    }
}

/// Fake wall clock shared between the mock instrument and whatever else
/// needs "now" in a simulated session. Advances only when told to.
#[derive(Clone)]
pub struct SharedTimeline {
    now:Arc<Mutex<SystemTime>>,
}

impl SharedTimeline {
    pub fn starting_at(t:SystemTime) -> Self {
        Self { now: Arc::new(Mutex::new(t)) }
    }

    pub fn advance(&self,d:Duration) {
        let mut now = self.now.lock().expect("timeline lock poisoned");
        *now += d;
    }
}

impl Clock for SharedTimeline {
    fn now(&self) -> SystemTime {
        *self.now.lock().expect("timeline lock poisoned")
    }
}

pub struct MockScanExecutor {
    config:MockConfig,
    timeline:SharedTimeline,
    t0:SystemTime,
    applied_offset:(f64,f64),
    current_params:Option<AcquisitionParams>,
    polls_left:usize,
    pending:Option<ScanImage>,
    saved:HashMap<String,ScanImage>,
    last_saved:Option<String>,
    save_count:usize,
    disconnected:bool,
}

impl MockScanExecutor {
    pub fn new(config:MockConfig,timeline:SharedTimeline) -> Self {
        let t0 = timeline.now();
        Self {
            config,
            timeline,
            t0,
            applied_offset: (0.0,0.0),
            current_params: None,
            polls_left: 0,
            pending: None,
            saved: HashMap::new(),
            last_saved: None,
            save_count: 0,
            disconnected: false,
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn timeline(&self) -> SharedTimeline {
        self.timeline.clone()
    }

    /// Net positional correction commanded so far, (dy,dx) in pixels.
    pub fn applied_offset(&self) -> (f64,f64) {
        self.applied_offset
    }

    /// Residual between the simulated drift and the commanded correction at
    /// the current timeline instant. Zero means perfect compensation.
    pub fn residual_drift(&self) -> (f64,f64) {
        let t = self.elapsed_secs();
        (self.config.drift_per_sec.0*t - self.applied_offset.0,
         self.config.drift_per_sec.1*t - self.applied_offset.1)
    }

    fn elapsed_secs(&self) -> f64 {
        self.timeline.now()
            .duration_since(self.t0)
            .unwrap_or(Duration::ZERO)
            .as_secs_f64()
    }

    fn render(&self,params:&AcquisitionParams) -> ScanImage {
        let (dy,dx) = self.residual_drift();
        let cy = self.config.rows as f64/2.0 + dy;
        let cx = self.config.cols as f64/2.0 + dx;
        let s2 = 2.0*self.config.feature_sigma*self.config.feature_sigma;
        let channels = (0..self.config.n_channels).map(|ch| {
            let amp = 1.0/(ch as f64 + 1.0);
            Array2::from_shape_fn((self.config.rows,self.config.cols),|(r,c)| {
                let dr = r as f64 - cy;
                let dc = c as f64 - cx;
                (amp*(-(dr*dr + dc*dc)/s2).exp()) as f32
            })
        }).collect();
        ScanImage::new(channels,self.timeline.now(),*params)
    }
}

impl ScanExecutor for MockScanExecutor {

    fn configure(&mut self,params:&AcquisitionParams) -> Result<(),ScanCtlError> {
        self.current_params = Some(*params);
        Ok(())
    }

    fn start(&mut self) -> Result<(),ScanCtlError> {
        let params = self.current_params
            .ok_or_else(|| ScanCtlError::Comm("scan started before configure".to_string()))?;
        self.timeline.advance(self.config.scan_duration);
        self.pending = Some(self.render(&params));
        self.polls_left = self.config.scan_polls;
        Ok(())
    }

    fn status(&mut self) -> Result<Status,ScanCtlError> {
        match self.polls_left {
            0 => Ok(Status::Idle),
            _=> {
                self.polls_left -= 1;
                Ok(Status::Scanning)
            }
        }
    }

    fn get_param(&mut self,name:&str) -> Result<f64,ScanCtlError> {
        match name {
            PARAM_SECS_PER_IMAGE => Ok(self.config.secs_per_image),
            PARAM_DELAY_Y => Ok(self.config.delay_y),
            _=> Err(ScanCtlError::ParamUnavailable(name.to_string()))
        }
    }

    fn save(&mut self,path_hint:Option<&str>) -> Result<String,ScanCtlError> {
        let img = self.pending.take().ok_or(ScanCtlError::NothingSaved)?;
        self.save_count += 1;
        let id = match path_hint {
            Some(hint) => format!("{}.{:04}.dat",hint,self.save_count),
            None => format!("mock.{:04}.dat",self.save_count),
        };
        self.saved.insert(id.clone(),img);
        self.last_saved = Some(id.clone());
        Ok(id)
    }

    fn last_saved(&mut self) -> Option<String> {
        self.last_saved.clone()
    }

    fn load_saved(&mut self,id:&str) -> Result<ScanImage,ScanCtlError> {
        self.saved.get(id)
            .cloned()
            .ok_or_else(|| ScanCtlError::LoadFailed(id.to_string()))
    }

    fn set_offset(&mut self,dy:f64,dx:f64) -> Result<(),ScanCtlError> {
        self.applied_offset.0 += dy;
        self.applied_offset.1 += dx;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(),ScanCtlError> {
        self.disconnected = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{initial_wait_estimate, wait_for_idle, WaitPolicy};

    fn scan_once(mock:&mut MockScanExecutor) -> ScanImage {
        let params = AcquisitionParams {
            chmode: 0,
            ddelta_x: 16,
            delta_x_dac: 64,
            channels_code: 3,
            ch_zoff: 0.0,
            ch_bias: 0.0,
            bias: 100.0,
            current: 50.0,
        };
        mock.configure(&params).unwrap();
        mock.start().unwrap();
        while mock.status().unwrap() == Status::Scanning {}
        let id = mock.save(None).unwrap();
        mock.load_saved(&id).unwrap()
    }

    #[test]
    fn scan_produces_image_and_advances_time(){
        let timeline = SharedTimeline::starting_at(SystemTime::UNIX_EPOCH);
        let mut mock = MockScanExecutor::new(MockConfig::default(),timeline.clone());
        let a = scan_once(&mut mock);
        let b = scan_once(&mut mock);
        assert_eq!(a.n_channels(),2);
        assert_eq!(a.shape(),(64,64));
        let dt = b.timestamp().duration_since(a.timestamp()).unwrap();
        assert_eq!(dt,Duration::from_secs(30));
    }

    #[test]
    fn offsets_cancel_drift(){
        let timeline = SharedTimeline::starting_at(SystemTime::UNIX_EPOCH);
        let mut mock = MockScanExecutor::new(MockConfig::default(),timeline.clone());
        timeline.advance(Duration::from_secs(100));
        let (dy,dx) = mock.residual_drift();
        mock.set_offset(dy,dx).unwrap();
        let (ry,rx) = mock.residual_drift();
        assert!(ry.abs() < 1e-9 && rx.abs() < 1e-9);
    }

    #[test]
    fn stuck_instrument_times_out(){
        let timeline = SharedTimeline::starting_at(SystemTime::UNIX_EPOCH);
        let mut mock = MockScanExecutor::new(
            MockConfig { scan_polls: usize::MAX, ..MockConfig::default() },
            timeline,
        );
        let params = AcquisitionParams {
            chmode: 0,
            ddelta_x: 16,
            delta_x_dac: 64,
            channels_code: 3,
            ch_zoff: 0.0,
            ch_bias: 0.0,
            bias: 100.0,
            current: 50.0,
        };
        mock.configure(&params).unwrap();
        mock.start().unwrap();
        let policy = WaitPolicy {
            initial: Duration::from_millis(1),
            poll: Duration::from_millis(1),
            timeout: Duration::from_millis(20),
        };
        match wait_for_idle(&mut mock,&policy) {
            Err(ScanCtlError::Timeout {..}) => {}
            other => panic!("expected timeout, got {:?}",other.map(|_| ())),
        }
    }

    #[test]
    fn timing_estimate_uses_reported_params(){
        let timeline = SharedTimeline::starting_at(SystemTime::UNIX_EPOCH);
        let mut mock = MockScanExecutor::new(MockConfig::default(),timeline);
        // 20/2 * (1 + 1/4) = 12.5 s
        let wait = initial_wait_estimate(&mut mock).unwrap();
        assert_eq!(wait,Duration::from_secs_f64(12.5));
    }
}
