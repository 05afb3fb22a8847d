/*
    The sequencer. One session walks the sweep plan in order; for every
    condition it measures drift against the template, projects it to the
    repositioning instant, commands the compensating offset, optionally
    refreshes the extrapolation baseline with a constant-current reference
    capture, and then takes the data scan. A closing reference capture at
    the template's settings ends the session.

    Everything is synchronous and single-threaded. An external interrupt
    flag is observed at state boundaries only, never mid-scan. No failure
    is retried: any instrument or registration error ends the session and
    leaves the instrument in its last commanded state.
 */
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use log::{debug, info, warn};
use registration::estimator::estimate_drift;
use registration::extrapolate::extrapolate;
use registration::RegistrationError;
use scan_ctl::{initial_wait_estimate, wait_for_idle, Clock, ScanCtlError, ScanExecutor, WaitPolicy};
use scan_img::{AcquisitionParams, ScanImage};
use serde::Serialize;
use thiserror::Error;

use crate::config::TrackingConfig;
use crate::sweep::{build_sweep, chmode, ScanCondition};

#[derive(Debug,Error)]
pub enum SessionError {
    #[error("no usable template: {0}")]
    Configuration(String),
    #[error(transparent)]
    ScanCtl(#[from] ScanCtlError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize)]
pub enum SessionOutcome {
    Completed,
    Interrupted,
}

#[derive(Debug,Clone,Serialize)]
pub struct SessionSummary {
    pub outcome:SessionOutcome,
    /// number of sweep conditions whose data scan completed
    pub conditions_done:usize,
    /// saved identifiers of the data scans, in execution order
    pub data_files:Vec<String>,
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
enum SequencerState {
    Init,
    AlignScan,
    Register,
    Extrapolate,
    ApplyOffset,
    ReferenceScan,
    DataScan,
    FinalReference,
    Done,
}

pub struct Session<E,C> {
    executor:E,
    clock:C,
    config:TrackingConfig,
    interrupt:Arc<AtomicBool>,
}

impl<E,C> Session<E,C>
    where E:ScanExecutor, C:Clock {

    pub fn new(executor:E,clock:C,config:TrackingConfig) -> Self {
        Self {
            executor,
            clock,
            config,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for requesting termination from outside (signal handler, ui).
    /// Observed at state boundaries; a scan already in flight completes.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// Share an externally owned interrupt flag instead of the built-in one.
    pub fn with_interrupt(mut self,flag:Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn run(&mut self) -> Result<SessionSummary,SessionError> {
        let result = self.run_states();
        if result.is_err() {
            // finish() only runs on the completed/interrupted paths; a
            // fatal exit still closes the instrument connection
            if let Err(e) = self.executor.disconnect() {
                warn!("disconnect failed: {}",e);
            }
        }
        result
    }

    fn run_states(&mut self) -> Result<SessionSummary,SessionError> {
        self.enter(SequencerState::Init);
        let template = self.resolve_template()?;
        let mut previous = template.clone();
        let plan = build_sweep(&self.config.sweep,template.params());
        info!("session start: {} conditions planned",plan.len());

        let mut data_files = Vec::new();
        let mut done = 0;

        for (idx,cond) in plan.iter().enumerate() {
            if self.interrupted() {
                return Ok(self.finish(SessionOutcome::Interrupted,done,data_files));
            }
            info!("----------");
            info!("condition {}/{}: bias {:.2} mV, current {:.2} pA, zoff {:.2} A, sub-bias {:.2} mV",
                  idx + 1,plan.len(),cond.bias_mv,cond.current_pa,cond.height_offset,cond.sub_bias_mv);

            self.enter(SequencerState::AlignScan);
            info!("scan for alignment to template");
            let (_,align_img) = self.run_scan(&template.params().with_zero_offsets())?;

            self.enter(SequencerState::Register);
            let estimate = estimate_drift(&align_img,&template,&self.config.estimator_config())?;

            self.enter(SequencerState::Extrapolate);
            let dt1 = align_img.timestamp()
                .duration_since(previous.timestamp())
                .map_err(|_| RegistrationError::ZeroBaseline)?;
            let target = self.clock.now() + self.reposition_delay();
            let dt2 = target
                .duration_since(previous.timestamp())
                .map_err(|_| RegistrationError::ZeroBaseline)?;
            let shift = extrapolate(estimate.shift,dt1,dt2)?;

            self.enter(SequencerState::ApplyOffset);
            info!("[dy, dx] = [{:.3}, {:.3}], response {:.4}",shift.dy,shift.dx,estimate.response);
            self.executor.set_offset(shift.dy,shift.dx)?;
            thread::sleep(self.reposition_delay());

            if self.config.reference_scan.in_use {
                if self.interrupted() {
                    return Ok(self.finish(SessionOutcome::Interrupted,done,data_files));
                }
                self.enter(SequencerState::ReferenceScan);
                info!("constant-current reference scan");
                let (_,ref_img) = self.run_scan(&self.reference_params(template.params()))?;
                previous = ref_img;
            }

            if self.interrupted() {
                return Ok(self.finish(SessionOutcome::Interrupted,done,data_files));
            }
            self.enter(SequencerState::DataScan);
            info!("data scan");
            let (id,_) = self.run_scan(&self.data_params(cond,template.params()))?;
            data_files.push(id);
            done += 1;
        }

        if self.interrupted() {
            return Ok(self.finish(SessionOutcome::Interrupted,done,data_files));
        }
        self.enter(SequencerState::FinalReference);
        info!("final template scan");
        self.run_scan(&template.params().with_zero_offsets())?;
        Ok(self.finish(SessionOutcome::Completed,done,data_files))
    }

    fn resolve_template(&mut self) -> Result<ScanImage,SessionError> {
        let id = match self.config.template.use_last_as_template {
            true => {
                self.executor.last_saved().ok_or_else(|| {
                    SessionError::Configuration(
                        "there is no most recent image to be used as template".to_string())
                })?
            }
            false => {
                let folder = self.config.template.template_folder.as_ref()
                    .ok_or_else(|| SessionError::Configuration(
                        "template_folder is not set".to_string()))?;
                let file = self.config.template.template_file.as_ref()
                    .ok_or_else(|| SessionError::Configuration(
                        "template_file is not set".to_string()))?;
                let path = utils::get_first_match(folder,file)
                    .ok_or_else(|| SessionError::Configuration(
                        format!("no template matching {} in {:?}",file,folder)))?;
                path.to_string_lossy().into_owned()
            }
        };
        info!("template: {}",self.log_id(&id));
        self.executor.load_saved(&id)
            .map_err(|e| SessionError::Configuration(e.to_string()))
    }

    /// configure, start, block until idle, save, load the saved image
    fn run_scan(&mut self,params:&AcquisitionParams) -> Result<(String,ScanImage),SessionError> {
        self.executor.configure(params)?;
        let initial = initial_wait_estimate(&mut self.executor)?;
        self.executor.start()?;
        let policy = WaitPolicy {
            initial,
            poll: Duration::from_secs_f64(self.config.timing.poll_interval_sec),
            timeout: Duration::from_secs_f64(self.config.timing.scan_timeout_sec),
        };
        wait_for_idle(&mut self.executor,&policy)?;
        let id = self.executor.save(None)?;
        info!("saved: {}",self.log_id(&id));
        let img = self.executor.load_saved(&id)?;
        Ok((id,img))
    }

    fn finish(&mut self,outcome:SessionOutcome,done:usize,data_files:Vec<String>)
        -> SessionSummary {
        match outcome {
            SessionOutcome::Completed => info!("done, {} data scans",done),
            SessionOutcome::Interrupted => warn!("interrupted after {} data scans",done),
        }
        if let Err(e) = self.executor.disconnect() {
            warn!("disconnect failed: {}",e);
        }
        self.enter(SequencerState::Done);
        SessionSummary {
            outcome,
            conditions_done: done,
            data_files,
        }
    }

    fn data_params(&self,cond:&ScanCondition,template:&AcquisitionParams) -> AcquisitionParams {
        AcquisitionParams {
            chmode: chmode(&self.config.sweep),
            ddelta_x: self.config.data_scan.ddelta_x,
            delta_x_dac: template.delta_x_dac,
            channels_code: self.config.data_scan.channels_code,
            ch_zoff: cond.height_offset,
            ch_bias: cond.sub_bias_mv,
            bias: cond.bias_mv,
            current: cond.current_pa,
        }
    }

    // the reference capture always runs in constant-current mode at the
    // template's feedback settings
    fn reference_params(&self,template:&AcquisitionParams) -> AcquisitionParams {
        AcquisitionParams {
            chmode: 0,
            ddelta_x: template.ddelta_x,
            delta_x_dac: self.config.reference_scan.delta_x_dac,
            channels_code: self.config.reference_scan.channels_code,
            ch_zoff: 0.0,
            ch_bias: 0.0,
            bias: template.bias,
            current: template.current,
        }
    }

    fn reposition_delay(&self) -> Duration {
        Duration::from_secs_f64(self.config.timing.reposition_delay_sec)
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    fn enter(&self,state:SequencerState) {
        debug!("-> {:?}",state);
    }

    fn log_id<'a>(&self,id:&'a str) -> &'a str {
        tail(id,self.config.filename_log_len)
    }
}

// trailing n characters of a saved identifier, for compact log records
fn tail(s:&str,n:usize) -> &str {
    if n == 0 {
        return s;
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((i,_)) => &s[i..],
        None => s,
    }
}
