use std::time::{Duration, SystemTime};
use chrono::Local;
use clap::Parser;
use log::{error, info};
use scan_ctl::mock::{MockConfig, MockScanExecutor, SharedTimeline};
use scan_ctl::{wait_for_idle, ScanExecutor, WaitPolicy};
use scan_img::AcquisitionParams;
use tracking::args::{Action, RunArgs, ShowPlanArgs, TrackingArgs};
use tracking::config::TrackingConfig;
use tracking::session::Session;
use tracking::sweep::{build_sweep, chmode};

fn main(){
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = TrackingArgs::parse();
    use Action::*;
    match &args.action {
        NewConfig(args) => {
            TrackingConfig::default_config().to_file(&args.path);
            info!("wrote default config to {:?}",args.path.with_extension("toml"));
        }
        ShowPlan(args) => show_plan(args),
        Run(args) => run(args),
    }
}

fn show_plan(args:&ShowPlanArgs){
    let config = TrackingConfig::from_file(&args.config);
    // constant-height bias/current are pinned to the template at runtime;
    // a zeroed placeholder stands in for it here
    let placeholder = AcquisitionParams {
        chmode: chmode(&config.sweep),
        ddelta_x: config.data_scan.ddelta_x,
        delta_x_dac: 0,
        channels_code: config.data_scan.channels_code,
        ch_zoff: 0.0,
        ch_bias: 0.0,
        bias: 0.0,
        current: 0.0,
    };
    let plan = build_sweep(&config.sweep,&placeholder);
    println!("{} conditions:",plan.len());
    for (idx,cond) in plan.iter().enumerate() {
        println!("{:4}  bias {:8.2} mV  current {:8.2} pA  zoff {:6.2} A  sub-bias {:8.2} mV",
                 idx + 1,cond.bias_mv,cond.current_pa,cond.height_offset,cond.sub_bias_mv);
    }
}

fn run(args:&RunArgs){
    let config = TrackingConfig::from_file(&args.config);
    if !args.mock {
        error!("no instrument driver is linked into this binary; \
                run with --mock or wire up a ScanExecutor implementation");
        std::process::exit(1);
    }
    info!("mock session start {}",Local::now().format("%Y%m%d_%H%M%S"));

    let timeline = SharedTimeline::starting_at(SystemTime::now());
    let mock_config = MockConfig {
        // short fake per-image time so the demo does not sleep for real
        secs_per_image: 0.2,
        delay_y: 2.0,
        scan_duration: Duration::from_secs(30),
        ..MockConfig::default()
    };
    let mut executor = MockScanExecutor::new(mock_config,timeline.clone());
    if let Err(e) = seed_template(&mut executor,&config) {
        error!("could not seed a template scan on the mock instrument: {}",e);
        std::process::exit(1);
    }

    let mut session = Session::new(executor,timeline,config);
    match session.run() {
        Ok(summary) => {
            info!("outcome {:?}, {} data scans",summary.outcome,summary.conditions_done);
            if let Some(path) = &args.summary {
                let s = serde_json::to_string_pretty(&summary)
                    .expect("cannot serialize session summary");
                utils::write_to_file(path,"json",&s);
            }
        }
        Err(e) => {
            error!("session failed: {}",e);
            std::process::exit(1);
        }
    }
}

// the session wants a most-recent saved image to adopt as its template
fn seed_template(executor:&mut MockScanExecutor,config:&TrackingConfig)
    -> Result<(),scan_ctl::ScanCtlError> {
    let params = AcquisitionParams {
        chmode: chmode(&config.sweep),
        ddelta_x: config.data_scan.ddelta_x,
        delta_x_dac: 64,
        channels_code: config.data_scan.channels_code,
        ch_zoff: 0.0,
        ch_bias: 0.0,
        bias: 250.0,
        current: 30.0,
    };
    executor.configure(&params)?;
    executor.start()?;
    let policy = WaitPolicy {
        initial: Duration::from_millis(10),
        poll: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    };
    wait_for_idle(executor,&policy)?;
    executor.save(Some("template"))?;
    Ok(())
}
