pub mod clock;
pub mod executor;
pub mod mock;

pub use clock::{Clock, SystemClock};
pub use executor::{
    initial_wait_estimate, wait_for_idle, ScanCtlError, ScanExecutor, Status, WaitPolicy,
    PARAM_DELAY_Y, PARAM_SECS_PER_IMAGE,
};
