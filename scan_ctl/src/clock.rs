use std::time::SystemTime;

/// Time source injected into anything that needs "now", so sessions can run
/// against a scripted timeline in tests.
pub trait Clock {
    fn now(&self) -> SystemTime;
}

#[derive(Debug,Clone,Copy,Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}
