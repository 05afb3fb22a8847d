use std::time::Duration;

use crate::{RegistrationError, ShiftKind, ShiftVector};

/// Project a measured shift forward in time assuming constant-velocity
/// drift. `dt1` is the elapsed time from the baseline reference to the
/// measurement, `dt2` from the baseline reference to the future acquisition
/// instant; the result scales the shift by dt2/dt1.
///
/// Both intervals arrive as `Duration` rather than raw wall-clock
/// differences: a clock discontinuity (daylight saving, NTP step) shows up
/// upstream as a failed `duration_since` instead of a silently negative
/// interval here. A zero `dt1` is still a fatal precondition violation.
pub fn extrapolate(shift:ShiftVector,dt1:Duration,dt2:Duration)
    -> Result<ShiftVector,RegistrationError> {

    if dt1.is_zero() {
        return Err(RegistrationError::ZeroBaseline);
    }
    let ratio = dt2.as_secs_f64()/dt1.as_secs_f64();
    Ok(ShiftVector {
        dy: shift.dy*ratio,
        dx: shift.dx*ratio,
        kind: ShiftKind::Extrapolated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_intervals_return_input(){
        let s = ShiftVector::instantaneous(2.0,-1.0);
        let dt = Duration::from_secs(10);
        let e = extrapolate(s,dt,dt).unwrap();
        assert_eq!(e.dy,2.0);
        assert_eq!(e.dx,-1.0);
        assert_eq!(e.kind,ShiftKind::Extrapolated);
    }

    #[test]
    fn linear_in_target_interval(){
        let s = ShiftVector::instantaneous(3.0,0.5);
        let dt1 = Duration::from_secs(8);
        let a = extrapolate(s,dt1,Duration::from_secs(8)).unwrap();
        let b = extrapolate(s,dt1,Duration::from_secs(16)).unwrap();
        assert!((b.dy - 2.0*a.dy).abs() < 1e-12);
        assert!((b.dx - 2.0*a.dx).abs() < 1e-12);
    }

    #[test]
    fn measured_at_ten_projected_to_fifteen(){
        // template at T0, alignment at T0+10s, target T0+15s
        let s = ShiftVector::instantaneous(2.0,-1.0);
        let e = extrapolate(s,Duration::from_secs(10),Duration::from_secs(15)).unwrap();
        assert!((e.dy - 3.0).abs() < 1e-12);
        assert!((e.dx + 1.5).abs() < 1e-12);
    }

    #[test]
    fn zero_baseline_is_fatal(){
        for (dy,dx) in [(0.0,0.0),(2.0,-1.0),(-7.5,3.25)] {
            let s = ShiftVector::instantaneous(dy,dx);
            assert!(matches!(
                extrapolate(s,Duration::ZERO,Duration::from_secs(5)),
                Err(RegistrationError::ZeroBaseline)
            ));
        }
    }
}
