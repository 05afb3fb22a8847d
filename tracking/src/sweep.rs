use scan_img::AcquisitionParams;
use utils::linspace;

use crate::config::SweepConfig;

/// One planned acquisition. The sweep is expanded once, up front, and
/// executed strictly in order.
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct ScanCondition {
    pub bias_mv:f32,
    pub current_pa:f32,
    pub height_offset:f32,
    pub sub_bias_mv:f32,
}

/// Instrument channel mode implied by the sweep mode.
pub fn chmode(config:&SweepConfig) -> i32 {
    match config {
        SweepConfig::ConstantCurrent {..} => 0,
        SweepConfig::ConstantHeight {..} => 1,
    }
}

/// Expand the range configuration into the ordered condition sequence.
/// Constant-height mode pins bias and current to the template's values and
/// runs the secondary bias as the fast inner axis.
pub fn build_sweep(config:&SweepConfig,template:&AcquisitionParams) -> Vec<ScanCondition> {
    match config {
        SweepConfig::ConstantCurrent {
            start_bias_mv,
            end_bias_mv,
            start_current_pa,
            end_current_pa,
            steps,
        } => {
            let bias = linspace(*start_bias_mv as f64,*end_bias_mv as f64,*steps);
            let current = linspace(*start_current_pa as f64,*end_current_pa as f64,*steps);
            bias.iter().zip(current.iter()).map(|(b,c)| ScanCondition {
                bias_mv: *b as f32,
                current_pa: *c as f32,
                height_offset: 0.0,
                sub_bias_mv: 0.0,
            }).collect()
        }
        SweepConfig::ConstantHeight {
            start_height,
            end_height,
            steps,
            start_sub_bias_mv,
            end_sub_bias_mv,
            sub_bias_steps,
        } => {
            let heights = linspace(*start_height as f64,*end_height as f64,*steps);
            let sub_bias = linspace(*start_sub_bias_mv as f64,*end_sub_bias_mv as f64,*sub_bias_steps);
            let mut plan = Vec::with_capacity(steps*sub_bias_steps);
            for h in &heights {
                for sb in &sub_bias {
                    plan.push(ScanCondition {
                        bias_mv: template.bias,
                        current_pa: template.current,
                        height_offset: *h as f32,
                        sub_bias_mv: *sb as f32,
                    });
                }
            }
            plan
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> AcquisitionParams {
        AcquisitionParams {
            chmode: 0,
            ddelta_x: 16,
            delta_x_dac: 64,
            channels_code: 3,
            ch_zoff: 0.0,
            ch_bias: 0.0,
            bias: 250.0,
            current: 30.0,
        }
    }

    #[test]
    fn constant_current_five_steps(){
        let config = SweepConfig::ConstantCurrent {
            start_bias_mv: 100.0,
            end_bias_mv: 500.0,
            start_current_pa: 10.0,
            end_current_pa: 50.0,
            steps: 5,
        };
        let plan = build_sweep(&config,&template());
        assert_eq!(plan.len(),5);
        assert_eq!(plan[0].bias_mv,100.0);
        assert_eq!(plan[4].bias_mv,500.0);
        assert_eq!(plan[2].bias_mv,300.0);
        assert_eq!(plan[2].current_pa,30.0);
        for cond in &plan {
            assert_eq!(cond.height_offset,0.0);
            assert_eq!(cond.sub_bias_mv,0.0);
        }
        assert_eq!(chmode(&config),0);
    }

    #[test]
    fn constant_height_outer_slow_inner_fast(){
        let config = SweepConfig::ConstantHeight {
            start_height: -1.0,
            end_height: 1.0,
            steps: 3,
            start_sub_bias_mv: -300.0,
            end_sub_bias_mv: 300.0,
            sub_bias_steps: 4,
        };
        let plan = build_sweep(&config,&template());
        assert_eq!(plan.len(),12);
        // outer axis held across each inner block
        for i in 0..4 {
            assert_eq!(plan[i].height_offset,-1.0);
            assert_eq!(plan[4 + i].height_offset,0.0);
            assert_eq!(plan[8 + i].height_offset,1.0);
        }
        // inner axis repeats per block
        assert_eq!(plan[0].sub_bias_mv,-300.0);
        assert_eq!(plan[3].sub_bias_mv,300.0);
        assert_eq!(plan[4].sub_bias_mv,-300.0);
        // bias/current pinned to the template
        for cond in &plan {
            assert_eq!(cond.bias_mv,250.0);
            assert_eq!(cond.current_pa,30.0);
        }
        assert_eq!(chmode(&config),1);
    }

    #[test]
    fn single_step_sweep(){
        let config = SweepConfig::ConstantCurrent {
            start_bias_mv: 120.0,
            end_bias_mv: 480.0,
            start_current_pa: 20.0,
            end_current_pa: 40.0,
            steps: 1,
        };
        let plan = build_sweep(&config,&template());
        assert_eq!(plan.len(),1);
        assert_eq!(plan[0].bias_mv,120.0);
        assert_eq!(plan[0].current_pa,20.0);
    }
}
