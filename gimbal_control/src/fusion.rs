//! Complementary-filter attitude estimator.
//!
//! Roll and pitch blend integrated gyro rate with the gravity direction from
//! the accelerometer; yaw blends integrated rate with the tilt-compensated
//! magnetometer heading. An optional gyro bias estimate is accumulated from
//! the first samples after reset, and the gyroscope is reported uncalibrated
//! until it completes.

use std::f32::consts::PI;
use std::time::Duration;

use gimbal_common::drivers::FusionEngine;
use gimbal_common::sensor::{Attitude, HeadingSample, ImuSample, SensorState};
use tracing::{debug, info};

/// Gyro weight of the blend.
pub const DEFAULT_ALPHA: f32 = 0.98;

#[derive(Debug, Clone)]
pub struct ComplementaryFilter {
    alpha: f32,
    dt: f32,
    bias: [f32; 3],
    bias_sum: [f32; 3],
    bias_count: u32,
    bias_target: u32,
    initialized: bool,
}

impl ComplementaryFilter {
    /// Filter stepped once per `period`.
    pub fn new(period: Duration) -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            dt: period.as_secs_f32(),
            bias: [0.0; 3],
            bias_sum: [0.0; 3],
            bias_count: 0,
            bias_target: 0,
            initialized: false,
        }
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self
    }

    /// Estimate gyro bias from the first `samples` updates (sensor at rest).
    pub fn with_bias_samples(mut self, samples: u32) -> Self {
        self.bias_target = samples;
        self
    }

    #[inline]
    pub fn gyro_bias(&self) -> [f32; 3] {
        self.bias
    }

    #[inline]
    pub fn bias_ready(&self) -> bool {
        self.bias_count >= self.bias_target
    }

    fn accumulate_bias(&mut self, gyro: [f32; 3]) {
        for (sum, g) in self.bias_sum.iter_mut().zip(gyro) {
            *sum += g;
        }
        self.bias_count += 1;
        if self.bias_ready() {
            let n = self.bias_count as f32;
            self.bias = self.bias_sum.map(|s| s / n);
            info!(bias = ?self.bias, samples = self.bias_count, "gyro bias estimated");
        }
    }
}

/// Roll and pitch of the gravity vector [rad].
pub fn tilt_from_accel(accel: [f32; 3]) -> (f32, f32) {
    let [ax, ay, az] = accel;
    let roll = ay.atan2(az);
    let pitch = (-ax).atan2((ay * ay + az * az).sqrt());
    (roll, pitch)
}

/// Tilt-compensated magnetic heading [rad], `None` without a usable field.
pub fn heading_from_field(field: [f32; 3], roll: f32, pitch: f32) -> Option<f32> {
    let [mx, my, mz] = field;
    if mx == 0.0 && my == 0.0 && mz == 0.0 {
        return None;
    }
    let (sr, cr) = roll.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let xh = mx * cp + my * sr * sp + mz * cr * sp;
    let yh = my * cr - mz * sr;
    Some((-yh).atan2(xh))
}

/// Wrap to (-π, π].
#[inline]
pub fn wrap_angle(a: f32) -> f32 {
    let mut a = a % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a <= -PI {
        a += 2.0 * PI;
    }
    a
}

impl FusionEngine for ComplementaryFilter {
    fn reset(&mut self, state: &SensorState) {
        self.initialized = false;
        self.bias_sum = [0.0; 3];
        self.bias_count = 0;
        debug!(temperature = state.temperature, "fusion reset");
    }

    fn update(&mut self, imu: &ImuSample, heading: &HeadingSample, state: &mut SensorState) {
        if !self.bias_ready() {
            self.accumulate_bias(imu.gyro);
        }
        if !self.bias_ready() {
            state.calibration.gyroscope = false;
        }

        let (roll_acc, pitch_acc) = tilt_from_accel(imu.accel);

        if !self.initialized {
            let yaw = heading_from_field(heading.field, roll_acc, pitch_acc).unwrap_or(0.0);
            state.attitude = Attitude {
                roll: roll_acc,
                pitch: pitch_acc,
                yaw,
            };
            self.initialized = true;
            return;
        }

        let rate = [
            imu.gyro[0] - self.bias[0],
            imu.gyro[1] - self.bias[1],
            imu.gyro[2] - self.bias[2],
        ];
        let prev = state.attitude;
        let a = self.alpha;

        let roll = a * (prev.roll + rate[0] * self.dt) + (1.0 - a) * roll_acc;
        let pitch = a * (prev.pitch + rate[1] * self.dt) + (1.0 - a) * pitch_acc;

        let yaw_gyro = wrap_angle(prev.yaw + rate[2] * self.dt);
        let yaw = match heading_from_field(heading.field, roll, pitch) {
            Some(yaw_mag) => wrap_angle(yaw_gyro + (1.0 - a) * wrap_angle(yaw_mag - yaw_gyro)),
            None => yaw_gyro,
        };

        state.attitude = Attitude { roll, pitch, yaw };
    }
}
