//! The physics of a rigid body sliding down an incline, recovered from a
//! noisy position trace.
//!
//! The distance sensor sits at the top of the ramp, so distance grows as
//! the body slides down. From the raw trace the [`PhysicsPipeline`]
//! derives, for every sample:
//!
//! - position, by median filtering the distances (the derivatives blow up
//!   otherwise) and converting to meters,
//! - velocity and acceleration, by differentiating against the real sample
//!   times, with an extra moving average on velocity before the second
//!   derivative,
//! - potential, kinetic and mechanical energy, with zero height at the
//!   furthest point reached,
//! - the dynamic friction coefficient from Newton's second law along the
//!   incline, `μ = tan θ - a / (g cos θ)`, clipped to `[0, 1]`,
//! - the work done by friction, accumulated along the path.
//!
//! Everything here is a pure function of its inputs.

use crate::{
    capture::{RawSample, Trial},
    config::PhysicsConfig,
    error::TrialError,
    numeric::{centered_mean, cumulative_sum, gradient, gradient_by_index, median_filter},
};

use log::warn;

/// The derived quantities for one sample. SI units throughout, except for
/// the raw distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsFrame {
    /// Controller clock, in seconds
    pub time_s: f64,
    /// Distance as the sensor reported it, in centimeters
    pub distance_raw_cm: f64,
    /// Median filtered position along the ramp
    pub position_m: f64,
    /// Derivative of the position, in m/s
    pub velocity: f64,
    /// Moving average of `velocity`
    pub velocity_smoothed: f64,
    /// Derivative of the smoothed velocity, in m/s²
    pub acceleration: f64,
    /// Height above the furthest point reached
    pub height_m: f64,
    /// `m g h`
    pub potential_j: f64,
    /// `½ m v²`, from the raw velocity
    pub kinetic_j: f64,
    /// Potential plus kinetic energy
    pub mechanical_j: f64,
    /// Mechanical energy lost since the first sample
    pub energy_loss_j: f64,
    /// Dynamic friction coefficient, clipped to `[0, 1]`
    pub mu: f64,
    /// Kinetic friction force, `μ m g cos θ`
    pub friction_force_n: f64,
    /// Friction work over this sample's share of the path
    pub friction_work_increment_j: f64,
    /// Friction work since the first sample
    pub friction_work_cumulative_j: f64,
}

impl PhysicsFrame {
    /// Column names for [`PhysicsFrame::values`], suitable for a CSV header.
    pub const COLUMNS: [&'static str; 15] = [
        "time_s",
        "distance_raw_cm",
        "position_m",
        "velocity_raw_mps",
        "velocity_smoothed_mps",
        "acceleration_mps2",
        "height_m",
        "potential_j",
        "kinetic_j",
        "mechanical_j",
        "energy_loss_j",
        "mu_dynamic",
        "friction_force_n",
        "friction_work_increment_j",
        "friction_work_cumulative_j",
    ];

    /// Every field, in the order of [`PhysicsFrame::COLUMNS`].
    pub fn values(&self) -> [f64; 15] {
        [
            self.time_s,
            self.distance_raw_cm,
            self.position_m,
            self.velocity,
            self.velocity_smoothed,
            self.acceleration,
            self.height_m,
            self.potential_j,
            self.kinetic_j,
            self.mechanical_j,
            self.energy_loss_j,
            self.mu,
            self.friction_force_n,
            self.friction_work_increment_j,
            self.friction_work_cumulative_j,
        ]
    }

    /// Whether every field is a finite number.
    pub fn is_finite(&self) -> bool {
        self.values().iter().all(|v| v.is_finite())
    }
}

/// The analysed trial, ready for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    /// Ramp angle, in degrees
    pub angle_deg: f64,
    /// Mass of the sliding body
    pub mass_kg: f64,
    /// One frame per sample, in arrival order
    pub frames: Vec<PhysicsFrame>,
    /// Mean μ over the samples where the body was moving; `None` if it
    /// never moved. Non-finite values are not skipped, so a single NaN μ
    /// among the moving samples makes the mean NaN.
    pub mean_mu_in_motion: Option<f64>,
    /// How many of the moving samples have a non-finite μ
    pub non_finite_mu_in_motion: usize,
}

/// A few numbers that tell at a glance how a trial went.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialSummary {
    /// Number of frames
    pub samples: usize,
    /// Time between the first and the last sample
    pub duration_s: f64,
    /// Largest raw velocity
    pub peak_velocity: f64,
    /// Energy lost by the last sample
    pub final_energy_loss_j: f64,
    /// Friction work by the last sample
    pub final_friction_work_j: f64,
    /// Energy loss not accounted for by friction work. Ideally zero, in
    /// practice this is the experimental error.
    pub energy_work_residual_j: f64,
    /// See [`TrialResult::mean_mu_in_motion`]
    pub mean_mu_in_motion: Option<f64>,
    /// See [`TrialResult::non_finite_mu_in_motion`]
    pub non_finite_mu_in_motion: usize,
}

impl TrialResult {
    /// Number of frames with at least one non-finite field.
    pub fn non_finite_frames(&self) -> usize {
        self.frames.iter().filter(|f| !f.is_finite()).count()
    }

    /// `None` for a result without frames.
    pub fn summary(&self) -> Option<TrialSummary> {
        let first = self.frames.first()?;
        let last = self.frames.last()?;
        let peak_velocity = self
            .frames
            .iter()
            .map(|f| f.velocity)
            .fold(f64::NEG_INFINITY, f64::max);

        Some(TrialSummary {
            samples: self.frames.len(),
            duration_s: last.time_s - first.time_s,
            peak_velocity,
            final_energy_loss_j: last.energy_loss_j,
            final_friction_work_j: last.friction_work_cumulative_j,
            energy_work_residual_j: last.energy_loss_j - last.friction_work_cumulative_j,
            mean_mu_in_motion: self.mean_mu_in_motion,
            non_finite_mu_in_motion: self.non_finite_mu_in_motion,
        })
    }
}

/// Turns validated [`Trial`]s into [`TrialResult`]s.
#[derive(Debug, Clone)]
pub struct PhysicsPipeline {
    config: PhysicsConfig,
}

impl PhysicsPipeline {
    /// A pipeline with the filters and constants of `config`.
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    /// The constants this pipeline derives with.
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Check that `trial` has enough samples and derive it. Short trials
    /// never reach [`PhysicsPipeline::derive`].
    pub fn process(&self, trial: &Trial) -> Result<TrialResult, TrialError> {
        trial.validate(self.config.min_samples)?;
        let result = self.derive(trial);

        let bad = result.non_finite_frames();
        if bad > 0 {
            warn!("{} of {} frames hold non-finite values", bad, result.frames.len());
        }
        if result.non_finite_mu_in_motion > 0 {
            warn!(
                "{} moving samples have no finite μ, the mean is not meaningful",
                result.non_finite_mu_in_motion
            );
        }
        Ok(result)
    }

    /// Derive the kinematics, energies and friction of `trial`.
    pub fn derive(&self, trial: &Trial) -> TrialResult {
        let PhysicsConfig {
            mass_kg,
            gravity,
            median_window,
            smoothing_window,
            motion_threshold,
            ..
        } = self.config;

        let times: Vec<f64> = trial.samples.iter().map(RawSample::time_s).collect();
        let raw: Vec<f64> = trial.samples.iter().map(|s| s.distance_cm).collect();

        let position: Vec<f64> = median_filter(&raw, median_window)
            .into_iter()
            .map(|cm| cm / 100.0)
            .collect();
        let velocity = gradient(&position, &times);
        let velocity_smoothed = centered_mean(&velocity, smoothing_window);
        let acceleration = gradient(&velocity_smoothed, &times);

        let theta = trial.angle_deg.to_radians();
        let (sin_t, cos_t) = theta.sin_cos();
        let tan_t = theta.tan();

        // Height is zero wherever the body got furthest down the ramp
        let max_position = position.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let height: Vec<f64> = position
            .iter()
            .map(|s| (max_position - s) * sin_t)
            .collect();

        let potential: Vec<f64> = height.iter().map(|h| mass_kg * gravity * h).collect();
        let kinetic: Vec<f64> = velocity.iter().map(|v| 0.5 * mass_kg * v * v).collect();
        let mechanical: Vec<f64> = potential.iter().zip(&kinetic).map(|(u, k)| u + k).collect();
        let initial_energy = mechanical.first().copied().unwrap_or(f64::NAN);

        let mu: Vec<f64> = acceleration
            .iter()
            .map(|a| (tan_t - a / (gravity * cos_t)).clamp(0.0, 1.0))
            .collect();

        let normal = mass_kg * gravity * cos_t;
        let friction_force: Vec<f64> = mu.iter().map(|m| m * normal).collect();
        let work_increment: Vec<f64> = friction_force
            .iter()
            .zip(gradient_by_index(&position))
            .map(|(f, ds)| f * ds)
            .collect();
        let work_cumulative = cumulative_sum(&work_increment);

        let frames = (0..trial.samples.len())
            .map(|i| PhysicsFrame {
                time_s: times[i],
                distance_raw_cm: raw[i],
                position_m: position[i],
                velocity: velocity[i],
                velocity_smoothed: velocity_smoothed[i],
                acceleration: acceleration[i],
                height_m: height[i],
                potential_j: potential[i],
                kinetic_j: kinetic[i],
                mechanical_j: mechanical[i],
                energy_loss_j: initial_energy - mechanical[i],
                mu: mu[i],
                friction_force_n: friction_force[i],
                friction_work_increment_j: work_increment[i],
                friction_work_cumulative_j: work_cumulative[i],
            })
            .collect();

        let moving: Vec<f64> = velocity
            .iter()
            .zip(&mu)
            .filter(|(v, _)| **v > motion_threshold)
            .map(|(_, m)| *m)
            .collect();
        let mean_mu_in_motion =
            (!moving.is_empty()).then(|| moving.iter().sum::<f64>() / moving.len() as f64);
        let non_finite_mu_in_motion = moving.iter().filter(|m| !m.is_finite()).count();

        TrialResult {
            angle_deg: trial.angle_deg,
            mass_kg,
            frames,
            mean_mu_in_motion,
            non_finite_mu_in_motion,
        }
    }
}

/// Derive `trial` with the default filters, for a body of `mass_kg` under
/// gravitational acceleration `gravity`.
pub fn derive(trial: &Trial, mass_kg: f64, gravity: f64) -> TrialResult {
    PhysicsPipeline::new(PhysicsConfig {
        mass_kg,
        gravity,
        ..Default::default()
    })
    .derive(trial)
}
