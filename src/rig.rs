//! Ties the link, the capture state machine and the physics together into
//! the trial loop the operator drives.

use crate::{
    capture::{CaptureEnd, CaptureSession, Trial},
    config::ExperimentConfig,
    error::TrialError,
    link::Link,
    physics::{PhysicsPipeline, TrialResult},
    report_sink::{write_csv_to_path, write_trial_to_path, ReportError, ReportNames},
    transport::Transport,
};

use log::{info, warn};
use std::path::{Path, PathBuf};

/// A trial that made it through capture and analysis.
#[derive(Debug, Clone)]
pub struct CompletedTrial {
    /// Raw samples as captured
    pub trial: Trial,
    /// The analysis of `trial`
    pub result: TrialResult,
    /// How the recording ended
    pub end: CaptureEnd,
    /// Number of sample lines that were thrown away
    pub discarded: usize,
}

/// The ramp, for the lifetime of an operator session. The link is opened
/// once and reused by every trial.
pub struct Rig<T: Transport> {
    link: Link<T>,
    config: ExperimentConfig,
    pipeline: PhysicsPipeline,
}

impl<T: Transport> Rig<T> {
    /// Wrap a link that already completed the handshake.
    pub fn new(link: Link<T>, config: ExperimentConfig) -> Self {
        let pipeline = PhysicsPipeline::new(config.physics.clone());
        Self {
            link,
            config,
            pipeline,
        }
    }

    /// The configuration of this session.
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Run one trial at `angle_deg`: capture the slide and analyse it.
    pub fn run_trial(&mut self, angle_deg: f64) -> Result<CompletedTrial, TrialError> {
        let session = CaptureSession::new(&self.config.link, angle_deg)?;
        let outcome = session.run(&mut self.link)?;
        if outcome.end == CaptureEnd::TimedOut {
            info!("Capture deadline passed before END_STREAM");
        }

        let result = match self.pipeline.process(&outcome.trial) {
            Ok(result) => result,
            Err(e) => {
                warn!("Trial at {}° discarded: {}", angle_deg, e);
                return Err(e);
            }
        };
        log_summary(&result);

        Ok(CompletedTrial {
            trial: outcome.trial,
            result,
            end: outcome.end,
            discarded: outcome.discarded.len(),
        })
    }

    /// Write the CSV and the raw samples of `completed` into `dir`,
    /// returning the path of the CSV.
    pub fn save(&self, completed: &CompletedTrial, dir: impl AsRef<Path>) -> Result<PathBuf, ReportError> {
        let names = ReportNames::new(
            completed.result.angle_deg,
            completed.result.mass_kg,
            &self.config.surface,
        );
        let csv_path = names.csv_in(&dir);
        write_csv_to_path(&completed.result, &csv_path)?;
        write_trial_to_path(&completed.trial, names.raw_in(&dir))?;
        info!("Detailed data saved to {}", csv_path.display());
        Ok(csv_path)
    }

    /// Release the link.
    pub fn into_link(self) -> Link<T> {
        self.link
    }
}

/// Log the headline numbers of a trial.
pub fn log_summary(result: &TrialResult) {
    let Some(summary) = result.summary() else {
        return;
    };

    info!(
        "{}° | {} samples over {:.3}s | peak velocity {:.3} m/s",
        result.angle_deg, summary.samples, summary.duration_s, summary.peak_velocity
    );
    match summary.mean_mu_in_motion {
        Some(mu) => info!("Mean dynamic friction coefficient in motion: {:.4}", mu),
        None => warn!("The body never moved, no friction coefficient"),
    }
    if summary.non_finite_mu_in_motion > 0 {
        warn!(
            "{} moving samples have a non-finite μ",
            summary.non_finite_mu_in_motion
        );
    }
    info!(
        "Energy lost {:.5} J, friction work {:.5} J, residual {:.5} J",
        summary.final_energy_loss_j, summary.final_friction_work_j, summary.energy_work_residual_j
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::LinkConfig, handshake::establish, sim_device::SimulatedRamp};
    use std::time::Duration;

    fn rig(ramp: SimulatedRamp) -> Rig<SimulatedRamp> {
        let config = ExperimentConfig {
            link: LinkConfig {
                positioning_timeout_s: 0.5,
                capture_timeout_s: 0.1,
                poll_interval_ms: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let link = establish(Link::new(ramp, Duration::from_millis(1)), Duration::from_millis(500)).unwrap();
        Rig::new(link, config)
    }

    #[test]
    fn trial_is_captured_analysed_and_saved() {
        let mut rig = rig(SimulatedRamp::new().friction(0.25).samples(50));
        let completed = rig.run_trial(30.0).unwrap();
        assert_eq!(completed.end, CaptureEnd::Completed);
        assert_eq!(completed.result.frames.len(), 50);
        assert_eq!(completed.result.mass_kg, 0.04);

        let dir = tempfile::tempdir().unwrap();
        let csv = rig.save(&completed, dir.path()).unwrap();
        assert!(csv.exists());
        let raw = dir.path().join("trial_30deg_0.04kg_c220_l80.raw.ron");
        assert_eq!(
            crate::report_sink::read_trial_from_path(raw).unwrap(),
            completed.trial
        );
    }

    #[test]
    fn bad_trial_leaves_the_rig_usable() {
        let mut rig = rig(SimulatedRamp::new().samples(5));
        assert!(matches!(
            rig.run_trial(30.0),
            Err(TrialError::InsufficientData { collected: 5, .. })
        ));
        assert!(matches!(
            rig.run_trial(f64::INFINITY),
            Err(TrialError::InvalidAngleInput(_))
        ));
    }
}
