//! One trial on the ramp: command the angle, wait for the ramp to get there,
//! then record the burst of distance samples the controller streams while
//! the body slides down.
//!
//! The session is a small state machine:
//!
//! ```text
//! Idle -> CommandSent -> RampPositioning -> AwaitingStreamStart -> Recording
//!                                                                    |
//!                                                    Completed <-----+-----> TimedOut
//! ```
//!
//! A single capture deadline starts once the ramp is positioned and covers
//! both the wait for `START_STREAM` and the recording itself. Running out of
//! time is not an error, the trial keeps whatever arrived.

use crate::{
    config::LinkConfig,
    device_message::{parse_sample, DeviceMessage, DiscardReason, SampleParse},
    error::TrialError,
    link::{LineRead, Link},
    transport::Transport,
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// One distance reading, as sent by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RawSample {
    /// Controller clock, in milliseconds
    pub timestamp_ms: i64,
    /// Distance from the sensor at the top of the ramp, in centimeters
    pub distance_cm: f64,
}

impl RawSample {
    /// Controller clock, in seconds.
    pub fn time_s(&self) -> f64 {
        self.timestamp_ms as f64 / 1000.0
    }
}

/// The samples of one trial, in arrival order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Trial {
    /// Commanded ramp angle, in degrees
    pub angle_deg: f64,
    /// Accepted samples, between `START_STREAM` and the end of the capture
    pub samples: Vec<RawSample>,
}

impl Trial {
    /// A trial is only worth analysing with strictly more than
    /// `min_samples` samples.
    pub fn validate(&self, min_samples: usize) -> Result<(), TrialError> {
        if self.samples.len() > min_samples {
            Ok(())
        } else {
            Err(TrialError::InsufficientData {
                collected: self.samples.len(),
                required: min_samples,
            })
        }
    }
}

/// Where a [`CaptureSession`] is in its trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Nothing sent yet.
    Idle,
    /// The angle command was written.
    CommandSent,
    /// Waiting for the ramp to report `Chegou`.
    RampPositioning,
    /// Positioned, the capture deadline runs from here.
    AwaitingStreamStart,
    /// Between `START_STREAM` and `END_STREAM`.
    Recording,
    /// `END_STREAM` arrived.
    Completed,
    /// The capture deadline passed.
    TimedOut,
}

impl CaptureState {
    /// Whether the session is done.
    pub fn is_terminal(self) -> bool {
        matches!(self, CaptureState::Completed | CaptureState::TimedOut)
    }
}

/// How the recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEnd {
    /// `END_STREAM` was seen.
    Completed,
    /// The capture deadline passed first.
    TimedOut,
}

/// Everything a finished capture produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOutcome {
    /// What was recorded
    pub trial: Trial,
    /// How the recording ended
    pub end: CaptureEnd,
    /// Sample lines that were thrown away, and why
    pub discarded: Vec<DiscardReason>,
}

/// Parse the angle the operator typed.
pub fn parse_angle(input: &str) -> Result<f64, TrialError> {
    match input.trim().parse::<f64>() {
        Ok(angle) if angle.is_finite() => Ok(angle),
        _ => Err(TrialError::InvalidAngleInput(input.trim().to_owned())),
    }
}

/// The state machine for a single trial. A new session is made for every
/// trial, so no samples leak from one trial into the next.
#[derive(Debug)]
pub struct CaptureSession {
    angle_deg: f64,
    positioning_timeout: Duration,
    capture_timeout: Duration,
    poll_interval: Duration,
    state: CaptureState,
    samples: Vec<RawSample>,
    discarded: Vec<DiscardReason>,
}

impl CaptureSession {
    /// Prepare a trial at `angle_deg`. Angles that are not finite numbers
    /// are refused before anything reaches the device.
    pub fn new(config: &LinkConfig, angle_deg: f64) -> Result<Self, TrialError> {
        if !angle_deg.is_finite() {
            return Err(TrialError::InvalidAngleInput(angle_deg.to_string()));
        }

        Ok(Self {
            angle_deg,
            positioning_timeout: config.positioning_timeout(),
            capture_timeout: config.capture_timeout(),
            poll_interval: config.poll_interval(),
            state: CaptureState::Idle,
            samples: Vec::new(),
            discarded: Vec::new(),
        })
    }

    /// The current state.
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Samples recorded so far.
    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    /// Drive the whole trial over `link`: command, positioning, capture.
    pub fn run<T: Transport>(mut self, link: &mut Link<T>) -> Result<CaptureOutcome, TrialError> {
        self.send_command(link)?;

        self.state = CaptureState::RampPositioning;
        let deadline = Instant::now() + self.positioning_timeout;
        while self.state == CaptureState::RampPositioning {
            match link.next_line(deadline)? {
                Some(line) => self.step(&line),
                None => {
                    warn!(
                        "Ramp did not report its position within {:?}",
                        self.positioning_timeout
                    );
                    return Err(TrialError::PositioningTimeout(self.positioning_timeout));
                }
            }
        }
        info!("Ramp positioned, release the body!");

        let deadline = Instant::now() + self.capture_timeout;
        while !self.state.is_terminal() {
            match link.poll_line(deadline)? {
                LineRead::Line(line) => self.step(&line),
                LineRead::NoData => spin_sleep::sleep(self.poll_interval),
                LineRead::DeadlineExceeded => self.expire(),
            }
        }

        Ok(self.finish())
    }

    /// Clear stale input and write the angle command.
    pub fn send_command<T: Transport>(&mut self, link: &mut Link<T>) -> Result<(), TrialError> {
        info!("Tilting the ramp to {}°", self.angle_deg);
        link.clear_input()?;
        link.send_line(&format!("{:?}", self.angle_deg))?;
        self.state = CaptureState::CommandSent;
        Ok(())
    }

    /// Feed one received line through the state machine.
    pub fn step(&mut self, line: &str) {
        use CaptureState as CS;

        let message = DeviceMessage::classify(line);
        match (self.state, message) {
            (CS::CommandSent | CS::RampPositioning, DeviceMessage::Positioned) => {
                self.state = CS::AwaitingStreamStart;
            }
            (CS::AwaitingStreamStart, DeviceMessage::StreamStart) => {
                info!("Recording...");
                self.state = CS::Recording;
            }
            (CS::AwaitingStreamStart | CS::Recording, DeviceMessage::StreamEnd) => {
                info!("End of recording, {} samples", self.samples.len());
                self.state = CS::Completed;
            }
            (CS::Recording, DeviceMessage::Other(text)) => match parse_sample(&text) {
                SampleParse::Parsed(sample) => self.samples.push(sample),
                SampleParse::Discarded(reason) => {
                    debug!("Discarding {:?}: {:?}", text, reason);
                    self.discarded.push(reason);
                }
            },
            (state, _) => debug!("Ignoring {:?} while {:?}", line, state),
        }
    }

    /// The capture deadline passed.
    pub fn expire(&mut self) {
        if matches!(
            self.state,
            CaptureState::AwaitingStreamStart | CaptureState::Recording
        ) {
            info!(
                "Capture deadline reached in {:?} with {} samples",
                self.state,
                self.samples.len()
            );
            self.state = CaptureState::TimedOut;
        }
    }

    fn finish(self) -> CaptureOutcome {
        let end = match self.state {
            CaptureState::Completed => CaptureEnd::Completed,
            _ => CaptureEnd::TimedOut,
        };

        CaptureOutcome {
            trial: Trial {
                angle_deg: self.angle_deg,
                samples: self.samples,
            },
            end,
            discarded: self.discarded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::scripted::{ScriptedTransport, Step};

    fn quick_config() -> LinkConfig {
        LinkConfig {
            positioning_timeout_s: 0.05,
            capture_timeout_s: 0.05,
            poll_interval_ms: 1,
            ..Default::default()
        }
    }

    fn link(transport: ScriptedTransport) -> Link<ScriptedTransport> {
        Link::new(transport, Duration::from_millis(1))
    }

    fn sample_lines(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("{},{}", i * 50, 10.0 + i as f64))
            .collect()
    }

    #[test]
    fn full_trial_completes() {
        let mut lines = vec!["Movendo...".to_owned(), "Chegou".to_owned()];
        lines.push("START_STREAM".to_owned());
        lines.extend(sample_lines(12));
        lines.push("END_STREAM".to_owned());
        lines.push("0,99".to_owned());
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        let mut link = link(ScriptedTransport::from_lines(&refs));

        let session = CaptureSession::new(&quick_config(), 30.0).unwrap();
        let outcome = session.run(&mut link).unwrap();

        assert_eq!(outcome.end, CaptureEnd::Completed);
        assert_eq!(outcome.trial.angle_deg, 30.0);
        assert_eq!(outcome.trial.samples.len(), 12);
        assert_eq!(outcome.trial.samples[3].timestamp_ms, 150);
        assert!(outcome.discarded.is_empty());
        assert!(outcome.trial.validate(10).is_ok());

        let transport = link.into_inner();
        assert_eq!(transport.written_text(), "30.0\n");
        assert_eq!(transport.discards, 1);
    }

    #[test]
    fn malformed_lines_are_discarded() {
        let mut session = CaptureSession::new(&quick_config(), 20.0).unwrap();
        session.state = CaptureState::CommandSent;
        session.step("Chegou");
        session.step("1,5");
        assert!(session.samples().is_empty());

        session.step("START_STREAM");
        session.step("0,10.5");
        session.step("abc,xyz");
        session.step("50,450");
        session.step("100,11.5");

        assert_eq!(session.state(), CaptureState::Recording);
        assert_eq!(
            session.samples(),
            &[
                RawSample {
                    timestamp_ms: 0,
                    distance_cm: 10.5
                },
                RawSample {
                    timestamp_ms: 100,
                    distance_cm: 11.5
                },
            ]
        );
        assert_eq!(
            session.discarded,
            vec![
                DiscardReason::BadTimestamp,
                DiscardReason::OutOfRange(450.0)
            ]
        );

        session.step("END_STREAM");
        assert_eq!(session.state(), CaptureState::Completed);
    }

    #[test]
    fn no_stream_start_times_out_empty() {
        let mut transport = ScriptedTransport::from_lines(&["Chegou", "0,10", "50,11"]);
        transport.push(Step::Idle);
        let mut link = link(transport);

        let outcome = CaptureSession::new(&quick_config(), 30.0)
            .unwrap()
            .run(&mut link)
            .unwrap();

        assert_eq!(outcome.end, CaptureEnd::TimedOut);
        assert!(outcome.trial.samples.is_empty());
        assert!(matches!(
            outcome.trial.validate(10),
            Err(TrialError::InsufficientData {
                collected: 0,
                required: 10
            })
        ));
    }

    #[test]
    fn deadline_keeps_partial_recording() {
        let mut lines = vec!["Chegou".to_owned(), "START_STREAM".to_owned()];
        lines.extend(sample_lines(4));
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        let mut link = link(ScriptedTransport::from_lines(&refs));

        let outcome = CaptureSession::new(&quick_config(), 15.0)
            .unwrap()
            .run(&mut link)
            .unwrap();

        assert_eq!(outcome.end, CaptureEnd::TimedOut);
        assert_eq!(outcome.trial.samples.len(), 4);
    }

    #[test]
    fn stream_start_does_not_restart_the_deadline() {
        let config = LinkConfig {
            capture_timeout_s: 0.1,
            ..quick_config()
        };

        // Each idle poll costs at least one poll interval, so START_STREAM
        // shows up after 70 ms and the last sample after 130 ms.
        let mut transport = ScriptedTransport::from_lines(&["Chegou"]);
        for _ in 0..70 {
            transport.push(Step::Idle);
        }
        transport.push(Step::Bytes(b"START_STREAM\n".to_vec()));
        for line in sample_lines(12) {
            for _ in 0..5 {
                transport.push(Step::Idle);
            }
            transport.push(Step::Bytes(format!("{}\n", line).into_bytes()));
        }
        let mut link = link(transport);

        let outcome = CaptureSession::new(&config, 30.0)
            .unwrap()
            .run(&mut link)
            .unwrap();

        assert_eq!(outcome.end, CaptureEnd::TimedOut);
        assert!(outcome.trial.samples.len() < 12);
    }

    #[test]
    fn ramp_silence_aborts_the_trial() {
        let mut link = link(ScriptedTransport::from_lines(&["Movendo..."]));
        let res = CaptureSession::new(&quick_config(), 30.0)
            .unwrap()
            .run(&mut link);
        assert!(matches!(res, Err(TrialError::PositioningTimeout(_))));
    }

    #[test]
    fn read_failure_while_positioning_aborts() {
        let mut transport = ScriptedTransport::default();
        transport.push(Step::Fail);
        let mut link = link(transport);
        let res = CaptureSession::new(&quick_config(), 30.0)
            .unwrap()
            .run(&mut link);
        assert!(matches!(res, Err(TrialError::Io(_))));
    }

    #[test]
    fn exactly_min_samples_is_insufficient() {
        let trial = Trial {
            angle_deg: 10.0,
            samples: vec![
                RawSample {
                    timestamp_ms: 0,
                    distance_cm: 1.0
                };
                10
            ],
        };
        assert!(trial.validate(10).is_err());
    }

    #[test]
    fn angle_input() {
        assert_eq!(parse_angle(" 30\n").unwrap(), 30.0);
        assert_eq!(parse_angle("12.5").unwrap(), 12.5);
        assert!(matches!(
            parse_angle("trinta"),
            Err(TrialError::InvalidAngleInput(_))
        ));
        assert!(parse_angle("NaN").is_err());
        assert!(parse_angle("inf").is_err());
        assert!(CaptureSession::new(&quick_config(), f64::NAN).is_err());
    }
}
