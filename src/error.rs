//! The error taxonomy of the rig software. Link errors end the whole run,
//! trial errors only end the trial that raised them.

use std::{borrow::Cow, fmt, io, time::Duration};

/// Errors that make the serial link unusable. There is no retry, the
/// operator has to restart the program.
#[derive(Debug)]
pub enum LinkError {
    /// The transport could not be opened. Carries the port name.
    ConnectionFailed(String, io::Error),

    /// No readiness line arrived before the handshake deadline.
    HandshakeTimeout(Duration),

    /// The transport failed while waiting for the device.
    Io(io::Error),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use LinkError as LE;
        let msg = match self {
            LE::ConnectionFailed(port, error) => {
                Cow::from(format!("could not open {}: {}", port, error))
            }
            LE::HandshakeTimeout(timeout) => Cow::from(format!(
                "device did not report ready within {:.1}s",
                timeout.as_secs_f64()
            )),
            LE::Io(error) => Cow::from(format!("link io error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for LinkError {}

impl From<io::Error> for LinkError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Errors that abort a single trial. The operator may start another one.
#[derive(Debug)]
pub enum TrialError {
    /// The operator typed something that is not a finite angle.
    InvalidAngleInput(String),

    /// The ramp never reported that it reached the commanded angle.
    PositioningTimeout(Duration),

    /// The transport failed in the middle of the trial.
    Io(io::Error),

    /// Too few valid samples were captured to run the physics.
    InsufficientData {
        /// Valid samples captured
        collected: usize,
        /// The trial needs strictly more than this many samples
        required: usize,
    },
}

impl fmt::Display for TrialError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TrialError as TE;
        let msg = match self {
            TE::InvalidAngleInput(input) => Cow::from(format!("invalid angle: {:?}", input)),
            TE::PositioningTimeout(timeout) => Cow::from(format!(
                "ramp not positioned after {:.1}s",
                timeout.as_secs_f64()
            )),
            TE::Io(error) => Cow::from(format!("trial io error: {}", error)),
            TE::InsufficientData {
                collected,
                required,
            } => Cow::from(format!(
                "insufficient data: {} samples, need more than {}",
                collected, required
            )),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for TrialError {}

impl From<io::Error> for TrialError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
