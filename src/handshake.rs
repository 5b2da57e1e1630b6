//! Establishing that the ramp controller is alive and listening before any
//! command is sent to it.

use crate::{
    config::LinkConfig,
    device_message::DeviceMessage,
    error::LinkError,
    link::Link,
    transport::{SerialTransport, Transport},
};

use log::{debug, info};
use std::time::{Duration, Instant};

/// Open the serial port at `device` and wait for the controller to report
/// ready, using the baud rate and deadlines of `config`.
pub fn open_serial(device: &str, config: &LinkConfig) -> Result<Link<SerialTransport>, LinkError> {
    info!("Connecting to {} at {} baud", device, config.baud_rate);
    let transport = SerialTransport::open(device, config.baud_rate, config.poll_interval())
        .map_err(|e| LinkError::ConnectionFailed(device.to_owned(), e))?;

    establish(
        Link::new(transport, config.poll_interval()),
        config.handshake_timeout(),
    )
}

/// Consume lines from `link` until one carries a readiness marker. Every
/// line before it is thrown away. Fails with [`LinkError::HandshakeTimeout`]
/// if `timeout` passes first.
pub fn establish<T: Transport>(mut link: Link<T>, timeout: Duration) -> Result<Link<T>, LinkError> {
    info!("Waiting for the device to boot...");
    let deadline = Instant::now() + timeout;

    while let Some(line) = link.next_line(deadline)? {
        match DeviceMessage::classify(&line) {
            DeviceMessage::Ready => {
                info!("Device ready");
                return Ok(link);
            }
            _ => debug!("Skipping boot line {:?}", line),
        }
    }

    Err(LinkError::HandshakeTimeout(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::scripted::{ScriptedTransport, Step};

    fn link(transport: ScriptedTransport) -> Link<ScriptedTransport> {
        Link::new(transport, Duration::from_millis(1))
    }

    #[test]
    fn ready_prompt_completes_handshake() {
        let transport = ScriptedTransport::from_lines(&[
            "boot v1.2",
            "calibrating servo",
            "Digite o angulo:",
            "leftover",
        ]);
        let mut link = establish(link(transport), Duration::from_millis(200)).unwrap();

        // Lines after the marker are left for the capture session
        let deadline = Instant::now() + Duration::from_millis(50);
        assert_eq!(link.next_line(deadline).unwrap(), Some("leftover".to_owned()));
    }

    #[test]
    fn ready_banner_completes_handshake() {
        let transport = ScriptedTransport::from_lines(&["Sistema Pronto"]);
        assert!(establish(link(transport), Duration::from_millis(200)).is_ok());
    }

    #[test]
    fn silence_times_out() {
        let mut transport = ScriptedTransport::from_lines(&["boot", "noise"]);
        transport.push(Step::Idle);
        let res = establish(link(transport), Duration::from_millis(30));
        assert!(matches!(res, Err(LinkError::HandshakeTimeout(_))));
    }

    #[test]
    fn read_failure_is_an_io_error() {
        let mut transport = ScriptedTransport::default();
        transport.push(Step::Fail);
        let res = establish(link(transport), Duration::from_millis(30));
        assert!(matches!(res, Err(LinkError::Io(_))));
    }

    #[test]
    fn missing_port_fails_to_connect() {
        let res = open_serial("/dev/does-not-exist-tribometer", &LinkConfig::default());
        assert!(matches!(res, Err(LinkError::ConnectionFailed(_, _))));
    }
}
