//! Turns the raw byte stream of a [`Transport`] into newline-delimited text
//! lines, with reads bounded by an explicit deadline.

use crate::transport::Transport;
use log::trace;
use std::{
    io,
    time::{Duration, Instant},
};

/// The result of polling a [`Link`] once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    /// A complete, trimmed line arrived.
    Line(String),
    /// Nothing complete is waiting yet, the deadline has not passed.
    NoData,
    /// The deadline passed with no complete line waiting.
    DeadlineExceeded,
}

/// A line-oriented view of a [`Transport`]. The link owns the transport for
/// the whole operator session.
pub struct Link<T: Transport> {
    transport: T,
    pending: Vec<u8>,
    poll_interval: Duration,
}

impl<T: Transport> Link<T> {
    /// Wrap an open transport. `poll_interval` is how long
    /// [`Link::next_line`] rests between polls of an idle transport.
    pub fn new(transport: T, poll_interval: Duration) -> Self {
        Self {
            transport,
            pending: Vec::new(),
            poll_interval,
        }
    }

    /// Poll the transport once. A line that has already been assembled is
    /// handed out even if the deadline has passed.
    pub fn poll_line(&mut self, deadline: Instant) -> io::Result<LineRead> {
        if let Some(line) = self.take_line() {
            return Ok(LineRead::Line(line));
        }
        if Instant::now() >= deadline {
            return Ok(LineRead::DeadlineExceeded);
        }

        let mut buffer = [0; 256];
        let read_len = self.transport.read_available(&mut buffer)?;
        self.pending.extend_from_slice(&buffer[..read_len]);

        Ok(match self.take_line() {
            Some(line) => LineRead::Line(line),
            None => LineRead::NoData,
        })
    }

    /// Keep polling until a line arrives or `deadline` passes, in which
    /// case `None` is returned.
    pub fn next_line(&mut self, deadline: Instant) -> io::Result<Option<String>> {
        loop {
            match self.poll_line(deadline)? {
                LineRead::Line(line) => return Ok(Some(line)),
                LineRead::NoData => spin_sleep::sleep(self.poll_interval),
                LineRead::DeadlineExceeded => return Ok(None),
            }
        }
    }

    /// Send `text` followed by a newline.
    pub fn send_line(&mut self, text: &str) -> io::Result<()> {
        trace!("-> {}", text);
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(b'\n');
        self.transport.write_all(&bytes)
    }

    /// Drop everything received so far, including half-assembled lines.
    pub fn clear_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.transport.discard_input()
    }

    /// Borrow the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Give the transport back, releasing the link.
    pub fn into_inner(self) -> T {
        self.transport
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=end).collect();
        let line = decode_line(&raw);
        trace!("<- {}", line);
        Some(line)
    }
}

/// Decode a raw line, silently dropping bytes that are not valid UTF-8.
/// The controller tends to emit some right after the port opens and it
/// resets.
fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect::<String>()
        .trim()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::scripted::{ScriptedTransport, Step};

    fn soon() -> Instant {
        Instant::now() + Duration::from_millis(50)
    }

    #[test]
    fn assembles_lines_across_reads() {
        let mut transport = ScriptedTransport::default();
        transport.push(Step::Bytes(b"12,3".to_vec()));
        transport.push(Step::Idle);
        transport.push(Step::Bytes(b"4.5\r\nEND_".to_vec()));
        transport.push(Step::Bytes(b"STREAM\n".to_vec()));
        let mut link = Link::new(transport, Duration::from_millis(1));

        assert_eq!(link.next_line(soon()).unwrap(), Some("12,34.5".to_owned()));
        assert_eq!(link.next_line(soon()).unwrap(), Some("END_STREAM".to_owned()));
    }

    #[test]
    fn poll_is_tri_state() {
        let mut transport = ScriptedTransport::default();
        transport.push(Step::Idle);
        transport.push(Step::Bytes(b"hello\n".to_vec()));
        let mut link = Link::new(transport, Duration::from_millis(1));

        assert_eq!(link.poll_line(soon()).unwrap(), LineRead::NoData);
        assert_eq!(
            link.poll_line(soon()).unwrap(),
            LineRead::Line("hello".to_owned())
        );
        let past = Instant::now() - Duration::from_millis(1);
        assert_eq!(link.poll_line(past).unwrap(), LineRead::DeadlineExceeded);
    }

    #[test]
    fn deadline_ends_an_idle_wait() {
        let mut link = Link::new(ScriptedTransport::default(), Duration::from_millis(1));
        let start = Instant::now();
        assert_eq!(link.next_line(start + Duration::from_millis(20)).unwrap(), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn invalid_utf8_is_dropped() {
        let mut transport = ScriptedTransport::default();
        transport.push(Step::Bytes(vec![0xFF, 0xFE, b'O', b'K', 0x80, b'\n']));
        let mut link = Link::new(transport, Duration::from_millis(1));

        assert_eq!(link.next_line(soon()).unwrap(), Some("OK".to_owned()));
    }

    #[test]
    fn read_errors_propagate() {
        let mut transport = ScriptedTransport::default();
        transport.push(Step::Fail);
        let mut link = Link::new(transport, Duration::from_millis(1));

        assert!(link.next_line(soon()).is_err());
    }

    #[test]
    fn clear_drops_partial_lines() {
        let mut transport = ScriptedTransport::default();
        transport.push(Step::Bytes(b"stale".to_vec()));
        transport.push(Step::Bytes(b"fresh\n".to_vec()));
        let mut link = Link::new(transport, Duration::from_millis(1));

        assert_eq!(link.poll_line(soon()).unwrap(), LineRead::NoData);
        link.clear_input().unwrap();
        assert_eq!(link.next_line(soon()).unwrap(), Some("fresh".to_owned()));
        assert_eq!(link.transport().discards, 1);
    }

    #[test]
    fn send_line_appends_newline() {
        let mut link = Link::new(ScriptedTransport::default(), Duration::from_millis(1));
        link.send_line("30").unwrap();
        assert_eq!(link.into_inner().written_text(), "30\n");
    }
}
