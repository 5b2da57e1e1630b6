//! A stand-in for the ramp controller, for running the whole host software
//! without the rig on the bench.
//!
//! [`SimulatedRamp`] speaks the same line protocol as the firmware. After
//! boot it prints its banner and asks for an angle; every angle it receives
//! is answered with the positioning message and a stream of distance samples
//! of a block sliding down with a fixed friction coefficient. The samples can
//! be made noisy, and glitched lines can be mixed in, to exercise the host's
//! filtering.

use crate::{
    device_message::{READY_BANNER, READY_PROMPT, POSITIONED, STREAM_END, STREAM_START},
    transport::Transport,
};

use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{collections::VecDeque, io};

/// A simulated ramp controller that implements [`Transport`].
pub struct SimulatedRamp {
    outbox: VecDeque<u8>,
    inbox: Vec<u8>,
    rng: StdRng,
    mu: f64,
    gravity: f64,
    samples: usize,
    period_ms: i64,
    start_cm: f64,
    noise_cm: f64,
    stream_markers: bool,
    glitch_every: Option<usize>,
}

impl Default for SimulatedRamp {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRamp {
    /// A freshly booted controller, with a block of μ = 0.3 on the ramp and
    /// a sensor that samples every 20 ms.
    pub fn new() -> Self {
        let mut ramp = SimulatedRamp {
            outbox: VecDeque::new(),
            inbox: Vec::new(),
            rng: StdRng::from_entropy(),
            mu: 0.3,
            gravity: 9.81,
            samples: 60,
            period_ms: 20,
            start_cm: 10.0,
            noise_cm: 0.0,
            stream_markers: true,
            glitch_every: None,
        };
        ramp.say("Inicializando...");
        ramp.say(READY_BANNER);
        ramp.say(&format!("{}:", READY_PROMPT));
        ramp
    }

    /// Sets the dynamic friction coefficient between block and ramp.
    pub fn friction(self, mu: f64) -> Self {
        SimulatedRamp { mu, ..self }
    }

    /// Sets how many samples each stream carries.
    pub fn samples(self, samples: usize) -> Self {
        SimulatedRamp { samples, ..self }
    }

    /// Sets the amplitude of the uniform noise on every distance, in cm.
    pub fn noise(self, noise_cm: f64) -> Self {
        SimulatedRamp { noise_cm, ..self }
    }

    /// Makes the noise reproducible.
    pub fn seed(self, seed: u64) -> Self {
        SimulatedRamp {
            rng: StdRng::seed_from_u64(seed),
            ..self
        }
    }

    /// Replaces every `n`th sample with a line the host has to reject.
    pub fn glitch_every(self, n: usize) -> Self {
        SimulatedRamp {
            glitch_every: Some(n.max(1)),
            ..self
        }
    }

    /// Stops sending `START_STREAM` and `END_STREAM`, like a firmware whose
    /// sensor never triggered.
    pub fn without_stream_markers(self) -> Self {
        SimulatedRamp {
            stream_markers: false,
            ..self
        }
    }

    fn say(&mut self, line: &str) {
        self.outbox.extend(line.as_bytes());
        self.outbox.extend(b"\r\n");
    }

    fn handle_command(&mut self, command: &str) {
        let Ok(angle_deg) = command.trim().parse::<f64>() else {
            self.say("Angulo invalido");
            return;
        };
        debug!("Simulated ramp tilting to {}°", angle_deg);

        self.say(&format!("Movendo para {} graus", angle_deg));
        self.say(&format!("{} ao angulo", POSITIONED));
        if self.stream_markers {
            self.say(STREAM_START);
        }
        for line in self.stream(angle_deg) {
            self.say(&line);
        }
        if self.stream_markers {
            self.say(STREAM_END);
        }
        self.say(&format!("{}:", READY_PROMPT));
    }

    /// The sample lines of one slide, released from rest at the first sample.
    fn stream(&mut self, angle_deg: f64) -> Vec<String> {
        let theta = angle_deg.to_radians();
        let accel = (self.gravity * (theta.sin() - self.mu * theta.cos())).max(0.0);
        let boot_ms = 1000;

        (0..self.samples)
            .map(|i| {
                if let Some(n) = self.glitch_every {
                    if i % n == n - 1 {
                        return if (i / n) % 2 == 0 {
                            format!("{},ERR", boot_ms + i as i64 * self.period_ms)
                        } else {
                            format!("{},999.0", boot_ms + i as i64 * self.period_ms)
                        };
                    }
                }

                let t = (i as i64 * self.period_ms) as f64 / 1000.0;
                let mut distance_cm = self.start_cm + 100.0 * 0.5 * accel * t * t;
                if self.noise_cm > 0.0 {
                    distance_cm += self.rng.gen_range(-self.noise_cm..self.noise_cm);
                }
                format!("{},{:.2}", boot_ms + i as i64 * self.period_ms, distance_cm)
            })
            .collect()
    }
}

impl Transport for SimulatedRamp {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.outbox.len());
        for (slot, byte) in buf.iter_mut().zip(self.outbox.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inbox.extend_from_slice(bytes);
        while let Some(end) = self.inbox.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.inbox.drain(..=end).collect();
            let command = String::from_utf8_lossy(&raw).into_owned();
            self.handle_command(&command);
        }
        Ok(())
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.outbox.clear();
        Ok(())
    }
}
