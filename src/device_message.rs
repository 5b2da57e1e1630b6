//! Decoding of the text lines the ramp controller sends. Control lines are
//! recognised by the markers they contain, sample lines have the shape
//! `<timestamp_ms>,<distance_cm>`.

use crate::capture::RawSample;

use nom::{
    character::complete::{i64, space0},
    combinator::all_consuming,
    number::complete::double,
    sequence::delimited,
    Finish, IResult,
};

/// Printed by the firmware when it waits for an angle.
pub const READY_PROMPT: &str = "Digite o angulo";
/// Printed by the firmware once after boot.
pub const READY_BANNER: &str = "Sistema Pronto";
/// The ramp reached the commanded angle.
pub const POSITIONED: &str = "Chegou";
/// The controller starts sending samples.
pub const STREAM_START: &str = "START_STREAM";
/// The controller is done sending samples.
pub const STREAM_END: &str = "END_STREAM";

/// Distances outside of this open interval (cm) are sensor glitches.
pub const DISTANCE_RANGE_CM: (f64, f64) = (0.0, 400.0);

/// What a control line means to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMessage {
    /// [`READY_PROMPT`] or [`READY_BANNER`]
    Ready,
    /// [`POSITIONED`]
    Positioned,
    /// [`STREAM_START`]
    StreamStart,
    /// [`STREAM_END`]
    StreamEnd,
    /// Anything else, including sample lines.
    Other(String),
}

impl DeviceMessage {
    /// Classify a line by the markers it contains.
    pub fn classify(line: &str) -> Self {
        if line.contains(READY_PROMPT) || line.contains(READY_BANNER) {
            DeviceMessage::Ready
        } else if line.contains(POSITIONED) {
            DeviceMessage::Positioned
        } else if line.contains(STREAM_START) {
            DeviceMessage::StreamStart
        } else if line.contains(STREAM_END) {
            DeviceMessage::StreamEnd
        } else {
            DeviceMessage::Other(line.to_owned())
        }
    }
}

/// Why a sample line was not turned into a [`RawSample`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiscardReason {
    /// The line did not split into exactly two comma separated fields.
    FieldCount(usize),
    /// The first field is not an integer.
    BadTimestamp,
    /// The second field is not a number.
    BadDistance,
    /// The distance is outside of [`DISTANCE_RANGE_CM`].
    OutOfRange(f64),
}

/// The outcome of decoding one sample line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleParse {
    /// A valid sample.
    Parsed(RawSample),
    /// A line to drop.
    Discarded(DiscardReason),
}

fn parse_timestamp(s: &str) -> IResult<&str, i64> {
    all_consuming(delimited(space0, i64, space0))(s)
}

fn parse_distance(s: &str) -> IResult<&str, f64> {
    all_consuming(delimited(space0, double, space0))(s)
}

/// Decode a `<timestamp_ms>,<distance_cm>` line.
pub fn parse_sample(line: &str) -> SampleParse {
    use DiscardReason as DR;

    let fields: Vec<&str> = line.split(',').collect();
    let &[time_field, distance_field] = fields.as_slice() else {
        return SampleParse::Discarded(DR::FieldCount(fields.len()));
    };

    let Ok((_, timestamp_ms)) = parse_timestamp(time_field).finish() else {
        return SampleParse::Discarded(DR::BadTimestamp);
    };
    let Ok((_, distance_cm)) = parse_distance(distance_field).finish() else {
        return SampleParse::Discarded(DR::BadDistance);
    };

    let (low, high) = DISTANCE_RANGE_CM;
    if !(distance_cm > low && distance_cm < high) {
        return SampleParse::Discarded(DR::OutOfRange(distance_cm));
    }

    SampleParse::Parsed(RawSample {
        timestamp_ms,
        distance_cm,
    })
}
