//! Telemetry frame decoding
//!
//! The simulator emits packets of at least 64 little-endian `f32` values.
//! Only a handful of them matter for calling pacenotes; the rest are
//! skipped.

use bytes::Buf;
use serde::Serialize;

use crate::error::TelemetryError;

/// Number of `f32` values in the fixed frame
pub const FRAME_FIELDS: usize = 64;

/// Minimum packet size in bytes
pub const FRAME_SIZE: usize = FRAME_FIELDS * 4;

const IDX_TOTAL_TIME: usize = 0;
const IDX_LAP_TIME: usize = 1;
const IDX_DISTANCE: usize = 2;
const IDX_POS_Y: usize = 5;
const IDX_CURRENT_LAP: usize = 59;
const IDX_TOTAL_LAPS: usize = 60;
const IDX_STAGE_LENGTH: usize = 61;

/// Decoded snapshot of one telemetry packet
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryFrame {
    /// Seconds since stage start, 0 between stages
    pub total_time: f32,
    /// Seconds since lap start, 0 while the clock is stopped
    pub lap_time: f32,
    /// Meters along the stage, negative before the start line
    pub distance: i32,
    /// World Y coordinate, used to tell stages of equal length apart
    pub y_position: i32,
    /// 0 while on stage, 1 once the finish line is crossed
    pub current_lap: i32,
    /// 1 for rally stages
    pub total_laps: i32,
    /// Stage length in meters, rounded to 4 decimals
    pub stage_length: f64,
}

impl TelemetryFrame {
    /// Decode a frame from a raw packet.
    ///
    /// Bytes beyond [`FRAME_SIZE`] are ignored.
    pub fn decode(packet: &[u8]) -> Result<Self, TelemetryError> {
        if packet.len() < FRAME_SIZE {
            return Err(TelemetryError::MalformedFrame {
                len: packet.len(),
                required: FRAME_SIZE,
            });
        }

        let mut fields = [0.0f32; FRAME_FIELDS];
        let mut buf = &packet[..FRAME_SIZE];
        for field in fields.iter_mut() {
            *field = buf.get_f32_le();
        }

        Ok(Self {
            total_time: fields[IDX_TOTAL_TIME],
            lap_time: fields[IDX_LAP_TIME],
            distance: fields[IDX_DISTANCE] as i32,
            y_position: fields[IDX_POS_Y] as i32,
            current_lap: fields[IDX_CURRENT_LAP] as i32,
            total_laps: fields[IDX_TOTAL_LAPS] as i32,
            stage_length: round4(fields[IDX_STAGE_LENGTH] as f64),
        })
    }

    /// Whether the stage clock has started
    pub fn clock_running(&self) -> bool {
        self.lap_time > 0.0
    }

    /// Frames sent between stages after the finish: clock zeroed, lap still set
    pub fn is_transitional(&self) -> bool {
        self.total_time == 0.0 && self.current_lap != 0
    }

    /// Whether the car has crossed the finish line
    pub fn finished(&self) -> bool {
        self.current_lap == 1
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Encode raw field values into a packet. Used to script telemetry in tests.
#[cfg(test)]
pub(crate) fn encode_fields(fields: &[(usize, f32)]) -> Vec<u8> {
    let mut values = [0.0f32; FRAME_FIELDS];
    for &(idx, value) in fields {
        values[idx] = value;
    }
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Test builder for telemetry packets
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PacketBuilder {
    pub total_time: f32,
    pub lap_time: f32,
    pub distance: f32,
    pub y_position: f32,
    pub current_lap: f32,
    pub total_laps: f32,
    pub stage_length: f32,
}

#[cfg(test)]
impl PacketBuilder {
    pub fn build(&self) -> Vec<u8> {
        encode_fields(&[
            (IDX_TOTAL_TIME, self.total_time),
            (IDX_LAP_TIME, self.lap_time),
            (IDX_DISTANCE, self.distance),
            (IDX_POS_Y, self.y_position),
            (IDX_CURRENT_LAP, self.current_lap),
            (IDX_TOTAL_LAPS, self.total_laps),
            (IDX_STAGE_LENGTH, self.stage_length),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_field_offsets() {
        let packet = encode_fields(&[
            (0, 12.5),
            (1, 11.25),
            (2, 347.9),
            (3, 99.0),
            (5, -1204.7),
            (59, 0.0),
            (60, 1.0),
            (61, 9876.543_21),
        ]);

        let frame = TelemetryFrame::decode(&packet).unwrap();
        assert_eq!(frame.total_time, 12.5);
        assert_eq!(frame.lap_time, 11.25);
        assert_eq!(frame.distance, 347);
        assert_eq!(frame.y_position, -1204);
        assert_eq!(frame.current_lap, 0);
        assert_eq!(frame.total_laps, 1);
        assert!((frame.stage_length - 9876.5430).abs() < 1e-9);
    }

    #[test]
    fn test_negative_distance_truncates_toward_zero() {
        let packet = encode_fields(&[(2, -15.8)]);
        let frame = TelemetryFrame::decode(&packet).unwrap();
        assert_eq!(frame.distance, -15);
    }

    #[test]
    fn test_short_packet_is_malformed() {
        let packet = vec![0u8; FRAME_SIZE - 1];
        assert_eq!(
            TelemetryFrame::decode(&packet),
            Err(TelemetryError::MalformedFrame {
                len: FRAME_SIZE - 1,
                required: FRAME_SIZE
            })
        );
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut packet = PacketBuilder {
            total_time: 3.0,
            distance: 42.0,
            ..Default::default()
        }
        .build();
        let expected = TelemetryFrame::decode(&packet).unwrap();

        packet.extend_from_slice(&[0xFF; 8]);
        assert_eq!(TelemetryFrame::decode(&packet).unwrap(), expected);
    }

    #[test]
    fn test_transitional_frame() {
        let frame = TelemetryFrame::decode(
            &PacketBuilder {
                current_lap: 1.0,
                ..Default::default()
            }
            .build(),
        )
        .unwrap();
        assert!(frame.is_transitional());
        assert!(frame.finished());
        assert!(!frame.clock_running());
    }

    proptest! {
        #[test]
        fn prop_decode_is_deterministic(bytes in proptest::collection::vec(any::<u8>(), FRAME_SIZE..FRAME_SIZE + 64)) {
            let a = TelemetryFrame::decode(&bytes).unwrap();
            let b = TelemetryFrame::decode(&bytes).unwrap();
            // NaN fields never compare equal, so compare bit patterns
            prop_assert_eq!(a.total_time.to_bits(), b.total_time.to_bits());
            prop_assert_eq!(a.lap_time.to_bits(), b.lap_time.to_bits());
            prop_assert_eq!(a.distance, b.distance);
            prop_assert_eq!(a.y_position, b.y_position);
            prop_assert_eq!(a.current_lap, b.current_lap);
            prop_assert_eq!(a.total_laps, b.total_laps);
            prop_assert_eq!(a.stage_length.to_bits(), b.stage_length.to_bits());
        }

        #[test]
        fn prop_fields_land_on_their_offsets(
            total in 0.0f32..10_000.0,
            lap in 0.0f32..10_000.0,
            dist in -500i32..20_000,
            laps in 0i32..3,
        ) {
            let frame = TelemetryFrame::decode(&PacketBuilder {
                total_time: total,
                lap_time: lap,
                distance: dist as f32,
                total_laps: laps as f32,
                ..Default::default()
            }.build()).unwrap();
            prop_assert_eq!(frame.total_time, total);
            prop_assert_eq!(frame.lap_time, lap);
            prop_assert_eq!(frame.distance, dist);
            prop_assert_eq!(frame.total_laps, laps);
            prop_assert_eq!(frame.y_position, 0);
        }

        #[test]
        fn prop_short_buffers_rejected(bytes in proptest::collection::vec(any::<u8>(), 0..FRAME_SIZE)) {
            let is_malformed = matches!(
                TelemetryFrame::decode(&bytes),
                Err(TelemetryError::MalformedFrame { .. })
            );
            prop_assert!(is_malformed);
        }
    }
}
