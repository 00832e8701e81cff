// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

//! Decoding of the 25 byte report sent by the Waveshare 7inch HDMI LCD (B).
//!
//! ```text
//!  offset  0    1      2..6       7        8..12     12..16    16..20    20..24
//!        +----+------+---------+--------+---------+---------+---------+---------+
//!        | ?? | flag | X1 | Y1 | mask   | Y2 | X2 | Y3 | X3 | Y4 | X4 | Y5 | X5 |
//!        +----+------+---------+--------+---------+---------+---------+---------+
//! ```
//!
//! All coordinates are big endian u16. The first point is stored as (X, Y),
//! the other four as (Y, X). This is how the controller sends them and it
//! must not be normalized. Upstream confirmation of the reversed order for
//! points 2 to 5 is still pending; it was characterized on a single unit.

use smallvec::SmallVec;
use thiserror::Error;

/// Length of a report read from the hidraw node.
pub const REPORT_LENGTH: usize = 25;

/// Number of fingers the controller tracks.
pub const FINGER_COUNT: usize = 5;

/// Native resolution of the panel. Coordinates are not clamped to it.
pub const PANEL_WIDTH: u16 = 800;
pub const PANEL_HEIGHT: u16 = 480;

pub const IS_PRESSED_OFFSET: usize = 1;
pub const FIRST_POINT_OFFSET: usize = 2;
pub const PRESSED_BITS_OFFSET: usize = 7;
pub const SECOND_POINT_OFFSET: usize = 8;
pub const THIRD_POINT_OFFSET: usize = 12;
pub const FOURTH_POINT_OFFSET: usize = 16;
pub const FIFTH_POINT_OFFSET: usize = 20;

/// Only the lower five bits of the pressed bitmask carry finger state.
pub const PRESSED_BITS_MASK: u8 = 0x1F;

const POINT_OFFSETS: [usize; FINGER_COUNT] = [
    FIRST_POINT_OFFSET,
    SECOND_POINT_OFFSET,
    THIRD_POINT_OFFSET,
    FOURTH_POINT_OFFSET,
    FIFTH_POINT_OFFSET,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReportError {
    /// The buffer is not a report. Callers drop it and keep reading.
    #[error("not a report: expected {REPORT_LENGTH} bytes, got {actual}")]
    Length { actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchPoint {
    pub slot: u8,
    pub x: u16,
    pub y: u16,
    pub pressed: bool,
}

impl TouchPoint {
    pub fn released(slot: u8) -> Self {
        Self {
            slot,
            x: 0,
            y: 0,
            pressed: false,
        }
    }
}

/// Decoded state of all slots for one report.
///
/// On an idle cycle (nothing pressed now and nothing pressed before)
/// `points` is empty. Otherwise it holds exactly one entry per slot in
/// ascending slot order, so that lifted fingers are visible as explicit
/// releases.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TouchFrame {
    /// Byte 1 of the report. Informational only, the pressed mask alone
    /// decides which slots are touched.
    pub press_flag: bool,
    pub pressed_mask: u8,
    pub points: SmallVec<[TouchPoint; FINGER_COUNT]>,
}

impl TouchFrame {
    pub fn is_idle(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_pressed(&self, slot: u8) -> bool {
        self.pressed_mask & (1 << slot) != 0
    }
}

/// Big endian u16 at `offset`.
#[inline]
pub fn read_point(buffer: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buffer[offset], buffer[offset + 1]])
}

/// (x, y) stored as X then Y.
#[inline]
pub fn read_direct(buffer: &[u8], offset: usize) -> (u16, u16) {
    (read_point(buffer, offset), read_point(buffer, offset + 2))
}

/// (x, y) stored as Y then X.
#[inline]
pub fn read_reversed(buffer: &[u8], offset: usize) -> (u16, u16) {
    (read_point(buffer, offset + 2), read_point(buffer, offset))
}

pub fn slot_offset(slot: usize) -> usize {
    POINT_OFFSETS[slot]
}

fn read_slot(buffer: &[u8], slot: usize) -> (u16, u16) {
    let offset = slot_offset(slot);
    if slot == 0 {
        read_direct(buffer, offset)
    } else {
        read_reversed(buffer, offset)
    }
}

/// Decodes one report.
///
/// `previous_mask` is the pressed bitmask of the last processed report. It
/// decides whether an all-zero bitmask still needs a frame (fingers were
/// lifted) or can be skipped entirely.
pub fn parse_report(buffer: &[u8], previous_mask: u8) -> Result<TouchFrame, ReportError> {
    if buffer.len() != REPORT_LENGTH {
        return Err(ReportError::Length {
            actual: buffer.len(),
        });
    }

    let press_flag = buffer[IS_PRESSED_OFFSET] != 0;
    let pressed_mask = buffer[PRESSED_BITS_OFFSET] & PRESSED_BITS_MASK;

    let mut frame = TouchFrame {
        press_flag,
        pressed_mask,
        points: SmallVec::new(),
    };

    if pressed_mask == 0 && previous_mask & PRESSED_BITS_MASK == 0 {
        return Ok(frame);
    }

    for slot in 0..FINGER_COUNT {
        let point = if pressed_mask & (1 << slot) != 0 {
            let (x, y) = read_slot(buffer, slot);
            TouchPoint {
                slot: slot as u8,
                x,
                y,
                pressed: true,
            }
        } else {
            TouchPoint::released(slot as u8)
        };
        frame.points.push(point);
    }

    Ok(frame)
}

#[cfg(test)]
pub(crate) fn report_with(mask: u8, points: &[(usize, [u8; 4])]) -> [u8; REPORT_LENGTH] {
    let mut buffer = [0u8; REPORT_LENGTH];
    buffer[IS_PRESSED_OFFSET] = u8::from(mask != 0);
    buffer[PRESSED_BITS_OFFSET] = mask;
    for (slot, bytes) in points {
        let offset = slot_offset(*slot);
        buffer[offset..offset + 4].copy_from_slice(bytes);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_every_other_length() {
        for len in [0, 1, 24, 26, 64] {
            let buffer = vec![0xffu8; len];
            assert_eq!(
                parse_report(&buffer, 0x1f),
                Err(ReportError::Length { actual: len })
            );
        }
    }

    #[test]
    fn first_point_is_direct_order() {
        let buffer = report_with(0b00001, &[(0, [0x00, 0x64, 0x00, 0x32])]);
        let frame = parse_report(&buffer, 0).unwrap();

        assert_eq!(
            frame.points[0],
            TouchPoint {
                slot: 0,
                x: 100,
                y: 50,
                pressed: true
            }
        );
    }

    #[test]
    fn second_point_is_reversed_order() {
        let buffer = report_with(0b00010, &[(1, [0x00, 0x32, 0x00, 0x64])]);
        let frame = parse_report(&buffer, 0).unwrap();

        assert_eq!(frame.points[0], TouchPoint::released(0));
        assert_eq!(
            frame.points[1],
            TouchPoint {
                slot: 1,
                x: 100,
                y: 50,
                pressed: true
            }
        );
    }

    #[test]
    fn fifth_point_reads_from_offset_20() {
        let buffer = report_with(0b10000, &[(4, [0x01, 0xdf, 0x03, 0x1f])]);
        let frame = parse_report(&buffer, 0).unwrap();

        assert_eq!(frame.points[4].x, 799);
        assert_eq!(frame.points[4].y, 479);
        assert!(frame.points[4].pressed);
    }

    #[test]
    fn idle_report_without_history_is_empty() {
        let buffer = report_with(0, &[(0, [0x00, 0x64, 0x00, 0x32])]);
        let frame = parse_report(&buffer, 0).unwrap();

        assert!(frame.is_idle());
        assert_eq!(frame.pressed_mask, 0);
    }

    #[test]
    fn idle_report_after_press_releases_all_slots() {
        let buffer = report_with(0, &[]);
        let frame = parse_report(&buffer, 0b00001).unwrap();

        assert_eq!(frame.points.len(), FINGER_COUNT);
        for (slot, point) in frame.points.iter().enumerate() {
            assert_eq!(*point, TouchPoint::released(slot as u8));
        }
    }

    #[test]
    fn upper_mask_bits_are_ignored() {
        let buffer = report_with(0b1110_0000, &[]);
        let frame = parse_report(&buffer, 0).unwrap();

        assert!(frame.is_idle());
    }

    #[test]
    fn out_of_range_coordinates_pass_through() {
        let buffer = report_with(0b00001, &[(0, [0xff, 0xff, 0x12, 0x34])]);
        let frame = parse_report(&buffer, 0).unwrap();

        assert_eq!(frame.points[0].x, 0xffff);
        assert_eq!(frame.points[0].y, 0x1234);
    }
}
