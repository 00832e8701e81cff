// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use smallvec::SmallVec;
use std::io;

use crate::input_sink::InputSink;
use crate::report::{TouchFrame, FINGER_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEvent {
    Moved { slot: u8, x: u16, y: u16 },
    Released { slot: u8 },
}

pub type SlotEvents = SmallVec<[SlotEvent; FINGER_COUNT]>;

/// Remembers which slots were pressed in the last processed report.
#[derive(Debug, Default)]
pub struct SlotTracker {
    history: u8,
}

impl SlotTracker {
    pub fn new() -> Self {
        Self { history: 0 }
    }

    /// Pressed bitmask of the last processed report.
    pub fn history(&self) -> u8 {
        self.history
    }

    pub fn update(&mut self, frame: &TouchFrame) -> SlotEvents {
        let mut events = SlotEvents::new();

        for point in &frame.points {
            let was_pressed = self.history & (1 << point.slot) != 0;
            match (was_pressed, point.pressed) {
                (_, true) => events.push(SlotEvent::Moved {
                    slot: point.slot,
                    x: point.x,
                    y: point.y,
                }),
                (true, false) => events.push(SlotEvent::Released { slot: point.slot }),
                (false, false) => {}
            }
        }

        self.history = frame.pressed_mask;
        events
    }
}

/// Forwards the events of one report to the sink. A frame sync follows
/// only if there was at least one event.
pub fn apply(events: &[SlotEvent], sink: &mut dyn InputSink) -> io::Result<()> {
    if events.is_empty() {
        return Ok(());
    }
    for event in events {
        match *event {
            SlotEvent::Moved { slot, x, y } => sink.set_slot(slot, x, y, true)?,
            SlotEvent::Released { slot } => sink.set_slot(slot, 0, 0, false)?,
        }
    }
    sink.sync()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_sink::recording::{Recorded, RecordingSink};
    use crate::report::{parse_report, report_with};

    fn feed(tracker: &mut SlotTracker, mask: u8) -> SlotEvents {
        let buffer = report_with(
            mask,
            &[(0, [0x00, 0x64, 0x00, 0x32]), (1, [0x00, 0x0a, 0x00, 0x14])],
        );
        let frame = parse_report(&buffer, tracker.history()).unwrap();
        tracker.update(&frame)
    }

    #[test]
    fn repeated_report_keeps_moving() {
        let mut tracker = SlotTracker::new();

        let first = feed(&mut tracker, 0b00001);
        let second = feed(&mut tracker, 0b00001);

        let moved = SlotEvent::Moved {
            slot: 0,
            x: 100,
            y: 50,
        };
        assert_eq!(first.as_slice(), &[moved]);
        assert_eq!(second.as_slice(), &[moved]);
    }

    #[test]
    fn lifting_releases_only_pressed_slots() {
        let mut tracker = SlotTracker::new();

        feed(&mut tracker, 0b00001);
        let events = feed(&mut tracker, 0b00000);

        assert_eq!(events.as_slice(), &[SlotEvent::Released { slot: 0 }]);
        assert_eq!(tracker.history(), 0);
    }

    #[test]
    fn idle_reports_produce_nothing() {
        let mut tracker = SlotTracker::new();
        let mut sink = RecordingSink::default();

        for _ in 0..2 {
            let events = feed(&mut tracker, 0);
            assert!(events.is_empty());
            apply(&events, &mut sink).unwrap();
        }

        assert!(sink.log().is_empty());
    }

    #[test]
    fn second_finger_uses_reversed_point() {
        let mut tracker = SlotTracker::new();

        let events = feed(&mut tracker, 0b00011);

        assert_eq!(
            events.as_slice(),
            &[
                SlotEvent::Moved {
                    slot: 0,
                    x: 100,
                    y: 50
                },
                SlotEvent::Moved {
                    slot: 1,
                    x: 20,
                    y: 10
                },
            ]
        );
    }

    #[test]
    fn apply_appends_one_sync() {
        let mut sink = RecordingSink::default();
        let events = [
            SlotEvent::Moved {
                slot: 2,
                x: 7,
                y: 9,
            },
            SlotEvent::Released { slot: 3 },
        ];

        apply(&events, &mut sink).unwrap();

        assert_eq!(
            sink.log(),
            vec![
                Recorded::Slot {
                    slot: 2,
                    x: 7,
                    y: 9,
                    pressed: true
                },
                Recorded::Slot {
                    slot: 3,
                    x: 0,
                    y: 0,
                    pressed: false
                },
                Recorded::Sync,
            ]
        );
    }
}
