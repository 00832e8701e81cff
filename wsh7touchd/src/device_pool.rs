// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

//! Fixed size table of device sessions.
//!
//! The table never grows. A slot can be claimed again once the session that
//! occupied it has stopped. Claiming and releasing happen under one lock, so
//! a start from the monitor loop and the end of a session can not race.

use log::{debug, info};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::device_session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Slot claimed, the session has not started opening yet.
    Idle,
    /// Session is opening the device or streaming reports.
    Running,
    /// Session closed; the slot may be reused.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub device: String,
    pub state: HandleState,
    pub generation: u64,
}

impl DeviceHandle {
    fn is_live(&self) -> bool {
        self.state != HandleState::Stopped
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("all {capacity} device slots are busy, ignoring {device}")]
    PoolFull { device: String, capacity: usize },
    #[error("{device} is already serviced by slot {slot}")]
    AlreadyRunning { device: String, slot: usize },
    #[error("could not launch a session for {device}: {reason}")]
    Launch { device: String, reason: String },
}

/// Starts the session that belongs to a freshly claimed slot.
///
/// Implementations must not wait for the session; they only hand the ticket
/// over to whatever runs it. Dropping the ticket frees the slot.
pub trait SessionLauncher {
    fn launch(&self, ticket: SlotTicket) -> Result<(), String>;
}

#[derive(Debug)]
struct PoolTable {
    slots: Vec<Option<DeviceHandle>>,
    next_generation: u64,
}

impl PoolTable {
    /// Marks the slot as `state` if it still belongs to `generation`.
    /// Returns whether anything changed.
    fn update(&mut self, index: usize, generation: u64, state: HandleState) -> bool {
        match self.slots.get_mut(index) {
            Some(Some(handle)) if handle.generation == generation && handle.state != state => {
                if handle.state == HandleState::Stopped {
                    return false;
                }
                handle.state = state;
                true
            }
            _ => false,
        }
    }
}

/// Proof of ownership of one pool slot, held by the running session.
///
/// The slot is marked stopped exactly once: either through
/// [`SlotTicket::set_session_state`] with [`SessionState::Closed`] or when the
/// ticket is dropped, whichever happens first.
#[derive(Debug)]
pub struct SlotTicket {
    table: Arc<Mutex<PoolTable>>,
    index: usize,
    generation: u64,
    device: String,
}

impl SlotTicket {
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn set_session_state(&self, state: SessionState) {
        let state = match state {
            SessionState::Opening | SessionState::Streaming => HandleState::Running,
            SessionState::Closed => HandleState::Stopped,
        };
        self.update(state);
    }

    fn update(&self, state: HandleState) {
        let changed = self
            .table
            .lock()
            .unwrap()
            .update(self.index, self.generation, state);
        if changed && state == HandleState::Stopped {
            info!("slot {} released by {}", self.index, self.device);
        }
    }
}

impl Drop for SlotTicket {
    fn drop(&mut self) {
        self.update(HandleState::Stopped);
    }
}

pub struct DevicePool<L: SessionLauncher> {
    table: Arc<Mutex<PoolTable>>,
    launcher: L,
}

impl<L: SessionLauncher> DevicePool<L> {
    pub fn new(capacity: usize, launcher: L) -> Self {
        Self {
            table: Arc::new(Mutex::new(PoolTable {
                slots: vec![None; capacity],
                next_generation: 0,
            })),
            launcher,
        }
    }

    pub fn capacity(&self) -> usize {
        self.table.lock().unwrap().slots.len()
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Copy of the table, one entry per slot.
    pub fn snapshot(&self) -> Vec<Option<DeviceHandle>> {
        self.table.lock().unwrap().slots.clone()
    }

    /// Claims a slot for `device` and launches a session for it. Returns the
    /// slot index without waiting for the session to open the device.
    pub fn try_start(&self, device: &str) -> Result<usize, PoolError> {
        let ticket = {
            let mut table = self.table.lock().unwrap();

            let running = table.slots.iter().position(|slot| {
                slot.as_ref()
                    .is_some_and(|handle| handle.is_live() && handle.device == device)
            });
            if let Some(slot) = running {
                return Err(PoolError::AlreadyRunning {
                    device: device.to_string(),
                    slot,
                });
            }

            let free = table
                .slots
                .iter()
                .position(|slot| slot.as_ref().map_or(true, |handle| !handle.is_live()));
            let Some(index) = free else {
                return Err(PoolError::PoolFull {
                    device: device.to_string(),
                    capacity: table.slots.len(),
                });
            };

            let generation = table.next_generation;
            table.next_generation += 1;
            table.slots[index] = Some(DeviceHandle {
                device: device.to_string(),
                state: HandleState::Idle,
                generation,
            });

            SlotTicket {
                table: self.table.clone(),
                index,
                generation,
                device: device.to_string(),
            }
        };

        let index = ticket.index();
        debug!("slot {} claimed for {}", index, device);
        // on failure the launcher has dropped the ticket, which frees the slot again
        self.launcher
            .launch(ticket)
            .map_err(|reason| PoolError::Launch {
                device: device.to_string(),
                reason,
            })?;
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// Keeps every ticket so the test decides when a session ends.
    #[derive(Default)]
    struct KeepTickets {
        tickets: Mutex<Vec<SlotTicket>>,
    }

    impl KeepTickets {
        fn finish(&self, device: &str) {
            self.tickets
                .lock()
                .unwrap()
                .retain(|ticket| ticket.device() != device);
        }
    }

    impl SessionLauncher for KeepTickets {
        fn launch(&self, ticket: SlotTicket) -> Result<(), String> {
            self.tickets.lock().unwrap().push(ticket);
            Ok(())
        }
    }

    struct RefuseLaunch;

    impl SessionLauncher for RefuseLaunch {
        fn launch(&self, _ticket: SlotTicket) -> Result<(), String> {
            Err("executor gone".to_string())
        }
    }

    fn devices<L: SessionLauncher>(pool: &DevicePool<L>) -> Vec<Option<(String, HandleState)>> {
        pool.snapshot()
            .into_iter()
            .map(|slot| slot.map(|handle| (handle.device, handle.state)))
            .collect()
    }

    #[test]
    fn excess_starts_fail_with_pool_full() {
        let pool = DevicePool::new(2, KeepTickets::default());

        assert_eq!(pool.try_start("/dev/hidraw0"), Ok(0));
        assert_eq!(pool.try_start("/dev/hidraw1"), Ok(1));
        let before = pool.snapshot();

        assert_eq!(
            pool.try_start("/dev/hidraw2"),
            Err(PoolError::PoolFull {
                device: "/dev/hidraw2".to_string(),
                capacity: 2
            })
        );
        assert_eq!(pool.snapshot(), before);
        assert_eq!(pool.launcher().tickets.lock().unwrap().len(), 2);
    }

    #[test]
    fn stopped_slot_is_reused() {
        let pool = DevicePool::new(2, KeepTickets::default());
        pool.try_start("/dev/hidraw0").unwrap();
        pool.try_start("/dev/hidraw1").unwrap();

        pool.launcher().finish("/dev/hidraw0");

        assert_eq!(pool.try_start("/dev/hidraw2"), Ok(0));
        assert_eq!(
            devices(&pool),
            vec![
                Some(("/dev/hidraw2".to_string(), HandleState::Idle)),
                Some(("/dev/hidraw1".to_string(), HandleState::Idle)),
            ]
        );
    }

    #[test]
    fn live_session_is_not_restarted() {
        let pool = DevicePool::new(4, KeepTickets::default());
        pool.try_start("/dev/hidraw0").unwrap();

        assert_eq!(
            pool.try_start("/dev/hidraw0"),
            Err(PoolError::AlreadyRunning {
                device: "/dev/hidraw0".to_string(),
                slot: 0
            })
        );

        pool.launcher().finish("/dev/hidraw0");
        assert_eq!(pool.try_start("/dev/hidraw0"), Ok(0));
    }

    #[test]
    fn session_states_reach_the_table() {
        let pool = DevicePool::new(1, KeepTickets::default());
        pool.try_start("/dev/hidraw0").unwrap();

        {
            let tickets = pool.launcher().tickets.lock().unwrap();
            tickets[0].set_session_state(SessionState::Opening);
        }
        assert_eq!(pool.snapshot()[0].as_ref().unwrap().state, HandleState::Running);

        {
            let tickets = pool.launcher().tickets.lock().unwrap();
            tickets[0].set_session_state(SessionState::Streaming);
            tickets[0].set_session_state(SessionState::Closed);
            // a closed session can not come back to life
            tickets[0].set_session_state(SessionState::Streaming);
        }
        assert_eq!(pool.snapshot()[0].as_ref().unwrap().state, HandleState::Stopped);
    }

    #[test]
    fn stale_ticket_does_not_free_new_occupant() {
        let pool = DevicePool::new(1, KeepTickets::default());
        pool.try_start("/dev/hidraw0").unwrap();

        let old = pool.launcher().tickets.lock().unwrap().remove(0);
        old.set_session_state(SessionState::Closed);
        assert_eq!(pool.try_start("/dev/hidraw1"), Ok(0));

        drop(old);

        let handle = pool.snapshot()[0].clone().unwrap();
        assert_eq!(handle.device, "/dev/hidraw1");
        assert_eq!(handle.state, HandleState::Idle);
    }

    #[test]
    fn failed_launch_frees_the_slot() {
        let pool = DevicePool::new(1, RefuseLaunch);

        assert!(matches!(
            pool.try_start("/dev/hidraw0"),
            Err(PoolError::Launch { .. })
        ));
        assert_eq!(
            pool.snapshot()[0].as_ref().map(|handle| handle.state),
            Some(HandleState::Stopped)
        );
    }

    #[test]
    fn concurrent_starts_respect_capacity() {
        let pool = Arc::new(DevicePool::new(4, KeepTickets::default()));

        let workers: Vec<_> = (0..16)
            .map(|i| {
                let pool = pool.clone();
                thread::spawn(move || pool.try_start(&format!("/dev/hidraw{i}")).is_ok())
            })
            .collect();
        let started = workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(started, 4);
        assert!(pool.snapshot().iter().all(Option::is_some));
    }
}
