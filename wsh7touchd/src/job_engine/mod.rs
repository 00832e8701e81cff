// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>
//! # Design: Async Per-Device Job Executor
//!
//! ## Overview
//! Every device session and the hot-plug monitor run as jobs on a single
//! executor thread.
//!
//! - The dispatcher routes jobs to per-device async loops or spawns them as
//!   background loops.
//! - Each device has its own unbounded job queue, so a session that is
//!   started again for the same node only begins after the previous one
//!   has ended.
//! - Loops are spawned lazily on the first job for their device.
//! - Closing the dispatcher cancels every task by dropping its handle.
//!
//! ```text
//!         +--------------------------------------+
//!         |            Global dispatcher         |
//!         +----------+---------------------------+
//!                    |                     |
//!                    v                     v
//!         +----------+-----------+  +-----------------+
//!         |  Per-device queues   |  | Background loop |
//!         +----+------+----+-----+  +-----------------+
//!              |           |               |
//!         +----v----+  +---v----+      +---v-----+
//!         | hidraw0 |  | hidraw3|      | monitor |
//!         | loop()  |  | loop() |      | loop()  |
//!         +---------+  +--------+      +---------+
//! ```

pub mod closure_job;
pub mod job;
