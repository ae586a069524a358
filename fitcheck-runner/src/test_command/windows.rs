// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ChildAccumulator, TerminateChildResult};
use std::time::Duration;
use tokio::process::Child;

// Process groups are a Unix concept.
pub(crate) fn set_process_group(_cmd: &mut std::process::Command) {}

/// Kills the child directly. Windows has no equivalent of SIGTERM for console programs, so the
/// grace period is not used.
pub(crate) async fn terminate_child(
    child: &mut Child,
    _acc: &mut ChildAccumulator,
    _grace_period: Duration,
) -> TerminateChildResult {
    if child.id().is_none() {
        return TerminateChildResult::Exited;
    }
    match child.start_kill() {
        Ok(()) => TerminateChildResult::Killed,
        // The child already exited.
        Err(_) => TerminateChildResult::Exited,
    }
}
