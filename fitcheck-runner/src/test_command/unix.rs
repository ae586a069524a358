// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ChildAccumulator, TerminateChildResult};
use libc::{SIGKILL, SIGTERM};
use std::{os::unix::process::CommandExt, time::Duration};
use tokio::process::Child;

/// Makes the child the leader of a new process group, so that signals reach anything it spawns.
pub(crate) fn set_process_group(cmd: &mut std::process::Command) {
    cmd.process_group(0);
}

/// Sends SIGTERM to the child's process group, then SIGKILL once the grace period elapses.
///
/// Output keeps being collected while waiting.
pub(crate) async fn terminate_child(
    child: &mut Child,
    acc: &mut ChildAccumulator,
    grace_period: Duration,
) -> TerminateChildResult {
    let Some(pid) = child.id() else {
        return TerminateChildResult::Exited;
    };
    // A negative PID signals the whole process group.
    let pgid = -(pid as libc::pid_t);

    if grace_period.is_zero() {
        unsafe { libc::kill(pgid, SIGKILL) };
        return TerminateChildResult::Killed;
    }

    unsafe { libc::kill(pgid, SIGTERM) };

    let mut sleep = std::pin::pin!(tokio::time::sleep(grace_period));
    loop {
        tokio::select! {
            () = acc.fill_buf(), if !acc.fds.is_done() => {}
            _ = child.wait() => {
                // Anything left in the group still gets cleaned up.
                unsafe { libc::kill(pgid, SIGKILL) };
                break TerminateChildResult::Exited;
            }
            () = &mut sleep => {
                unsafe { libc::kill(pgid, SIGKILL) };
                break TerminateChildResult::Killed;
            }
        }
    }
}
