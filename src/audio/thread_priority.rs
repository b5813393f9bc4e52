// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Priority of the engine thread when DRUMTRACK_THREAD_PRIORITY is unset.
const DEFAULT_ENGINE_THREAD_PRIORITY: u8 = 70;

const PRIORITY_VAR: &str = "DRUMTRACK_THREAD_PRIORITY";
const DISABLE_RT_VAR: &str = "DRUMTRACK_DISABLE_RT_AUDIO";

/// Reads DRUMTRACK_THREAD_PRIORITY (0-99), falling back to the default.
pub(super) fn engine_thread_priority() -> ThreadPriority {
    let value = std::env::var(PRIORITY_VAR)
        .ok()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_ENGINE_THREAD_PRIORITY);
    match ThreadPriorityValue::try_from(value) {
        Ok(value) => ThreadPriority::Crossplatform(value),
        Err(_) => ThreadPriority::Max,
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Whether the engine thread should try SCHED_FIFO. Opt out with
/// DRUMTRACK_DISABLE_RT_AUDIO=1.
pub(super) fn rt_audio_enabled() -> bool {
    !env_flag(DISABLE_RT_VAR)
}

/// Raises the calling thread's priority. Failures are logged and ignored.
pub(super) fn configure_engine_thread(priority: ThreadPriority, rt_audio: bool) {
    if let Err(e) = set_current_thread_priority(priority) {
        warn!(err = ?e, "Failed to raise engine thread priority");
    }

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        match set_thread_priority_and_policy(
            thread_native_id(),
            priority,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for engine thread"),
            Err(e) => warn!(err = %e, "Failed to set RT SCHED_FIFO for engine thread"),
        }
    }
    #[cfg(not(unix))]
    let _ = rt_audio;
}
