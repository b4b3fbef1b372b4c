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
use tracing::{debug, info, warn};

/// Default priority for the render thread when SNDMIX_THREAD_PRIORITY is unset.
const DEFAULT_RENDER_THREAD_PRIORITY: u8 = 70;

fn parse_priority(value: Option<&str>) -> Option<ThreadPriorityValue> {
    let n = value?.trim().parse::<u8>().ok()?;
    if n >= 100 {
        return None;
    }
    ThreadPriorityValue::try_from(n).ok()
}

/// Reads SNDMIX_THREAD_PRIORITY (0-99) once, before the render thread starts.
pub fn render_thread_priority() -> Option<ThreadPriorityValue> {
    let configured = std::env::var("SNDMIX_THREAD_PRIORITY").ok();
    parse_priority(configured.as_deref())
        .or_else(|| ThreadPriorityValue::try_from(DEFAULT_RENDER_THREAD_PRIORITY).ok())
}

fn is_truthy(value: Option<&str>) -> bool {
    value
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Whether to attempt RT (SCHED_FIFO) scheduling for the render thread.
/// Enabled unless SNDMIX_DISABLE_RT_AUDIO is set.
pub fn rt_audio_enabled() -> bool {
    !is_truthy(std::env::var("SNDMIX_DISABLE_RT_AUDIO").ok().as_deref())
}

/// Raises the calling thread's priority. Failures are logged and otherwise ignored.
pub fn configure_render_thread_priority(priority: Option<ThreadPriorityValue>, rt_audio: bool) {
    let Some(priority) = priority else {
        return;
    };
    let tp = ThreadPriority::Crossplatform(priority);
    if let Err(e) = set_current_thread_priority(tp) {
        debug!(error = ?e, "Unable to raise render thread priority");
    }

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        let tid = thread_native_id();
        match set_thread_priority_and_policy(
            tid,
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => {
                info!("Enabled RT SCHED_FIFO for render thread");
            }
            Err(e) => {
                warn!(error = %e, "Failed to set RT SCHED_FIFO for render thread");
            }
        }
    }

    #[cfg(not(unix))]
    let _ = rt_audio;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_priority() {
        assert_eq!(
            parse_priority(Some("42")),
            ThreadPriorityValue::try_from(42u8).ok()
        );
        assert_eq!(
            parse_priority(Some(" 7 ")),
            ThreadPriorityValue::try_from(7u8).ok()
        );
        assert!(parse_priority(Some("100")).is_none());
        assert!(parse_priority(Some("high")).is_none());
        assert!(parse_priority(None).is_none());
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy(Some("1")));
        assert!(is_truthy(Some("TRUE")));
        assert!(is_truthy(Some("on")));
        assert!(!is_truthy(Some("0")));
        assert!(!is_truthy(None));
    }
}
