use crate::util::minutes_to_secs;
use log::debug;
use std::collections::VecDeque;

/// Lifecycle of a single countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
    ManuallyAdvanced,
}

/// Notifications queued by the timer and drained by its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Tick { remaining_secs: u64 },
    PauseChanged { paused: bool },
    Completed,
    Advanced,
    Exited,
}

/// Periodic one-second decrement. Dropping it is the cancellation.
#[derive(Debug)]
struct TickSchedule {
    ticks_fired: u64,
}

/// Counts a single duration down in whole seconds.
///
/// The timer does not read a clock: its owner delivers one [`tick`](Self::tick)
/// per elapsed second and calls [`poll`](Self::poll) once per loop turn. Events
/// are queued and handed out by [`drain_events`](Self::drain_events), so a
/// caller always gets the chance to look at the timer before anything fires.
#[derive(Debug)]
pub struct CountdownTimer {
    phase: TimerPhase,
    total_secs: i64,
    remaining_secs: i64,
    schedule: Option<TickSchedule>,
    completion_deferred: bool,
    events: VecDeque<TimerEvent>,
}

impl CountdownTimer {
    pub fn new() -> Self {
        Self {
            phase: TimerPhase::Idle,
            total_secs: 0,
            remaining_secs: 0,
            schedule: None,
            completion_deferred: false,
            events: VecDeque::new(),
        }
    }

    /// Begin counting down `duration_minutes`, replacing any countdown in progress.
    ///
    /// Durations that round to zero seconds (or are missing) complete on the
    /// next [`poll`](Self::poll) without a single tick.
    pub fn start(&mut self, duration_minutes: Option<f64>) {
        self.destroy();

        let secs = minutes_to_secs(duration_minutes);
        self.total_secs = secs.max(0);
        self.remaining_secs = self.total_secs;
        self.phase = TimerPhase::Running;

        if secs <= 0 {
            debug!("timer started with {secs}s; completing on next turn");
            self.completion_deferred = true;
        } else {
            debug!("timer started with {secs}s");
            self.schedule = Some(TickSchedule { ticks_fired: 0 });
        }
    }

    /// One turn of the owner's event loop. Flushes a deferred zero-length completion.
    pub fn poll(&mut self) {
        if self.completion_deferred {
            self.completion_deferred = false;
            self.phase = TimerPhase::Completed;
            self.events.push_back(TimerEvent::Completed);
        }
    }

    /// One second has elapsed
    pub fn tick(&mut self) {
        if self.phase != TimerPhase::Running {
            return;
        }
        let Some(schedule) = self.schedule.as_mut() else {
            return;
        };

        schedule.ticks_fired += 1;
        self.remaining_secs -= 1;

        if self.remaining_secs <= 0 {
            self.remaining_secs = 0;
            self.schedule = None;
            self.phase = TimerPhase::Completed;
            self.events.push_back(TimerEvent::Completed);
        } else {
            self.events.push_back(TimerEvent::Tick {
                remaining_secs: self.remaining_secs as u64,
            });
        }
    }

    /// Flip between running and paused. Returns false (and does nothing) when
    /// there is no active countdown, including a zero-length one that is only
    /// waiting for its completion to be flushed.
    pub fn toggle_pause(&mut self) -> bool {
        if self.completion_deferred {
            debug!("toggle_pause ignored: completion already due");
            return false;
        }
        let paused = match self.phase {
            TimerPhase::Running => true,
            TimerPhase::Paused => false,
            phase => {
                debug!("toggle_pause ignored: timer is {phase}");
                return false;
            }
        };

        self.phase = if paused {
            TimerPhase::Paused
        } else {
            TimerPhase::Running
        };
        self.events.push_back(TimerEvent::PauseChanged { paused });
        true
    }

    /// Skip the rest of the countdown. Returns false when there is nothing to skip.
    pub fn manual_advance(&mut self) -> bool {
        if !self.is_active() {
            debug!("manual_advance ignored: timer is {}", self.phase);
            return false;
        }

        self.cancel_schedule();
        self.phase = TimerPhase::ManuallyAdvanced;
        self.events.push_back(TimerEvent::Advanced);
        true
    }

    /// Hard abort, valid from any phase
    pub fn stop(&mut self) {
        self.cancel_schedule();
        self.phase = TimerPhase::Stopped;
        self.events.push_back(TimerEvent::Exited);
    }

    /// Release the schedule and anything still queued. Safe to repeat.
    pub fn destroy(&mut self) {
        self.cancel_schedule();
        self.events.clear();
    }

    pub fn drain_events(&mut self) -> Vec<TimerEvent> {
        self.events.drain(..).collect()
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs.max(0) as u64
    }

    /// Seconds actually counted down so far
    pub fn elapsed_secs(&self) -> u64 {
        (self.total_secs - self.remaining_secs).max(0) as u64
    }

    pub fn total_secs(&self) -> u64 {
        self.total_secs as u64
    }

    pub fn ticks_fired(&self) -> u64 {
        self.schedule.as_ref().map_or(0, |s| s.ticks_fired)
    }

    pub fn has_schedule(&self) -> bool {
        self.schedule.is_some()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, TimerPhase::Running | TimerPhase::Paused)
    }

    pub fn is_paused(&self) -> bool {
        self.phase == TimerPhase::Paused
    }

    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    fn cancel_schedule(&mut self) {
        self.schedule = None;
        self.completion_deferred = false;
    }
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    /// Tick until the timer stops emitting, returning every event seen
    fn run_to_end(timer: &mut CountdownTimer, max_ticks: usize) -> Vec<TimerEvent> {
        let mut seen = Vec::new();
        for _ in 0..max_ticks {
            timer.poll();
            timer.tick();
            let batch = timer.drain_events();
            let done = batch.contains(&TimerEvent::Completed);
            seen.extend(batch);
            if done {
                break;
            }
        }
        seen
    }

    fn count_ticks(events: &[TimerEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, TimerEvent::Tick { .. }))
            .count()
    }

    #[test]
    fn test_new_timer_is_idle() {
        let timer = CountdownTimer::new();
        assert_eq!(timer.phase(), TimerPhase::Idle);
        assert!(!timer.is_active());
        assert!(!timer.has_schedule());
    }

    #[test]
    fn test_zero_duration_completes_on_next_poll_not_synchronously() {
        for d in [0.0, -1.0, -0.5, 0.004] {
            let mut timer = CountdownTimer::new();
            timer.start(Some(d));

            assert!(timer.drain_events().is_empty(), "no synchronous completion for {d}");
            assert!(!timer.has_schedule());

            timer.poll();
            assert_eq!(timer.drain_events(), vec![TimerEvent::Completed]);
            assert_eq!(timer.phase(), TimerPhase::Completed);
        }
    }

    #[test]
    fn test_zero_duration_never_ticks() {
        let mut timer = CountdownTimer::new();
        timer.start(Some(0.0));
        timer.tick();
        timer.tick();
        assert!(timer.drain_events().is_empty());
        timer.poll();
        let events = timer.drain_events();
        assert_eq!(count_ticks(&events), 0);
    }

    #[test]
    fn test_zero_duration_cannot_be_paused_before_it_completes() {
        let mut timer = CountdownTimer::new();
        timer.start(Some(0.0));

        assert!(!timer.toggle_pause());
        assert!(!timer.is_paused());

        timer.poll();
        assert_eq!(timer.drain_events(), vec![TimerEvent::Completed]);
        assert_eq!(timer.phase(), TimerPhase::Completed);
    }

    #[test]
    fn test_missing_duration_counts_as_zero() {
        let mut timer = CountdownTimer::new();
        timer.start(None);
        timer.poll();
        assert_eq!(timer.drain_events(), vec![TimerEvent::Completed]);

        let mut timer = CountdownTimer::new();
        timer.start(Some(f64::NAN));
        timer.poll();
        assert_eq!(timer.drain_events(), vec![TimerEvent::Completed]);
    }

    #[test]
    fn test_tick_count_matches_rounded_duration() {
        for (minutes, secs) in [(0.01, 1usize), (0.05, 3), (0.1, 6), (0.5, 30), (1.0, 60)] {
            let mut timer = CountdownTimer::new();
            timer.start(Some(minutes));
            let events = run_to_end(&mut timer, 1000);

            assert_eq!(count_ticks(&events), secs - 1, "ticks for {minutes} min");
            let completions = events.iter().filter(|e| **e == TimerEvent::Completed).count();
            assert_eq!(completions, 1);
            assert_eq!(events.last(), Some(&TimerEvent::Completed));
        }
    }

    #[test]
    fn test_ticks_carry_remaining_seconds() {
        let mut timer = CountdownTimer::new();
        timer.start(Some(0.05));
        let events = run_to_end(&mut timer, 10);
        assert_eq!(
            events,
            vec![
                TimerEvent::Tick { remaining_secs: 2 },
                TimerEvent::Tick { remaining_secs: 1 },
                TimerEvent::Completed,
            ]
        );
    }

    #[test]
    fn test_no_events_after_completion() {
        let mut timer = CountdownTimer::new();
        timer.start(Some(0.01));
        timer.tick();
        assert_eq!(timer.drain_events(), vec![TimerEvent::Completed]);
        timer.tick();
        timer.poll();
        assert!(timer.drain_events().is_empty());
        assert!(!timer.has_schedule());
    }

    #[test]
    fn test_pause_holds_remaining_time() {
        let mut timer = CountdownTimer::new();
        timer.start(Some(0.1));
        timer.tick();
        timer.tick();
        timer.drain_events();
        let before = timer.remaining_secs();

        assert!(timer.toggle_pause());
        assert!(timer.is_paused());
        for _ in 0..10 {
            timer.tick();
        }
        assert_eq!(timer.remaining_secs(), before);
        assert_eq!(
            timer.drain_events(),
            vec![TimerEvent::PauseChanged { paused: true }]
        );

        assert!(timer.toggle_pause());
        assert!(!timer.is_paused());
        assert_eq!(timer.remaining_secs(), before);
        timer.tick();
        assert_eq!(
            timer.drain_events(),
            vec![
                TimerEvent::PauseChanged { paused: false },
                TimerEvent::Tick {
                    remaining_secs: before - 1
                },
            ]
        );
    }

    #[test]
    fn test_toggle_pause_without_countdown_is_ignored() {
        let mut timer = CountdownTimer::new();
        assert!(!timer.toggle_pause());
        assert_eq!(timer.phase(), TimerPhase::Idle);

        timer.start(Some(0.01));
        timer.tick();
        timer.drain_events();
        assert!(!timer.toggle_pause());
        assert_eq!(timer.phase(), TimerPhase::Completed);
        assert!(timer.drain_events().is_empty());
    }

    #[test]
    fn test_manual_advance_cancels_schedule() {
        let mut timer = CountdownTimer::new();
        timer.start(Some(1.0));
        timer.tick();
        timer.drain_events();

        assert!(timer.manual_advance());
        assert_eq!(timer.phase(), TimerPhase::ManuallyAdvanced);
        assert!(!timer.has_schedule());
        assert_eq!(timer.drain_events(), vec![TimerEvent::Advanced]);

        timer.tick();
        assert!(timer.drain_events().is_empty());
        assert_eq!(timer.elapsed_secs(), 1);
    }

    #[test]
    fn test_manual_advance_from_paused() {
        let mut timer = CountdownTimer::new();
        timer.start(Some(1.0));
        timer.toggle_pause();
        timer.drain_events();
        assert!(timer.manual_advance());
        assert_eq!(timer.drain_events(), vec![TimerEvent::Advanced]);
    }

    #[test]
    fn test_manual_advance_when_inactive_is_ignored() {
        let mut timer = CountdownTimer::new();
        assert!(!timer.manual_advance());
        assert!(timer.drain_events().is_empty());

        timer.start(Some(1.0));
        timer.manual_advance();
        timer.drain_events();
        assert!(!timer.manual_advance());
        assert!(timer.drain_events().is_empty());
    }

    #[test]
    fn test_manual_advance_beats_deferred_completion() {
        let mut timer = CountdownTimer::new();
        timer.start(Some(0.0));
        assert!(timer.manual_advance());
        timer.poll();
        assert_eq!(timer.drain_events(), vec![TimerEvent::Advanced]);
    }

    #[test]
    fn test_stop_from_any_phase() {
        let mut timer = CountdownTimer::new();
        timer.stop();
        assert_eq!(timer.phase(), TimerPhase::Stopped);
        assert_eq!(timer.drain_events(), vec![TimerEvent::Exited]);

        timer.start(Some(1.0));
        timer.toggle_pause();
        timer.drain_events();
        timer.stop();
        assert_eq!(timer.phase(), TimerPhase::Stopped);
        assert!(!timer.has_schedule());
        assert_eq!(timer.drain_events(), vec![TimerEvent::Exited]);
        timer.tick();
        assert!(timer.drain_events().is_empty());
    }

    #[test]
    fn test_restart_discards_previous_countdown() {
        let mut timer = CountdownTimer::new();
        timer.start(Some(1.0));
        timer.tick();
        timer.tick();

        timer.start(Some(0.05));
        assert!(timer.drain_events().is_empty());
        assert_eq!(timer.remaining_secs(), 3);
        assert_eq!(timer.ticks_fired(), 0);

        timer.tick();
        assert_matches!(
            timer.drain_events().as_slice(),
            [TimerEvent::Tick { remaining_secs: 2 }]
        );
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut timer = CountdownTimer::new();
        timer.start(Some(1.0));
        timer.tick();
        timer.destroy();
        timer.destroy();

        assert!(!timer.has_schedule());
        assert!(timer.drain_events().is_empty());
        timer.tick();
        timer.poll();
        assert!(timer.drain_events().is_empty());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(TimerPhase::ManuallyAdvanced.to_string(), "manually_advanced");
        assert_eq!(TimerPhase::Running.to_string(), "running");
    }
}
