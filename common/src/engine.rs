use crate::{
    clock::LocalStamp,
    config::SchedulerConfig,
    device::{ActualState, DeviceCommand},
    schedule::Schedule,
    types::DesiredState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Schedule,
    Repair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineAction {
    Start(Trigger),
    Stop(Trigger),
}

impl EngineAction {
    pub fn command(self) -> DeviceCommand {
        match self {
            Self::Start(_) => DeviceCommand::StartStream,
            Self::Stop(_) => DeviceCommand::StopStream,
        }
    }

    pub fn trigger(self) -> Trigger {
        match self {
            Self::Start(trigger) | Self::Stop(trigger) => trigger,
        }
    }
}

/// Holds the desired stream state across ticks and decides which commands to send.
///
/// Schedule matching runs every tick; device polling and repair run on the slower
/// poll cadence measured from `last_poll_ms`. Any schedule transition pushes the
/// next poll out by a full interval so the device has time to react.
#[derive(Debug, Clone)]
pub struct StreamEngine {
    poll_interval_ms: u64,
    desired: DesiredState,
    actual: ActualState,
    last_poll_ms: u64,
    polled_once: bool,
}

impl StreamEngine {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            poll_interval_ms: config.poll_interval_ms,
            desired: DesiredState::Unset,
            actual: ActualState::Unknown,
            last_poll_ms: 0,
            polled_once: false,
        }
    }

    pub fn desired(&self) -> DesiredState {
        self.desired
    }

    pub fn actual(&self) -> ActualState {
        self.actual
    }

    pub fn last_poll_age_ms(&self, now_ms: u64) -> Option<u64> {
        self.polled_once
            .then(|| now_ms.saturating_sub(self.last_poll_ms))
    }

    /// Checks every event independently. A start needs today's date and the start
    /// minute; a stop needs only the stop minute, on any date.
    pub fn evaluate_schedule(
        &mut self,
        schedule: &Schedule,
        now: &LocalStamp,
        now_ms: u64,
    ) -> Vec<EngineAction> {
        let mut actions = Vec::new();

        for event in schedule.iter() {
            if event.starts_at(now) && self.desired != DesiredState::Streaming {
                self.desired = DesiredState::Streaming;
                self.last_poll_ms = now_ms;
                actions.push(EngineAction::Start(Trigger::Schedule));
            }

            if event.stops_at(now) && self.desired != DesiredState::Idle {
                self.desired = DesiredState::Idle;
                self.last_poll_ms = now_ms;
                actions.push(EngineAction::Stop(Trigger::Schedule));
            }
        }

        actions
    }

    pub fn poll_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_poll_ms) >= self.poll_interval_ms
    }

    /// Records a poll result and returns the repair command, if any. `Unknown` is
    /// neither streaming nor idle, so it always triggers a resend of the desired
    /// command. The start check runs first.
    pub fn record_poll(&mut self, actual: ActualState, now_ms: u64) -> Vec<EngineAction> {
        let mut actions = Vec::new();

        if self.desired == DesiredState::Streaming && actual != ActualState::Streaming {
            actions.push(EngineAction::Start(Trigger::Repair));
        } else if self.desired == DesiredState::Idle && actual != ActualState::Idle {
            actions.push(EngineAction::Stop(Trigger::Repair));
        }

        self.actual = actual;
        self.last_poll_ms = now_ms;
        self.polled_once = true;
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Event;
    use pretty_assertions::assert_eq;

    // 2024-01-01T08:00:00 in adjusted local time.
    const JAN_1_0800: i64 = 1_704_096_000;
    const DAY: i64 = 86_400;
    const HOUR: i64 = 3_600;

    fn engine() -> StreamEngine {
        StreamEngine::new(&SchedulerConfig::default())
    }

    fn at(epoch: i64) -> LocalStamp {
        LocalStamp::from_adjusted_epoch(epoch)
    }

    fn morning_show() -> Schedule {
        Schedule::new(vec![Event::new("2024-01-01", "08:00", "09:00")])
    }

    #[test]
    fn start_fires_once_per_window() {
        let mut engine = engine();
        let schedule = morning_show();

        let actions = engine.evaluate_schedule(&schedule, &at(JAN_1_0800), 1_000);
        assert_eq!(actions, vec![EngineAction::Start(Trigger::Schedule)]);
        assert_eq!(engine.desired(), DesiredState::Streaming);

        // Every tick within the same minute matches again but stays quiet.
        for second in 1..60 {
            let actions = engine.evaluate_schedule(
                &schedule,
                &at(JAN_1_0800 + second),
                1_000 + second as u64 * 1_000,
            );
            assert!(actions.is_empty(), "second {second} fired {actions:?}");
        }
    }

    #[test]
    fn overlapping_starts_send_one_command() {
        let mut engine = engine();
        let schedule = Schedule::new(vec![
            Event::new("2024-01-01", "08:00", "09:00"),
            Event::new("2024-01-01", "08:00", "10:30"),
        ]);

        let actions = engine.evaluate_schedule(&schedule, &at(JAN_1_0800), 1_000);
        assert_eq!(actions, vec![EngineAction::Start(Trigger::Schedule)]);
        assert_eq!(engine.desired(), DesiredState::Streaming);
    }

    #[test]
    fn start_needs_matching_date() {
        let mut engine = engine();
        let actions = engine.evaluate_schedule(&morning_show(), &at(JAN_1_0800 + DAY), 0);
        assert!(actions.is_empty());
        assert_eq!(engine.desired(), DesiredState::Unset);
    }

    #[test]
    fn stop_fires_on_any_date() {
        let mut engine = engine();

        // 09:00 on 2024-01-02, a day after the event's date.
        let actions =
            engine.evaluate_schedule(&morning_show(), &at(JAN_1_0800 + DAY + HOUR), 0);
        assert_eq!(actions, vec![EngineAction::Stop(Trigger::Schedule)]);
        assert_eq!(engine.desired(), DesiredState::Idle);

        let actions =
            engine.evaluate_schedule(&morning_show(), &at(JAN_1_0800 + DAY + HOUR + 5), 5_000);
        assert!(actions.is_empty());
    }

    #[test]
    fn another_events_stop_ends_a_running_stream() {
        let mut engine = engine();
        let schedule = Schedule::new(vec![
            Event::new("2024-01-01", "08:00", "12:00"),
            Event::new("2023-06-01", "07:00", "08:30"),
        ]);

        let _ = engine.evaluate_schedule(&schedule, &at(JAN_1_0800), 0);
        assert_eq!(engine.desired(), DesiredState::Streaming);

        let actions = engine.evaluate_schedule(&schedule, &at(JAN_1_0800 + 30 * 60), 1_800_000);
        assert_eq!(actions, vec![EngineAction::Stop(Trigger::Schedule)]);
        assert_eq!(engine.desired(), DesiredState::Idle);
    }

    #[test]
    fn start_and_stop_in_same_minute_both_fire_in_event_order() {
        let mut engine = engine();
        let schedule = Schedule::new(vec![Event::new("2024-01-01", "08:00", "08:00")]);

        let actions = engine.evaluate_schedule(&schedule, &at(JAN_1_0800), 0);
        assert_eq!(
            actions,
            vec![
                EngineAction::Start(Trigger::Schedule),
                EngineAction::Stop(Trigger::Schedule),
            ]
        );
        assert_eq!(engine.desired(), DesiredState::Idle);
    }

    #[test]
    fn repair_resends_start_until_streaming() {
        let mut engine = engine();
        let _ = engine.evaluate_schedule(&morning_show(), &at(JAN_1_0800), 10_000);

        assert!(!engine.poll_due(13_999));
        assert!(engine.poll_due(14_000));

        for poll in 1..=3u64 {
            let now_ms = 10_000 + poll * 4_000;
            assert!(engine.poll_due(now_ms));
            let actions = engine.record_poll(ActualState::Idle, now_ms);
            assert_eq!(actions, vec![EngineAction::Start(Trigger::Repair)]);
        }

        let actions = engine.record_poll(ActualState::Streaming, 26_000);
        assert!(actions.is_empty());
        assert_eq!(engine.actual(), ActualState::Streaming);
        assert_eq!(engine.desired(), DesiredState::Streaming);
    }

    #[test]
    fn repair_resends_stop_until_idle() {
        let mut engine = engine();
        let _ = engine.evaluate_schedule(&morning_show(), &at(JAN_1_0800 + HOUR), 0);

        let actions = engine.record_poll(ActualState::Streaming, 4_000);
        assert_eq!(actions, vec![EngineAction::Stop(Trigger::Repair)]);

        let actions = engine.record_poll(ActualState::Idle, 8_000);
        assert!(actions.is_empty());
    }

    #[test]
    fn unknown_poll_triggers_repair_for_either_desired_state() {
        let mut streaming = engine();
        let _ = streaming.evaluate_schedule(&morning_show(), &at(JAN_1_0800), 0);
        assert_eq!(
            streaming.record_poll(ActualState::Unknown, 4_000),
            vec![EngineAction::Start(Trigger::Repair)]
        );

        let mut idle = engine();
        let _ = idle.evaluate_schedule(&morning_show(), &at(JAN_1_0800 + HOUR), 0);
        assert_eq!(
            idle.record_poll(ActualState::Unknown, 4_000),
            vec![EngineAction::Stop(Trigger::Repair)]
        );
    }

    #[test]
    fn unset_desired_state_never_repairs() {
        let mut engine = engine();
        for actual in [ActualState::Streaming, ActualState::Idle, ActualState::Unknown] {
            assert!(engine.record_poll(actual, 4_000).is_empty());
        }
        assert_eq!(engine.desired(), DesiredState::Unset);
    }

    #[test]
    fn polling_does_not_change_desired_state() {
        let mut engine = engine();
        let _ = engine.evaluate_schedule(&morning_show(), &at(JAN_1_0800), 0);
        let _ = engine.record_poll(ActualState::Idle, 4_000);
        let _ = engine.record_poll(ActualState::Unknown, 8_000);
        assert_eq!(engine.desired(), DesiredState::Streaming);
    }

    #[test]
    fn first_poll_waits_one_interval_from_boot() {
        let engine = engine();
        assert!(!engine.poll_due(3_999));
        assert!(engine.poll_due(4_000));
        assert_eq!(engine.last_poll_age_ms(4_000), None);
    }

    #[test]
    fn schedule_transition_defers_next_poll() {
        let mut engine = engine();
        let _ = engine.record_poll(ActualState::Idle, 4_000);
        assert_eq!(engine.last_poll_age_ms(6_000), Some(2_000));

        let _ = engine.evaluate_schedule(&morning_show(), &at(JAN_1_0800), 7_000);
        assert!(!engine.poll_due(8_000));
        assert!(engine.poll_due(11_000));
    }

    #[test]
    fn actions_map_to_device_commands() {
        assert_eq!(
            EngineAction::Start(Trigger::Repair).command(),
            DeviceCommand::StartStream
        );
        assert_eq!(
            EngineAction::Stop(Trigger::Schedule).command(),
            DeviceCommand::StopStream
        );
        assert_eq!(EngineAction::Stop(Trigger::Repair).trigger(), Trigger::Repair);
    }
}
