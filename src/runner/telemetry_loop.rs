//! The telemetry state machine
//!
//! One packet is read per tick. Outside a stage run the loop waits for a
//! usable frame, identifies the stage from it and loads that stage's
//! pacenotes; during a run it converts the car's distance into calls.
//!
//! ```text
//! AwaitingPacket ──▶ Detecting ──▶ LoadingPacenotes ──▶ Streaming
//!       ▲                 │ (same stage)                    │
//!       │                 └────────────────────────────────▶│
//!       └──────────── Finished / clock reset / reset ◀──────┘
//! ```
//!
//! An empty read ends the loop with [`LoopExit::ConnectionLost`], a stop
//! request with [`LoopExit::Stopped`].

use crate::audio::CueDispatcher;
use crate::constants::INITIAL_PREVIOUS_DISTANCE;
use crate::control::{ControlUpdate, LoopControls, LoopEvent};
use crate::error::PacenoteError;
use crate::pacenotes::{
    PacenoteSchedule, PacenoteSet, PacenoteStore, Trigger, COUNTDOWN_CUE, WRONG_WAY_CUE,
};
use crate::runner::state::{LoopExit, LoopState, RestartDetector, StreamEnd};
use crate::stages::{StageIdentifier, StageRef, StageTable};
use crate::telemetry::{PacketSource, Recv, TelemetryFrame, RECV_BUFFER_SIZE};

/// Telemetry loop over any [`PacketSource`]
pub struct TelemetryLoop<S> {
    source: S,
    stages: StageTable,
    identifier: StageIdentifier,
    store: Box<dyn PacenoteStore>,
    schedule: PacenoteSchedule,
    dispatcher: CueDispatcher,
    controls: LoopControls,
    delay_offset: i32,
    countdown: bool,
    /// Cleared once the countdown played, set again once the clock ran
    countdown_armed: bool,
    restart: RestartDetector,
    buf: [u8; RECV_BUFFER_SIZE],
}

impl<S: PacketSource> TelemetryLoop<S> {
    pub fn new(
        source: S,
        stages: StageTable,
        store: Box<dyn PacenoteStore>,
        dispatcher: CueDispatcher,
        controls: LoopControls,
        delay_offset: i32,
        countdown: bool,
    ) -> Self {
        Self {
            source,
            stages,
            identifier: StageIdentifier::new(),
            store,
            schedule: PacenoteSchedule::default(),
            dispatcher,
            controls,
            delay_offset,
            countdown,
            countdown_armed: true,
            restart: RestartDetector::new(),
            buf: [0u8; RECV_BUFFER_SIZE],
        }
    }

    /// Stage the loop last identified
    pub fn current_stage(&self) -> Option<&StageRef> {
        self.identifier.current()
    }

    pub fn delay_offset(&self) -> i32 {
        self.delay_offset
    }

    /// Run until the connection drops or a stop is requested
    pub fn run(mut self) -> LoopExit {
        tracing::info!("Telemetry loop started (delay {} m)", self.delay_offset);

        let mut state = LoopState::AwaitingPacket;
        loop {
            state = match state {
                LoopState::AwaitingPacket => match self.await_packet() {
                    Ok(frame) => LoopState::Detecting(frame),
                    Err(exit) => LoopState::Exited(exit),
                },
                LoopState::Detecting(frame) => self.detect(&frame),
                LoopState::LoadingPacenotes(stage) => {
                    self.load_pacenotes(&stage);
                    LoopState::Streaming
                }
                LoopState::Streaming => match self.stream() {
                    StreamEnd::Finished => LoopState::Finished,
                    StreamEnd::ClockStopped | StreamEnd::Reset => LoopState::AwaitingPacket,
                    StreamEnd::Exit(exit) => LoopState::Exited(exit),
                },
                LoopState::Finished => {
                    tracing::info!("Stage finished");
                    LoopState::AwaitingPacket
                }
                LoopState::Exited(exit) => {
                    match exit {
                        LoopExit::ConnectionLost => {
                            tracing::warn!("Telemetry connection lost");
                            self.controls.notify(LoopEvent::ConnectionLost);
                        }
                        LoopExit::Stopped => {
                            tracing::info!("Telemetry loop stopped");
                            self.controls.notify(LoopEvent::Stopped);
                        }
                    }
                    return exit;
                }
            };
        }
    }

    /// Apply pending control updates; stop and reset are left to the caller
    fn apply_controls(&mut self) -> ControlUpdate {
        let mut update = self.controls.drain();

        if let Some(delay) = update.delay.take() {
            tracing::info!("Delay offset set to {} m", delay);
            self.delay_offset = delay;
        }
        if let Some(gain) = update.gain.take() {
            tracing::debug!("Gain set to {} dB", gain);
            self.dispatcher.set_gain(gain);
        }
        if let Some(entries) = update.pacenotes.take() {
            tracing::info!("Pacenotes replaced ({} entries)", entries.len());
            self.schedule.replace_entries(entries);
        }

        update
    }

    /// Read one packet. `Ok(None)` means nothing usable arrived this time.
    fn receive(&mut self) -> Result<Option<TelemetryFrame>, LoopExit> {
        match self.source.recv(&mut self.buf) {
            Ok(Recv::TimedOut) => Ok(None),
            Ok(Recv::Packet(0)) => Err(LoopExit::ConnectionLost),
            Ok(Recv::Packet(len)) => match TelemetryFrame::decode(&self.buf[..len]) {
                Ok(frame) => Ok(Some(frame)),
                Err(e) => {
                    tracing::warn!("Dropping packet: {}", e);
                    Ok(None)
                }
            },
            Err(e) => {
                tracing::error!("Telemetry receive failed: {}", e);
                Err(LoopExit::ConnectionLost)
            }
        }
    }

    fn await_packet(&mut self) -> Result<TelemetryFrame, LoopExit> {
        loop {
            // A reset outside a stage run has nothing to end
            if self.apply_controls().stop {
                return Err(LoopExit::Stopped);
            }

            let Some(frame) = self.receive()? else {
                continue;
            };
            if frame.is_transitional() {
                tracing::trace!("Skipping transitional frame");
                continue;
            }
            return Ok(frame);
        }
    }

    fn detect(&mut self, frame: &TelemetryFrame) -> LoopState {
        match self.identifier.observe(frame, &self.stages) {
            Some(change) => {
                tracing::info!(
                    "Stage changed: {} -> {}",
                    change
                        .old
                        .as_ref()
                        .map_or_else(|| "none".to_string(), ToString::to_string),
                    change.new
                );
                self.controls.notify(LoopEvent::StageChanged {
                    name: change.new.name.clone(),
                    folder: change.new.folder.clone(),
                });
                LoopState::LoadingPacenotes(change.new)
            }
            None => LoopState::Streaming,
        }
    }

    fn load_pacenotes(&mut self, stage: &StageRef) {
        let entries = match self.store.load(stage) {
            Ok(entries) => {
                tracing::info!("Loaded {} pacenotes for {}", entries.len(), stage);
                self.controls.notify(LoopEvent::PacenotesLoaded {
                    count: entries.len(),
                });
                entries
            }
            Err(PacenoteError::FileMissing(path)) => {
                tracing::warn!("No pacenote file at {}", path.display());
                self.controls.notify(LoopEvent::PacenoteFileMissing {
                    stage: stage.to_string(),
                });
                PacenoteSet::new()
            }
            Err(e) => {
                tracing::warn!("Failed to load pacenotes for {}: {}", stage, e);
                self.controls.notify(LoopEvent::PacenoteLoadFailed {
                    stage: stage.to_string(),
                    reason: e.to_string(),
                });
                PacenoteSet::new()
            }
        };
        self.schedule.replace_entries(entries);
    }

    fn play_countdown(&mut self) {
        if self.countdown && self.countdown_armed {
            self.countdown_armed = false;
            self.dispatcher.play(COUNTDOWN_CUE);
        }
    }

    fn stream(&mut self) -> StreamEnd {
        tracing::debug!("Streaming pacenotes");
        self.play_countdown();
        self.restart = RestartDetector::new();

        let mut previous = INITIAL_PREVIOUS_DISTANCE;
        let mut first_tick = true;

        loop {
            let update = self.apply_controls();
            if update.stop {
                return StreamEnd::Exit(LoopExit::Stopped);
            }
            if update.reset {
                tracing::info!("Reset requested");
                return StreamEnd::Reset;
            }

            let frame = match self.receive() {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(exit) => return StreamEnd::Exit(exit),
            };

            let paused = self.restart.observe(&frame);
            self.controls.notify(LoopEvent::PauseState { paused });

            if !frame.clock_running() {
                if first_tick {
                    first_tick = false;
                    continue;
                }
                tracing::debug!("Stage clock reset");
                return StreamEnd::ClockStopped;
            }
            first_tick = false;
            self.countdown_armed = true;

            if frame.finished() {
                return StreamEnd::Finished;
            }

            let current = frame.distance;
            if frame.current_lap == 0 {
                self.controls.notify(LoopEvent::DistanceProgress { current, previous });

                match self.schedule.tick(current, previous, self.delay_offset) {
                    Trigger::Pacenotes(cues) => {
                        for cue in cues {
                            tracing::debug!("{} m: {}", current, cue);
                            self.dispatcher.play(&cue);
                        }
                    }
                    Trigger::WrongWay => {
                        tracing::debug!("Wrong way at {} m (was {} m)", current, previous);
                        self.dispatcher.play(WRONG_WAY_CUE);
                    }
                    Trigger::Idle => {}
                }
            }
            previous = current;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::playback::RecordingSink;
    use crate::audio::{SoundBank, SoundClip};
    use crate::control::{self, ControlHandle};
    use crate::error::NetworkError;
    use crate::telemetry::frame::PacketBuilder;
    use std::collections::{HashMap, VecDeque};

    const COL_DE_TURINI: f32 = 1500.0;

    enum Step {
        Packet(Vec<u8>),
        Timeout,
        Fail,
        Run(Box<dyn FnOnce() + Send>),
    }

    /// Replays scripted packets; an exhausted script reads as a closed connection
    #[derive(Default)]
    struct ScriptedSource {
        steps: VecDeque<Step>,
    }

    impl ScriptedSource {
        fn packet(mut self, builder: PacketBuilder) -> Self {
            self.steps.push_back(Step::Packet(builder.build()));
            self
        }

        fn raw(mut self, bytes: Vec<u8>) -> Self {
            self.steps.push_back(Step::Packet(bytes));
            self
        }

        fn timeout(mut self) -> Self {
            self.steps.push_back(Step::Timeout);
            self
        }

        fn fail(mut self) -> Self {
            self.steps.push_back(Step::Fail);
            self
        }

        fn then(mut self, action: impl FnOnce() + Send + 'static) -> Self {
            self.steps.push_back(Step::Run(Box::new(action)));
            self
        }

        /// Running-clock frames at each distance
        fn drive(mut self, distances: &[i32]) -> Self {
            for &d in distances {
                self = self.packet(running(d));
            }
            self
        }
    }

    impl PacketSource for ScriptedSource {
        fn recv(&mut self, buf: &mut [u8]) -> Result<Recv, NetworkError> {
            loop {
                match self.steps.pop_front() {
                    None => return Ok(Recv::Packet(0)),
                    Some(Step::Packet(bytes)) => {
                        buf[..bytes.len()].copy_from_slice(&bytes);
                        return Ok(Recv::Packet(bytes.len()));
                    }
                    Some(Step::Timeout) => return Ok(Recv::TimedOut),
                    Some(Step::Fail) => {
                        return Err(NetworkError::ReceiveFailed("connection reset".into()))
                    }
                    Some(Step::Run(action)) => action(),
                }
            }
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        files: HashMap<StageRef, PacenoteSet>,
    }

    impl PacenoteStore for MemoryStore {
        fn load(&self, stage: &StageRef) -> Result<PacenoteSet, PacenoteError> {
            self.files
                .get(stage)
                .cloned()
                .ok_or_else(|| PacenoteError::FileMissing(format!("{}.txt", stage.name).into()))
        }
    }

    fn turini() -> StageRef {
        StageRef::new("col_de_turini", "night")
    }

    fn table() -> StageTable {
        let mut table = StageTable::new();
        table.insert(COL_DE_TURINI as f64, turini());
        table
    }

    fn store(text: &str) -> Box<dyn PacenoteStore> {
        let mut files = HashMap::new();
        files.insert(turini(), PacenoteSet::parse(text).unwrap());
        Box::new(MemoryStore { files })
    }

    fn bank() -> SoundBank {
        let mut bank = SoundBank::new();
        for id in ["left3", "right2", "caution", "wrong_way", "countdown_start"] {
            bank.insert(id, SoundClip::new(vec![0.0; 48], 48000, 1));
        }
        bank
    }

    /// Frame seen at the start line before the clock runs
    fn staged() -> PacketBuilder {
        PacketBuilder {
            total_time: 1.0,
            total_laps: 1.0,
            stage_length: COL_DE_TURINI,
            ..Default::default()
        }
    }

    fn running(distance: i32) -> PacketBuilder {
        PacketBuilder {
            total_time: 10.0 + distance as f32,
            lap_time: 5.0 + distance as f32,
            distance: distance as f32,
            total_laps: 1.0,
            stage_length: COL_DE_TURINI,
            ..Default::default()
        }
    }

    fn finish() -> PacketBuilder {
        PacketBuilder {
            current_lap: 1.0,
            ..running(1500)
        }
    }

    struct Harness {
        handle: ControlHandle,
        sink: RecordingSink,
        exit: LoopExit,
    }

    impl Harness {
        fn events(&self) -> Vec<LoopEvent> {
            self.handle.events().try_iter().collect()
        }
    }

    fn run_with(
        source: ScriptedSource,
        store: Box<dyn PacenoteStore>,
        delay: i32,
        countdown: bool,
        setup: impl FnOnce(&ControlHandle),
    ) -> Harness {
        let (handle, controls) = control::channel();
        setup(&handle);
        let sink = RecordingSink::default();
        let dispatcher =
            CueDispatcher::new(bank(), Box::new(sink.clone()), 5.0, controls.notifier().clone());
        let telemetry = TelemetryLoop::new(source, table(), store, dispatcher, controls, delay, countdown);
        let exit = telemetry.run();
        Harness { handle, sink, exit }
    }

    fn run(source: ScriptedSource, notes: &str, delay: i32) -> Harness {
        run_with(source, store(notes), delay, false, |_| {})
    }

    #[test]
    fn test_calls_turini_notes_early() {
        let source = ScriptedSource::default()
            .packet(staged())
            .drive(&[0, 10, 20, 25, 26, 40, 60, 61])
            .packet(finish());

        let harness = run(source, "50,left3\n120,right2 caution\n", 100);

        assert_eq!(harness.exit, LoopExit::ConnectionLost);
        assert_eq!(harness.sink.identifiers(), vec!["left3", "right2", "caution"]);

        let events = harness.events();
        assert!(events.contains(&LoopEvent::StageChanged {
            name: "col_de_turini".into(),
            folder: "night".into(),
        }));
        assert!(events.contains(&LoopEvent::PacenotesLoaded { count: 2 }));
        assert!(events.contains(&LoopEvent::DistanceProgress {
            current: 0,
            previous: -20
        }));
        assert_eq!(events.last(), Some(&LoopEvent::ConnectionLost));
    }

    #[test]
    fn test_offset_regime_past_delay() {
        let source = ScriptedSource::default()
            .packet(staged())
            .drive(&[100, 149, 150, 151, 250]);

        let harness = run(source, "250,left3\n350,caution\n", 100);
        assert_eq!(harness.sink.identifiers(), vec!["left3", "caution"]);
    }

    #[test]
    fn test_wrong_way() {
        let source = ScriptedSource::default()
            .packet(staged())
            .drive(&[100, 60]);

        let harness = run(source, "120,right2\n", 100);
        assert_eq!(harness.sink.identifiers(), vec!["wrong_way"]);
    }

    #[test]
    fn test_stationary_car_repeats_nothing() {
        let source = ScriptedSource::default()
            .packet(staged())
            .drive(&[24, 25, 25, 25]);

        let harness = run(source, "50,left3\n", 100);
        assert_eq!(harness.sink.identifiers(), vec!["left3"]);
    }

    #[test]
    fn test_identical_effective_distances_both_fire() {
        let source = ScriptedSource::default()
            .packet(staged())
            .drive(&[10, 25]);

        // 49 and 50 both compress to 25
        let harness = run(source, "49,left3\n50,caution\n", 100);
        assert_eq!(harness.sink.identifiers(), vec!["left3", "caution"]);
    }

    #[test]
    fn test_missing_sound_does_not_stop_stream() {
        let source = ScriptedSource::default()
            .packet(staged())
            .drive(&[10, 25, 60]);

        let harness = run(source, "50,hairpin left3\n120,right2\n", 100);
        assert_eq!(harness.sink.identifiers(), vec!["left3", "right2"]);
        assert!(harness.events().contains(&LoopEvent::MissingSound {
            identifier: "hairpin".into()
        }));
    }

    #[test]
    fn test_missing_pacenote_file_streams_without_notes() {
        let source = ScriptedSource::default()
            .packet(staged())
            .drive(&[10, 25, 60]);

        let harness = run_with(source, Box::<MemoryStore>::default(), 100, false, |_| {});
        assert!(harness.sink.identifiers().is_empty());

        let events = harness.events();
        assert!(events.contains(&LoopEvent::PacenoteFileMissing {
            stage: "col_de_turini/night".into()
        }));
        assert!(events.contains(&LoopEvent::DistanceProgress {
            current: 60,
            previous: 25
        }));
    }

    #[test]
    fn test_unknown_stage_streams_with_empty_notes() {
        let source = ScriptedSource::default()
            .packet(PacketBuilder {
                stage_length: 4321.0,
                ..staged()
            })
            .drive(&[10, 25]);

        let harness = run(source, "50,left3\n", 100);
        assert!(harness.sink.identifiers().is_empty());
        assert!(!harness
            .events()
            .iter()
            .any(|e| matches!(e, LoopEvent::StageChanged { .. })));
    }

    #[test]
    fn test_replaced_pacenotes_apply_mid_stage() {
        let (handle, controls) = control::channel();
        let poster = handle.clone();
        let source = ScriptedSource::default()
            .packet(staged())
            .drive(&[10])
            .then(move || poster.replace_pacenotes(PacenoteSet::parse("60,caution\n").unwrap()))
            // posted during this read, applied from the next tick on
            .drive(&[20, 25, 30]);

        let sink = RecordingSink::default();
        let dispatcher =
            CueDispatcher::new(bank(), Box::new(sink.clone()), 0.0, controls.notifier().clone());
        let exit = TelemetryLoop::new(source, table(), store("50,left3\n"), dispatcher, controls, 100, false)
            .run();

        assert_eq!(exit, LoopExit::ConnectionLost);
        assert_eq!(sink.identifiers(), vec!["caution"]);
    }

    #[test]
    fn test_delay_change_takes_effect_next_tick() {
        let (handle, controls) = control::channel();
        let poster = handle.clone();
        let source = ScriptedSource::default()
            .packet(staged())
            .drive(&[210])
            .then(move || poster.set_delay(100))
            .drive(&[220, 250]);

        let sink = RecordingSink::default();
        let dispatcher =
            CueDispatcher::new(bank(), Box::new(sink.clone()), 0.0, controls.notifier().clone());
        let telemetry = TelemetryLoop::new(source, table(), store("350,left3\n"), dispatcher, controls, 200, false);
        telemetry.run();

        // 350 - 100 = 250; the old offset put it at 150
        assert_eq!(sink.identifiers(), vec!["left3"]);
    }

    #[test]
    fn test_reset_restarts_stage_run() {
        let (handle, controls) = control::channel();
        let poster = handle.clone();
        let source = ScriptedSource::default()
            .packet(staged())
            .drive(&[24, 25])
            .then(move || poster.reset())
            .timeout()
            // consumed while awaiting, then streaming restarts from -20
            .packet(running(25))
            .drive(&[25]);

        let sink = RecordingSink::default();
        let dispatcher =
            CueDispatcher::new(bank(), Box::new(sink.clone()), 0.0, controls.notifier().clone());
        TelemetryLoop::new(source, table(), store("50,left3\n"), dispatcher, controls, 100, false).run();

        assert_eq!(sink.identifiers(), vec!["left3", "left3"]);
    }

    #[test]
    fn test_stop_request_ends_loop() {
        let (handle, controls) = control::channel();
        let poster = handle.clone();
        let source = ScriptedSource::default()
            .packet(staged())
            .drive(&[10])
            .then(move || poster.stop())
            .timeout()
            .drive(&[25]);

        let sink = RecordingSink::default();
        let dispatcher =
            CueDispatcher::new(bank(), Box::new(sink.clone()), 0.0, controls.notifier().clone());
        let exit = TelemetryLoop::new(source, table(), store("50,left3\n"), dispatcher, controls, 100, false)
            .run();

        assert_eq!(exit, LoopExit::Stopped);
        assert!(sink.identifiers().is_empty());
        assert_eq!(handle.events().try_iter().last(), Some(LoopEvent::Stopped));
    }

    #[test]
    fn test_stop_while_waiting_for_traffic() {
        let source = ScriptedSource::default().timeout().timeout();
        let harness = run_with(source, store(""), 100, false, |handle| handle.stop());
        assert_eq!(harness.exit, LoopExit::Stopped);
    }

    #[test]
    fn test_receive_error_ends_loop() {
        let source = ScriptedSource::default().packet(staged()).drive(&[10]).fail();
        let harness = run(source, "", 100);
        assert_eq!(harness.exit, LoopExit::ConnectionLost);
    }

    #[test]
    fn test_malformed_and_transitional_packets_skipped() {
        let source = ScriptedSource::default()
            .raw(vec![0u8; 16])
            .packet(PacketBuilder {
                total_time: 0.0,
                current_lap: 1.0,
                ..staged()
            })
            .packet(staged())
            .raw(vec![1u8; 40])
            .drive(&[10, 25]);

        let harness = run(source, "50,left3\n", 100);
        assert_eq!(harness.sink.identifiers(), vec!["left3"]);
    }

    #[test]
    fn test_finish_returns_to_waiting() {
        let source = ScriptedSource::default()
            .packet(staged())
            .drive(&[10, 25])
            .packet(finish())
            // same stage again: no reload, previous distance starts over
            .packet(staged())
            .drive(&[10, 25]);

        let harness = run(source, "50,left3\n", 100);
        assert_eq!(harness.sink.identifiers(), vec!["left3", "left3"]);

        let loads = harness
            .events()
            .into_iter()
            .filter(|e| matches!(e, LoopEvent::PacenotesLoaded { .. }))
            .count();
        assert_eq!(loads, 1);
    }

    #[test]
    fn test_clock_reset_ends_stream() {
        let source = ScriptedSource::default()
            .packet(staged())
            .drive(&[10])
            .packet(staged())
            // awaiting again: this frame is used for detection only
            .packet(running(25))
            .drive(&[25]);

        let harness = run(source, "50,left3\n", 100);
        assert_eq!(harness.sink.identifiers(), vec!["left3"]);
    }

    #[test]
    fn test_countdown_once_per_attempt() {
        let source = ScriptedSource::default()
            .packet(staged())
            // first tick with a stopped clock is tolerated, second ends the run
            .packet(staged())
            .packet(staged())
            // re-entering without the clock having run: no second countdown
            .packet(staged())
            .packet(staged())
            .packet(staged())
            // picked up while waiting, then the clock runs
            .drive(&[5])
            .packet(finish())
            // clock ran, so the next attempt counts down again
            .packet(staged())
            .packet(staged());

        let harness = run_with(source, store(""), 100, true, |_| {});
        assert_eq!(
            harness.sink.identifiers(),
            vec!["countdown_start", "countdown_start"]
        );
    }

    #[test]
    fn test_countdown_disabled() {
        let source = ScriptedSource::default().packet(staged()).drive(&[5]);
        let harness = run(source, "", 100);
        assert!(harness.sink.identifiers().is_empty());
    }

    #[test]
    fn test_pause_state_reported_every_tick() {
        let source = ScriptedSource::default()
            .packet(staged())
            .packet(running(10))
            .packet(PacketBuilder {
                total_time: 20.0,
                ..running(10)
            })
            .packet(PacketBuilder {
                total_time: 20.0,
                lap_time: 0.0,
                ..running(10)
            });

        let harness = run(source, "", 100);
        let pauses: Vec<bool> = harness
            .events()
            .into_iter()
            .filter_map(|e| match e {
                LoopEvent::PauseState { paused } => Some(paused),
                _ => None,
            })
            .collect();
        assert_eq!(pauses, vec![false, false, true]);
    }
}
