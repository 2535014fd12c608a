// Session controller: bridges the four board channels to start/stop commands
// while keeping the sample counters accurate.

use std::sync::{Arc, Mutex, MutexGuard};

use log::warn;
use mms_traits::{
    Channel, ChannelCallback, ChannelEvent, LedColor, LedPattern, MmsError, SensorBoard,
    SessionConfig,
};

/// Where the session sits in its lifecycle. `Terminated` is absorbing: no
/// operation is valid afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connected,
    Configured,
    Sampling,
    Terminated,
}

/// Per-channel sample tallies. Monotonically non-decreasing for the process
/// lifetime; only a restart resets them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SampleCounts {
    pub accel: u64,
    pub gyro: u64,
    pub mag: u64,
    pub total: u64,
}

struct SessionState {
    phase: SessionPhase,
    button_pressed: bool,
    counts: SampleCounts,
}

/// Owns one connected board for the process lifetime and reacts to its four
/// channels. Channel callbacks run on the driver's threads, so all mutable
/// session state sits behind a single mutex.
pub struct SessionController<B: SensorBoard> {
    board: Arc<B>,
    state: Arc<Mutex<SessionState>>,
}

impl<B: SensorBoard> SessionController<B> {
    pub fn new(board: B) -> Self {
        SessionController {
            board: Arc::new(board),
            state: Arc::new(Mutex::new(SessionState {
                phase: SessionPhase::Connected,
                button_pressed: false,
                counts: SampleCounts::default(),
            })),
        }
    }

    /// Handle to the underlying board, shared with the channel callbacks.
    pub fn board(&self) -> Arc<B> {
        Arc::clone(&self.board)
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock_state().phase
    }

    pub fn sampling(&self) -> bool {
        self.lock_state().phase == SessionPhase::Sampling
    }

    pub fn counts(&self) -> SampleCounts {
        self.lock_state().counts
    }

    /// Pushes the resolved configuration to the board.
    ///
    /// Order mirrors the board's bring-up contract: connection parameters
    /// first, then the status LED, then each sensor; the magnetometer channel
    /// must be stopped before its preset is written.
    pub fn configure(&self, config: &SessionConfig) -> Result<(), MmsError> {
        let mut state = self.lock_state();
        if state.phase == SessionPhase::Terminated {
            return Err(MmsError::UndefinedState(
                "configure called after teardown".to_string(),
            ));
        }
        self.board.set_connection_parameters(7.5, 7.5, 0, 6000)?;
        self.board.set_led(LedPattern::Solid, LedColor::Blue)?;
        self.board.set_accel_config(config.acc_odr, config.acc_range)?;
        self.board.set_gyro_config(config.gyro_odr, config.gyro_range)?;
        self.board.stop_channel(Channel::Mag)?;
        self.board.set_mag_preset(config.mag_preset)?;
        state.phase = SessionPhase::Configured;
        Ok(())
    }

    /// Enables and starts all three sensor channels and drives the "active"
    /// LED pattern. Safe to call while already sampling; the underlying
    /// enable calls are simply re-issued.
    pub fn start_sampling(&self) {
        let mut state = self.lock_state();
        if state.phase == SessionPhase::Terminated {
            return;
        }
        Self::drive_start(self.board.as_ref());
        state.phase = SessionPhase::Sampling;
    }

    /// Stops and disables all three sensor channels and drives the "stopped"
    /// LED pattern. Symmetric with [`start_sampling`](Self::start_sampling),
    /// including being safe to call while already stopped.
    pub fn stop_sampling(&self) {
        let mut state = self.lock_state();
        if state.phase == SessionPhase::Terminated {
            return;
        }
        Self::drive_stop(self.board.as_ref());
        if state.phase == SessionPhase::Sampling {
            state.phase = SessionPhase::Configured;
        }
    }

    /// Winds the session down regardless of how it ended: explicit stop,
    /// interrupt, or an error path. Every step is independently guarded, so a
    /// failing step never prevents the ones after it, even when part of the
    /// session was never initialized. Idempotent; later calls return the same
    /// counts as the first.
    pub fn teardown(&self) -> SampleCounts {
        {
            let mut state = self.lock_state();
            if state.phase == SessionPhase::Terminated {
                return state.counts;
            }
            state.phase = SessionPhase::Terminated;
        }
        // The phase is already Terminated, so a racing button press cannot
        // restart the channels underneath these steps.
        Self::drive_stop(self.board.as_ref());
        for channel in Channel::ALL {
            if let Err(e) = self.board.unsubscribe(channel) {
                warn!("unsubscribe {channel}: {e}");
            }
        }
        if let Err(e) = self.board.clear_led() {
            warn!("clear status LED: {e}");
        }
        if let Err(e) = self.board.enter_low_power_mode() {
            warn!("enter power-save mode: {e}");
        }
        if let Err(e) = self.board.disconnect() {
            warn!("disconnect: {e}");
        }
        self.lock_state().counts
    }

    fn drive_start(board: &B) {
        for channel in Channel::SENSORS {
            if let Err(e) = board.enable_channel(channel) {
                warn!("enable {channel}: {e}");
            }
            if let Err(e) = board.start_channel(channel) {
                warn!("start {channel}: {e}");
            }
        }
        if let Err(e) = board.set_led(LedPattern::Blink, LedColor::Green) {
            warn!("status LED: {e}");
        }
    }

    fn drive_stop(board: &B) {
        if let Err(e) = board.set_led(LedPattern::Pulse, LedColor::Red) {
            warn!("status LED: {e}");
        }
        for channel in Channel::SENSORS {
            if let Err(e) = board.stop_channel(channel) {
                warn!("stop {channel}: {e}");
            }
            if let Err(e) = board.disable_channel(channel) {
                warn!("disable {channel}: {e}");
            }
        }
    }

    // A poisoned state mutex means a callback panicked mid-update; the
    // counters stay usable, so recover the guard rather than fail teardown.
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<B: SensorBoard + 'static> SessionController<B> {
    /// Registers the four channel callbacks on the board.
    ///
    /// Sensor callbacks count the sample and print it; they never block and
    /// never fail. The button callback toggles sampling on the press edge
    /// only: a repeated press notification without a release in between is
    /// ignored.
    pub fn subscribe_channels(&self) -> Result<(), MmsError> {
        self.board
            .subscribe(Channel::Accel, self.sensor_callback(Channel::Accel, "ACC"))?;
        self.board
            .subscribe(Channel::Gyro, self.sensor_callback(Channel::Gyro, "GYRO"))?;
        self.board
            .subscribe(Channel::Mag, self.sensor_callback(Channel::Mag, "MAG"))?;

        let state = Arc::clone(&self.state);
        let board = Arc::downgrade(&self.board);
        self.board.subscribe(
            Channel::Button,
            Box::new(move |event| {
                let ChannelEvent::Button { pressed } = event else {
                    return;
                };
                let Some(board) = board.upgrade() else {
                    return;
                };
                let mut state = match state.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                let rising = pressed && !state.button_pressed;
                state.button_pressed = pressed;
                if !rising {
                    return;
                }
                match state.phase {
                    SessionPhase::Sampling => {
                        println!("[ButtonPressed] Sampling stopping...");
                        Self::drive_stop(board.as_ref());
                        state.phase = SessionPhase::Configured;
                    }
                    SessionPhase::Connected | SessionPhase::Configured => {
                        println!("[ButtonPressed] Sampling starting...");
                        Self::drive_start(board.as_ref());
                        state.phase = SessionPhase::Sampling;
                    }
                    SessionPhase::Terminated => {}
                }
            }),
        )?;
        Ok(())
    }

    fn sensor_callback(&self, channel: Channel, tag: &'static str) -> ChannelCallback {
        let state = Arc::clone(&self.state);
        Box::new(move |event| {
            let ChannelEvent::Sample(sample) = event else {
                return;
            };
            {
                let mut state = match state.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                match channel {
                    Channel::Accel => state.counts.accel += 1,
                    Channel::Gyro => state.counts.gyro += 1,
                    Channel::Mag => state.counts.mag += 1,
                    Channel::Button => return,
                }
                state.counts.total += 1;
            }
            println!("{tag}: {} +{:.3}s", sample.value, sample.elapsed.as_secs_f64());
        })
    }
}

impl<B: SensorBoard> Drop for SessionController<B> {
    fn drop(&mut self) {
        // Backstop for error paths that never reach the explicit teardown.
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mms_traits::{
        AccOdr, AccRange, GyroOdr, GyroRange, MagPreset, SensorSample, Vector3,
    };
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        ConnectionParameters,
        AccelConfig,
        GyroConfig,
        MagPreset,
        Enable(Channel),
        Disable(Channel),
        Start(Channel),
        Stop(Channel),
        Unsubscribe(Channel),
        Led(LedPattern, LedColor),
        ClearLed,
        LowPower,
        Disconnect,
    }

    #[derive(Default)]
    struct RecordingBoard {
        calls: Mutex<Vec<Call>>,
        callbacks: Mutex<HashMap<Channel, ChannelCallback>>,
        reject_accel_config: bool,
    }

    impl RecordingBoard {
        fn rejecting_accel_config() -> Self {
            RecordingBoard {
                reject_accel_config: true,
                ..Default::default()
            }
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn count(&self, call: &Call) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
        }

        fn fire(&self, channel: Channel, event: ChannelEvent) {
            let callbacks = self.callbacks.lock().unwrap();
            if let Some(callback) = callbacks.get(&channel) {
                callback(event);
            }
        }

        fn press(&self) {
            self.fire(Channel::Button, ChannelEvent::Button { pressed: true });
        }

        fn release(&self) {
            self.fire(Channel::Button, ChannelEvent::Button { pressed: false });
        }

        fn sample(&self, channel: Channel, at_ms: u64) {
            self.fire(
                channel,
                ChannelEvent::Sample(SensorSample {
                    elapsed: Duration::from_millis(at_ms),
                    value: Vector3::new(0.0, 0.0, 1.0),
                }),
            );
        }
    }

    impl SensorBoard for RecordingBoard {
        fn address(&self) -> &str {
            "AA:BB:CC:DD:EE:FF"
        }

        fn set_connection_parameters(
            &self,
            _min: f32,
            _max: f32,
            _latency: u16,
            _timeout: u16,
        ) -> Result<(), MmsError> {
            self.record(Call::ConnectionParameters);
            Ok(())
        }

        fn set_accel_config(&self, _odr: AccOdr, _range: AccRange) -> Result<(), MmsError> {
            if self.reject_accel_config {
                return Err(MmsError::Configuration(
                    "accelerometer rate not supported on this hardware generation".to_string(),
                ));
            }
            self.record(Call::AccelConfig);
            Ok(())
        }

        fn set_gyro_config(&self, _odr: GyroOdr, _range: GyroRange) -> Result<(), MmsError> {
            self.record(Call::GyroConfig);
            Ok(())
        }

        fn set_mag_preset(&self, _preset: MagPreset) -> Result<(), MmsError> {
            self.record(Call::MagPreset);
            Ok(())
        }

        fn enable_channel(&self, channel: Channel) -> Result<(), MmsError> {
            self.record(Call::Enable(channel));
            Ok(())
        }

        fn disable_channel(&self, channel: Channel) -> Result<(), MmsError> {
            self.record(Call::Disable(channel));
            Ok(())
        }

        fn start_channel(&self, channel: Channel) -> Result<(), MmsError> {
            self.record(Call::Start(channel));
            Ok(())
        }

        fn stop_channel(&self, channel: Channel) -> Result<(), MmsError> {
            self.record(Call::Stop(channel));
            Ok(())
        }

        fn subscribe(&self, channel: Channel, callback: ChannelCallback) -> Result<(), MmsError> {
            self.callbacks.lock().unwrap().insert(channel, callback);
            Ok(())
        }

        fn unsubscribe(&self, channel: Channel) -> Result<(), MmsError> {
            self.record(Call::Unsubscribe(channel));
            if self.callbacks.lock().unwrap().remove(&channel).is_none() {
                return Err(MmsError::UndefinedState(format!(
                    "never subscribed: {channel}"
                )));
            }
            Ok(())
        }

        fn set_led(&self, pattern: LedPattern, color: LedColor) -> Result<(), MmsError> {
            self.record(Call::Led(pattern, color));
            Ok(())
        }

        fn clear_led(&self) -> Result<(), MmsError> {
            self.record(Call::ClearLed);
            Ok(())
        }

        fn enter_low_power_mode(&self) -> Result<(), MmsError> {
            self.record(Call::LowPower);
            Ok(())
        }

        fn disconnect(&self) -> Result<(), MmsError> {
            self.record(Call::Disconnect);
            Ok(())
        }
    }

    fn ready_controller() -> (SessionController<RecordingBoard>, Arc<RecordingBoard>) {
        let controller = SessionController::new(RecordingBoard::default());
        let board = controller.board();
        controller.configure(&SessionConfig::default()).unwrap();
        controller.subscribe_channels().unwrap();
        (controller, board)
    }

    #[test]
    fn configure_reaches_every_sensor() {
        let (_controller, board) = ready_controller();
        assert_eq!(board.count(&Call::ConnectionParameters), 1);
        assert_eq!(board.count(&Call::AccelConfig), 1);
        assert_eq!(board.count(&Call::GyroConfig), 1);
        // The magnetometer is stopped before its preset is written.
        assert_eq!(board.count(&Call::Stop(Channel::Mag)), 1);
        assert_eq!(board.count(&Call::MagPreset), 1);
        assert_eq!(board.count(&Call::Led(LedPattern::Solid, LedColor::Blue)), 1);
    }

    #[test]
    fn duplicate_press_without_release_toggles_once() {
        let (controller, board) = ready_controller();
        board.press();
        board.press();
        assert!(controller.sampling());
        assert_eq!(board.count(&Call::Led(LedPattern::Blink, LedColor::Green)), 1);

        board.release();
        board.press();
        assert!(!controller.sampling());
        assert_eq!(board.count(&Call::Led(LedPattern::Pulse, LedColor::Red)), 1);
    }

    #[test]
    fn button_restarts_after_a_full_press_cycle() {
        let (controller, board) = ready_controller();
        board.press();
        board.release();
        board.press();
        board.release();
        board.press();
        assert!(controller.sampling());
        assert_eq!(board.count(&Call::Led(LedPattern::Blink, LedColor::Green)), 2);
    }

    #[test]
    fn stop_while_stopped_is_a_no_op() {
        let (controller, _board) = ready_controller();
        controller.stop_sampling();
        assert!(!controller.sampling());
        assert_eq!(controller.counts(), SampleCounts::default());
    }

    #[test]
    fn counters_add_up_across_interleavings() {
        let (controller, board) = ready_controller();
        controller.start_sampling();
        for i in 0..4 {
            board.sample(Channel::Accel, i * 10);
            board.sample(Channel::Gyro, i * 10 + 2);
            board.sample(Channel::Accel, i * 10 + 5);
            board.sample(Channel::Mag, i * 10 + 7);
        }
        let counts = controller.counts();
        assert_eq!(counts.accel, 8);
        assert_eq!(counts.gyro, 4);
        assert_eq!(counts.mag, 4);
        assert_eq!(counts.total, 16);
    }

    #[test]
    fn end_to_end_button_stop_with_default_config() {
        let (controller, board) = ready_controller();
        controller.start_sampling();
        for i in 0..10 {
            board.sample(Channel::Accel, 20 * i);
        }
        for i in 0..8 {
            board.sample(Channel::Gyro, 20 * i + 3);
        }

        board.press();
        assert!(!controller.sampling());
        // One stop per channel: the press edge stopped sampling exactly once.
        assert_eq!(board.count(&Call::Stop(Channel::Accel)), 1);
        assert_eq!(board.count(&Call::Led(LedPattern::Pulse, LedColor::Red)), 1);

        let counts = controller.teardown();
        assert_eq!(counts.accel, 10);
        assert_eq!(counts.gyro, 8);
        assert_eq!(counts.mag, 0);
        assert_eq!(counts.total, 18);
    }

    #[test]
    fn teardown_is_total_after_configure_failure() {
        let controller = SessionController::new(RecordingBoard::rejecting_accel_config());
        let board = controller.board();
        assert!(controller.configure(&SessionConfig::default()).is_err());

        // Nothing was ever subscribed, so every unsubscribe fails; the later
        // steps must still run.
        let counts = controller.teardown();
        assert_eq!(counts, SampleCounts::default());
        assert_eq!(board.count(&Call::ClearLed), 1);
        assert_eq!(board.count(&Call::LowPower), 1);
        assert_eq!(board.count(&Call::Disconnect), 1);
    }

    #[test]
    fn terminated_is_absorbing() {
        let (controller, board) = ready_controller();
        let first = controller.teardown();

        controller.start_sampling();
        board.press();
        assert!(controller.configure(&SessionConfig::default()).is_err());
        assert_eq!(board.count(&Call::Start(Channel::Accel)), 0);

        let second = controller.teardown();
        assert_eq!(first, second);
        assert_eq!(board.count(&Call::Disconnect), 1);
    }
}
