use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use mms_traits::{
    AccOdr, AccRange, Channel, ChannelCallback, ChannelEvent, GyroOdr, GyroRange, LedColor,
    LedPattern, MagPreset, MmsError, SensorBoard, SensorSample, SessionConfig, Vector3,
};

/// Worker wake-up period. Emission catches up in batches each tick, so this
/// bounds callback latency, not throughput.
const TICK: Duration = Duration::from_millis(2);

/// Cap on samples emitted per channel per tick after a scheduling stall.
const MAX_BATCH: u64 = 1024;

#[derive(Debug, Default, Clone, Copy)]
struct ChannelGate {
    enabled: bool,
    started: bool,
}

impl ChannelGate {
    fn live(&self) -> bool {
        self.enabled && self.started
    }
}

struct BoardShared {
    subscriptions: RwLock<HashMap<Channel, ChannelCallback>>,
    gates: RwLock<HashMap<Channel, ChannelGate>>,
    config: RwLock<SessionConfig>,
    led: RwLock<Option<(LedPattern, LedColor)>>,
    connected: RwLock<bool>,
    connected_at: Instant,
}

/// A board that exists only in software: it honors the whole driver seam and
/// synthesizes deterministic sensor streams at the configured output data
/// rates, so the streaming tool and its tests run without hardware.
pub struct SimulatedBoard {
    address: String,
    shared: Arc<BoardShared>,
    running: Arc<RwLock<bool>>,
}

impl SimulatedBoard {
    /// Opens a session against the simulated board.
    ///
    /// The address must look like a BLE link-layer address (six
    /// colon-separated hex octets); anything else is refused the way an
    /// unreachable device would be.
    pub fn connect(address: &str) -> Result<Self, MmsError> {
        if !is_link_layer_address(address) {
            return Err(MmsError::Connection(format!(
                "cannot reach device at {address:?}: not a link-layer address"
            )));
        }

        let shared = Arc::new(BoardShared {
            subscriptions: RwLock::new(HashMap::new()),
            gates: RwLock::new(HashMap::new()),
            config: RwLock::new(SessionConfig::default()),
            led: RwLock::new(None),
            connected: RwLock::new(true),
            connected_at: Instant::now(),
        });
        let running = Arc::new(RwLock::new(true));

        start_worker(Arc::clone(&shared), Arc::clone(&running));
        debug!("simulated board up at {address}");

        Ok(SimulatedBoard {
            address: address.to_string(),
            shared,
            running,
        })
    }

    /// Feeds a push-button level change into the button channel, as if the
    /// physical button had moved. Dispatches on the calling thread; dropped
    /// silently once the board is disconnected.
    pub fn inject_button(&self, pressed: bool) {
        if self.ensure_connected().is_err() {
            return;
        }
        dispatch(&self.shared, Channel::Button, ChannelEvent::Button { pressed });
    }

    /// Current LED state, if any pattern is playing.
    pub fn led(&self) -> Option<(LedPattern, LedColor)> {
        self.shared.led.read().ok().and_then(|led| *led)
    }

    fn ensure_connected(&self) -> Result<(), MmsError> {
        if *self.shared.connected.read()? {
            Ok(())
        } else {
            Err(MmsError::Device(format!(
                "board {} is disconnected",
                self.address
            )))
        }
    }
}

impl SensorBoard for SimulatedBoard {
    fn address(&self) -> &str {
        &self.address
    }

    fn set_connection_parameters(
        &self,
        min_conn_interval_ms: f32,
        max_conn_interval_ms: f32,
        latency: u16,
        timeout_ms: u16,
    ) -> Result<(), MmsError> {
        self.ensure_connected()?;
        debug!(
            "connection parameters: interval {min_conn_interval_ms}-{max_conn_interval_ms} ms, \
             latency {latency}, timeout {timeout_ms} ms"
        );
        Ok(())
    }

    fn set_accel_config(&self, odr: AccOdr, range: AccRange) -> Result<(), MmsError> {
        self.ensure_connected()?;
        let mut config = self.shared.config.write()?;
        config.acc_odr = odr;
        config.acc_range = range;
        Ok(())
    }

    fn set_gyro_config(&self, odr: GyroOdr, range: GyroRange) -> Result<(), MmsError> {
        self.ensure_connected()?;
        let mut config = self.shared.config.write()?;
        config.gyro_odr = odr;
        config.gyro_range = range;
        Ok(())
    }

    fn set_mag_preset(&self, preset: MagPreset) -> Result<(), MmsError> {
        self.ensure_connected()?;
        self.shared.config.write()?.mag_preset = preset;
        Ok(())
    }

    fn enable_channel(&self, channel: Channel) -> Result<(), MmsError> {
        self.ensure_connected()?;
        if channel == Channel::Button {
            // The button is always live; there is nothing to enable.
            return Ok(());
        }
        self.shared.gates.write()?.entry(channel).or_default().enabled = true;
        Ok(())
    }

    fn disable_channel(&self, channel: Channel) -> Result<(), MmsError> {
        self.ensure_connected()?;
        if channel == Channel::Button {
            return Ok(());
        }
        self.shared.gates.write()?.entry(channel).or_default().enabled = false;
        Ok(())
    }

    fn start_channel(&self, channel: Channel) -> Result<(), MmsError> {
        self.ensure_connected()?;
        if channel == Channel::Button {
            return Ok(());
        }
        self.shared.gates.write()?.entry(channel).or_default().started = true;
        Ok(())
    }

    fn stop_channel(&self, channel: Channel) -> Result<(), MmsError> {
        self.ensure_connected()?;
        if channel == Channel::Button {
            return Ok(());
        }
        self.shared.gates.write()?.entry(channel).or_default().started = false;
        Ok(())
    }

    fn subscribe(&self, channel: Channel, callback: ChannelCallback) -> Result<(), MmsError> {
        self.ensure_connected()?;
        self.shared.subscriptions.write()?.insert(channel, callback);
        Ok(())
    }

    fn unsubscribe(&self, channel: Channel) -> Result<(), MmsError> {
        self.ensure_connected()?;
        if self.shared.subscriptions.write()?.remove(&channel).is_none() {
            return Err(MmsError::UndefinedState(format!(
                "no subscription on the {channel} channel"
            )));
        }
        Ok(())
    }

    fn set_led(&self, pattern: LedPattern, color: LedColor) -> Result<(), MmsError> {
        self.ensure_connected()?;
        *self.shared.led.write()? = Some((pattern, color));
        Ok(())
    }

    fn clear_led(&self) -> Result<(), MmsError> {
        self.ensure_connected()?;
        *self.shared.led.write()? = None;
        Ok(())
    }

    fn enter_low_power_mode(&self) -> Result<(), MmsError> {
        self.ensure_connected()?;
        self.shared.gates.write()?.clear();
        debug!("board {} entering power-save mode", self.address);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), MmsError> {
        let mut connected = self.shared.connected.write()?;
        if !*connected {
            return Ok(());
        }
        *connected = false;
        drop(connected);
        *self.running.write()? = false;
        debug!("simulated board at {} shut down", self.address);
        Ok(())
    }
}

impl Drop for SimulatedBoard {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

fn start_worker(shared: Arc<BoardShared>, running: Arc<RwLock<bool>>) {
    thread::spawn(move || {
        // Next due timestamp per sensor channel, relative to connection.
        let mut clocks: HashMap<Channel, Duration> = HashMap::new();
        loop {
            match running.read() {
                Ok(guard) if *guard => {}
                _ => break,
            }
            let now = shared.connected_at.elapsed();
            for channel in Channel::SENSORS {
                // Snapshot flags and config, then release the locks before
                // any callback runs.
                let live = {
                    let Ok(gates) = shared.gates.read() else { return };
                    gates.get(&channel).map(|g| g.live()).unwrap_or(false)
                };
                let config = {
                    let Ok(config) = shared.config.read() else { return };
                    *config
                };
                let period = sample_period(channel, &config);
                if !live {
                    // Keep the clock moving so a later start does not replay
                    // the idle interval as a burst.
                    clocks.insert(channel, now + period);
                    continue;
                }
                let mut next_at = clocks.get(&channel).copied().unwrap_or(now);
                let mut emitted = 0;
                while next_at <= now && emitted < MAX_BATCH {
                    let sample = SensorSample {
                        elapsed: next_at,
                        value: synth_value(channel, next_at, &config),
                    };
                    dispatch(&shared, channel, ChannelEvent::Sample(sample));
                    next_at += period;
                    emitted += 1;
                }
                clocks.insert(channel, next_at);
            }
            thread::sleep(TICK);
        }
    });
}

fn dispatch(shared: &BoardShared, channel: Channel, event: ChannelEvent) {
    if let Ok(subscriptions) = shared.subscriptions.read() {
        if let Some(callback) = subscriptions.get(&channel) {
            callback(event);
        }
    } else {
        eprintln!("subscription table lock poisoned; dropping {channel} event");
    }
}

fn sample_period(channel: Channel, config: &SessionConfig) -> Duration {
    let hz = match channel {
        Channel::Accel => config.acc_odr.hz(),
        Channel::Gyro => config.gyro_odr.hz() as f32,
        Channel::Mag => config.mag_preset.odr_hz(),
        // The button has no sample clock.
        Channel::Button => return Duration::from_secs(1),
    };
    Duration::from_secs_f32(1.0 / hz)
}

/// Deterministic low-amplitude waveforms, scaled within the configured
/// full-scale range. The accelerometer carries a 1 g gravity bias on z.
fn synth_value(channel: Channel, at: Duration, config: &SessionConfig) -> Vector3 {
    let t = at.as_secs_f32();
    match channel {
        Channel::Accel => {
            let swing = 0.02 * config.acc_range.g() as f32;
            Vector3::new(
                swing * (TAU * 0.40 * t).sin(),
                swing * (TAU * 0.25 * t).cos(),
                1.0 + swing * (TAU * 0.10 * t).sin(),
            )
        }
        Channel::Gyro => {
            let swing = 0.01 * config.gyro_range.dps() as f32;
            Vector3::new(
                swing * (TAU * 0.50 * t).sin(),
                swing * (TAU * 0.30 * t).sin(),
                swing * (TAU * 0.20 * t).cos(),
            )
        }
        Channel::Mag => {
            // Earth-field-ish values in microtesla with a slow wobble.
            Vector3::new(
                21.0 + 0.8 * (TAU * 0.15 * t).sin(),
                4.5 + 0.8 * (TAU * 0.10 * t).cos(),
                43.0 + 0.8 * (TAU * 0.05 * t).sin(),
            )
        }
        Channel::Button => Vector3::default(),
    }
}

fn is_link_layer_address(address: &str) -> bool {
    let octets: Vec<&str> = address.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|octet| octet.len() == 2 && octet.chars().all(|c| c.is_ascii_hexdigit()))
}
