mod config;

pub use config::{AccOdr, AccRange, GyroOdr, GyroRange, MagPreset, SessionConfig};

use std::fmt;
use std::sync::PoisonError;
use std::time::Duration;

use thiserror::Error;

/// One three-axis reading, in the unit native to its channel
/// (g for acceleration, deg/s for rotation, µT for magnetic field).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x={:.3}, y={:.3}, z={:.3})", self.x, self.y, self.z)
    }
}

/// A sensor reading plus its timestamp relative to board connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub elapsed: Duration,
    pub value: Vector3,
}

/// The four logical data channels the board exposes. Each is subscribable
/// independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Accel,
    Gyro,
    Mag,
    Button,
}

impl Channel {
    /// The three sampled sensor channels, excluding the push button.
    pub const SENSORS: [Channel; 3] = [Channel::Accel, Channel::Gyro, Channel::Mag];
    pub const ALL: [Channel; 4] = [Channel::Accel, Channel::Gyro, Channel::Mag, Channel::Button];
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Accel => "accelerometer",
            Channel::Gyro => "gyroscope",
            Channel::Mag => "magnetometer",
            Channel::Button => "button",
        };
        write!(f, "{}", name)
    }
}

/// Event delivered through a channel subscription.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelEvent {
    /// A reading on one of the sensor channels.
    Sample(SensorSample),
    /// A push-button level change. `pressed` is the new level, not an edge.
    Button { pressed: bool },
}

/// Per-channel subscription callback. Invoked from the driver's own
/// thread(s); implementations must not block.
pub type ChannelCallback = Box<dyn Fn(ChannelEvent) + Send + Sync>;

/// On-board status LED patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedPattern {
    Solid,
    Blink,
    Pulse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Blue,
    Green,
    Red,
}

#[derive(Error, Debug)]
pub enum MmsError {
    /// Device unreachable or handshake failure.
    #[error("Connection error: {0}")]
    Connection(String),
    /// A value outside the supported enumerated sets.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The board rejected or failed an operation.
    #[error("Device error: {0}")]
    Device(String),
    /// An operation arrived before its prerequisite state existed.
    #[error("Undefined state: {0}")]
    UndefinedState(String),
    #[error("Lock error: {0}")]
    Lock(String),
}

impl<T> From<PoisonError<T>> for MmsError {
    fn from(err: PoisonError<T>) -> Self {
        MmsError::Lock(err.to_string())
    }
}

/// Driver-side surface of one connected board.
///
/// This is the seam to the vendor transport: link management, GATT traffic,
/// and frame decoding all live behind it. Implementations deliver channel
/// events from their own thread(s), so handles must be shareable across
/// threads.
pub trait SensorBoard: Send + Sync {
    /// Link-layer address the board was connected under.
    fn address(&self) -> &str;

    /// Requests BLE connection parameters (intervals in milliseconds).
    fn set_connection_parameters(
        &self,
        min_conn_interval_ms: f32,
        max_conn_interval_ms: f32,
        latency: u16,
        timeout_ms: u16,
    ) -> Result<(), MmsError>;

    fn set_accel_config(&self, odr: AccOdr, range: AccRange) -> Result<(), MmsError>;
    fn set_gyro_config(&self, odr: GyroOdr, range: GyroRange) -> Result<(), MmsError>;
    fn set_mag_preset(&self, preset: MagPreset) -> Result<(), MmsError>;

    fn enable_channel(&self, channel: Channel) -> Result<(), MmsError>;
    fn disable_channel(&self, channel: Channel) -> Result<(), MmsError>;
    fn start_channel(&self, channel: Channel) -> Result<(), MmsError>;
    fn stop_channel(&self, channel: Channel) -> Result<(), MmsError>;

    /// Registers `callback` for `channel`, replacing any previous one.
    fn subscribe(&self, channel: Channel, callback: ChannelCallback) -> Result<(), MmsError>;
    fn unsubscribe(&self, channel: Channel) -> Result<(), MmsError>;

    fn set_led(&self, pattern: LedPattern, color: LedColor) -> Result<(), MmsError>;
    fn clear_led(&self) -> Result<(), MmsError>;

    /// Places the board in its lowest-power quiescent mode, from which only a
    /// button press or a charger can wake it.
    fn enter_low_power_mode(&self) -> Result<(), MmsError>;

    fn disconnect(&self) -> Result<(), MmsError>;
}
