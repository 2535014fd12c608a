// Sampling configuration vocabulary. Every value must come from the sets the
// board actually supports; nothing is coerced to a nearest neighbor.

use std::fmt;
use std::str::FromStr;

use crate::MmsError;

/// Accelerometer output data rates (Hz).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccOdr {
    Hz0_78125,
    Hz1_5625,
    Hz3_125,
    Hz6_25,
    Hz12_5,
    Hz25,
    Hz50,
    Hz100,
    Hz200,
    Hz400,
    Hz800,
    Hz1600,
}

impl AccOdr {
    pub fn hz(&self) -> f32 {
        match self {
            AccOdr::Hz0_78125 => 0.78125,
            AccOdr::Hz1_5625 => 1.5625,
            AccOdr::Hz3_125 => 3.125,
            AccOdr::Hz6_25 => 6.25,
            AccOdr::Hz12_5 => 12.5,
            AccOdr::Hz25 => 25.0,
            AccOdr::Hz50 => 50.0,
            AccOdr::Hz100 => 100.0,
            AccOdr::Hz200 => 200.0,
            AccOdr::Hz400 => 400.0,
            AccOdr::Hz800 => 800.0,
            AccOdr::Hz1600 => 1600.0,
        }
    }
}

// All supported rates are exact binary fractions, so equality against the
// parsed input is well defined.
impl TryFrom<f32> for AccOdr {
    type Error = MmsError;

    fn try_from(value: f32) -> Result<Self, MmsError> {
        let odr = match value {
            v if v == 0.78125 => AccOdr::Hz0_78125,
            v if v == 1.5625 => AccOdr::Hz1_5625,
            v if v == 3.125 => AccOdr::Hz3_125,
            v if v == 6.25 => AccOdr::Hz6_25,
            v if v == 12.5 => AccOdr::Hz12_5,
            v if v == 25.0 => AccOdr::Hz25,
            v if v == 50.0 => AccOdr::Hz50,
            v if v == 100.0 => AccOdr::Hz100,
            v if v == 200.0 => AccOdr::Hz200,
            v if v == 400.0 => AccOdr::Hz400,
            v if v == 800.0 => AccOdr::Hz800,
            v if v == 1600.0 => AccOdr::Hz1600,
            _ => {
                return Err(MmsError::Configuration(format!(
                    "unsupported accelerometer output data rate: {} Hz",
                    value
                )))
            }
        };
        Ok(odr)
    }
}

impl FromStr for AccOdr {
    type Err = MmsError;

    fn from_str(s: &str) -> Result<Self, MmsError> {
        let value: f32 = s.parse().map_err(|_| {
            MmsError::Configuration(format!("accelerometer output data rate is not a number: {s:?}"))
        })?;
        AccOdr::try_from(value)
    }
}

impl fmt::Display for AccOdr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.hz())
    }
}

/// Accelerometer full-scale range (g).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccRange {
    G2,
    G4,
    G8,
    G16,
}

impl AccRange {
    pub fn g(&self) -> u32 {
        match self {
            AccRange::G2 => 2,
            AccRange::G4 => 4,
            AccRange::G8 => 8,
            AccRange::G16 => 16,
        }
    }
}

impl TryFrom<u32> for AccRange {
    type Error = MmsError;

    fn try_from(value: u32) -> Result<Self, MmsError> {
        match value {
            2 => Ok(AccRange::G2),
            4 => Ok(AccRange::G4),
            8 => Ok(AccRange::G8),
            16 => Ok(AccRange::G16),
            _ => Err(MmsError::Configuration(format!(
                "unsupported accelerometer range: {} g",
                value
            ))),
        }
    }
}

impl FromStr for AccRange {
    type Err = MmsError;

    fn from_str(s: &str) -> Result<Self, MmsError> {
        let value: u32 = s.parse().map_err(|_| {
            MmsError::Configuration(format!("accelerometer range is not a whole number: {s:?}"))
        })?;
        AccRange::try_from(value)
    }
}

impl fmt::Display for AccRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}g", self.g())
    }
}

/// Gyroscope output data rates (Hz).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GyroOdr {
    Hz25,
    Hz50,
    Hz100,
    Hz200,
    Hz400,
    Hz800,
    Hz1600,
    Hz3200,
}

impl GyroOdr {
    pub fn hz(&self) -> u32 {
        match self {
            GyroOdr::Hz25 => 25,
            GyroOdr::Hz50 => 50,
            GyroOdr::Hz100 => 100,
            GyroOdr::Hz200 => 200,
            GyroOdr::Hz400 => 400,
            GyroOdr::Hz800 => 800,
            GyroOdr::Hz1600 => 1600,
            GyroOdr::Hz3200 => 3200,
        }
    }
}

impl TryFrom<u32> for GyroOdr {
    type Error = MmsError;

    fn try_from(value: u32) -> Result<Self, MmsError> {
        match value {
            25 => Ok(GyroOdr::Hz25),
            50 => Ok(GyroOdr::Hz50),
            100 => Ok(GyroOdr::Hz100),
            200 => Ok(GyroOdr::Hz200),
            400 => Ok(GyroOdr::Hz400),
            800 => Ok(GyroOdr::Hz800),
            1600 => Ok(GyroOdr::Hz1600),
            3200 => Ok(GyroOdr::Hz3200),
            _ => Err(MmsError::Configuration(format!(
                "unsupported gyroscope output data rate: {} Hz",
                value
            ))),
        }
    }
}

impl FromStr for GyroOdr {
    type Err = MmsError;

    fn from_str(s: &str) -> Result<Self, MmsError> {
        let value: u32 = s.parse().map_err(|_| {
            MmsError::Configuration(format!(
                "gyroscope output data rate is not a whole number: {s:?}"
            ))
        })?;
        GyroOdr::try_from(value)
    }
}

impl fmt::Display for GyroOdr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.hz())
    }
}

/// Gyroscope full-scale range (deg/s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GyroRange {
    Dps125,
    Dps250,
    Dps500,
    Dps1000,
    Dps2000,
}

impl GyroRange {
    pub fn dps(&self) -> u32 {
        match self {
            GyroRange::Dps125 => 125,
            GyroRange::Dps250 => 250,
            GyroRange::Dps500 => 500,
            GyroRange::Dps1000 => 1000,
            GyroRange::Dps2000 => 2000,
        }
    }
}

impl TryFrom<u32> for GyroRange {
    type Error = MmsError;

    fn try_from(value: u32) -> Result<Self, MmsError> {
        match value {
            125 => Ok(GyroRange::Dps125),
            250 => Ok(GyroRange::Dps250),
            500 => Ok(GyroRange::Dps500),
            1000 => Ok(GyroRange::Dps1000),
            2000 => Ok(GyroRange::Dps2000),
            _ => Err(MmsError::Configuration(format!(
                "unsupported gyroscope range: {} dps",
                value
            ))),
        }
    }
}

impl FromStr for GyroRange {
    type Err = MmsError;

    fn from_str(s: &str) -> Result<Self, MmsError> {
        let value: u32 = s.parse().map_err(|_| {
            MmsError::Configuration(format!("gyroscope range is not a whole number: {s:?}"))
        })?;
        GyroRange::try_from(value)
    }
}

impl fmt::Display for GyroRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}dps", self.dps())
    }
}

/// Magnetometer operating preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagPreset {
    LowPower,
    Regular,
    EnhancedRegular,
    HighAccuracy,
}

impl MagPreset {
    /// Effective sampling rate of the preset. `HighAccuracy` runs at 20 Hz,
    /// every other preset at 10 Hz.
    pub fn odr_hz(&self) -> f32 {
        match self {
            MagPreset::HighAccuracy => 20.0,
            _ => 10.0,
        }
    }
}

impl FromStr for MagPreset {
    type Err = MmsError;

    fn from_str(s: &str) -> Result<Self, MmsError> {
        match s {
            "low" => Ok(MagPreset::LowPower),
            "regular" => Ok(MagPreset::Regular),
            "enhanced" => Ok(MagPreset::EnhancedRegular),
            "high" => Ok(MagPreset::HighAccuracy),
            _ => Err(MmsError::Configuration(format!(
                "unsupported magnetometer preset: {s:?} (expected low, regular, enhanced, or high)"
            ))),
        }
    }
}

impl fmt::Display for MagPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MagPreset::LowPower => "low",
            MagPreset::Regular => "regular",
            MagPreset::EnhancedRegular => "enhanced",
            MagPreset::HighAccuracy => "high",
        };
        write!(f, "{}", name)
    }
}

/// Immutable sampling configuration for one session, resolved once at
/// start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub acc_odr: AccOdr,
    pub acc_range: AccRange,
    pub gyro_odr: GyroOdr,
    pub gyro_range: GyroRange,
    pub mag_preset: MagPreset,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            acc_odr: AccOdr::Hz50,
            acc_range: AccRange::G4,
            gyro_odr: GyroOdr::Hz50,
            gyro_range: GyroRange::Dps1000,
            mag_preset: MagPreset::Regular,
        }
    }
}

impl fmt::Display for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "acc {}/{}, gyro {}/{}, mag {}",
            self.acc_odr, self.acc_range, self.gyro_odr, self.gyro_range, self.mag_preset
        )
    }
}
