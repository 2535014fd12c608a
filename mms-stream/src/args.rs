// Resolution of the optional configuration quintuple from the command line.

use mms_traits::{MmsError, SessionConfig};

/// Resolves the positional configuration values.
///
/// Either none of the five values are given, in which case the defaults
/// apply, or all five must be, in the order
/// `acc_odr acc_range gyro_odr gyro_range mag_preset`.
pub fn resolve_config(values: &[String]) -> Result<SessionConfig, MmsError> {
    match values {
        [] => Ok(SessionConfig::default()),
        [acc_odr, acc_range, gyro_odr, gyro_range, mag_preset] => Ok(SessionConfig {
            acc_odr: acc_odr.parse()?,
            acc_range: acc_range.parse()?,
            gyro_odr: gyro_odr.parse()?,
            gyro_range: gyro_range.parse()?,
            mag_preset: mag_preset.parse()?,
        }),
        other => Err(MmsError::Configuration(format!(
            "expected either no configuration values or all five \
             (acc_odr acc_range gyro_odr gyro_range mag_preset), got {}",
            other.len()
        ))),
    }
}
