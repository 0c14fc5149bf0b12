use serde::{Deserialize, Serialize};

/// Display size an image is inserted at.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Full,
    /// Half of the intrinsic size, for 2x assets.
    Half,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScaledSize {
    pub width: u32,
    pub height: u32,
}

/// Maps an intrinsic size to the size written into the source.
///
/// Half mode rounds each dimension independently, halves away from zero:
/// `101 / 2` becomes `51`.
pub fn scale(width: u32, height: u32, mode: Mode) -> ScaledSize {
    match mode {
        Mode::Full => ScaledSize { width, height },
        Mode::Half => ScaledSize {
            width: half(width),
            height: half(height),
        },
    }
}

fn half(value: u32) -> u32 {
    (f64::from(value) / 2.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_is_identity() {
        assert_eq!(
            scale(640, 480, Mode::Full),
            ScaledSize {
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    fn test_half() {
        assert_eq!(
            scale(200, 150, Mode::Half),
            ScaledSize {
                width: 100,
                height: 75
            }
        );
    }

    #[test]
    fn test_half_rounds_ties_away_from_zero() {
        assert_eq!(scale(101, 3, Mode::Half), ScaledSize { width: 51, height: 2 });
        assert_eq!(scale(1, 0, Mode::Half), ScaledSize { width: 1, height: 0 });
    }
}
