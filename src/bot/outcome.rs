use serde::Serialize;

use super::EngineError;

/// Red pockets on a European single-zero layout.
const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

/// Pocket colour of a spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Black,
    Green,
}

impl Color {
    /// The colour a counter-trend bet targets after a run of this colour.
    /// Green never anchors a bettable run.
    pub fn opposite(self) -> Option<Color> {
        match self {
            Color::Red => Some(Color::Black),
            Color::Black => Some(Color::Red),
            Color::Green => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Black => "black",
            Color::Green => "green",
        }
    }
}

/// Parity of a spin. Zero pays neither even nor odd on the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Even,
    Odd,
    Zero,
}

impl Parity {
    pub fn opposite(self) -> Option<Parity> {
        match self {
            Parity::Even => Some(Parity::Odd),
            Parity::Odd => Some(Parity::Even),
            Parity::Zero => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Parity::Even => "even",
            Parity::Odd => "odd",
            Parity::Zero => "zero",
        }
    }
}

/// A classified wheel outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub number: u8,
    pub color: Color,
    pub parity: Parity,
}

impl Outcome {
    pub fn is_zero(&self) -> bool {
        self.number == 0
    }
}

/// Classify a raw wheel number into colour and parity.
///
/// Numbers outside `0..=36` are rejected; callers skip the spin without
/// touching any engine state.
pub fn classify(number: i64) -> Result<Outcome, EngineError> {
    if !(0..=36).contains(&number) {
        return Err(EngineError::InvalidOutcome(number));
    }
    let number = number as u8;
    if number == 0 {
        return Ok(Outcome {
            number,
            color: Color::Green,
            parity: Parity::Zero,
        });
    }
    let color = if RED_NUMBERS.contains(&number) {
        Color::Red
    } else {
        Color::Black
    };
    let parity = if number % 2 == 0 {
        Parity::Even
    } else {
        Parity::Odd
    };
    Ok(Outcome {
        number,
        color,
        parity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_zero() {
        let o = classify(0).unwrap();
        assert!(o.is_zero());
        assert_eq!(o.color, Color::Green);
        assert_eq!(o.parity, Parity::Zero);
    }

    #[test]
    fn test_classify_red_odd() {
        let o = classify(19).unwrap();
        assert_eq!(o.color, Color::Red);
        assert_eq!(o.parity, Parity::Odd);
    }

    #[test]
    fn test_classify_red_even() {
        // 12 is one of the even red pockets
        let o = classify(12).unwrap();
        assert_eq!(o.color, Color::Red);
        assert_eq!(o.parity, Parity::Even);
    }

    #[test]
    fn test_classify_black_even() {
        let o = classify(10).unwrap();
        assert_eq!(o.color, Color::Black);
        assert_eq!(o.parity, Parity::Even);
    }

    #[test]
    fn test_classify_out_of_range() {
        assert!(matches!(classify(37), Err(EngineError::InvalidOutcome(37))));
        assert!(matches!(classify(-1), Err(EngineError::InvalidOutcome(-1))));
        assert!(matches!(
            classify(100),
            Err(EngineError::InvalidOutcome(100))
        ));
    }

    #[test]
    fn test_red_set_is_half_the_board() {
        assert_eq!(RED_NUMBERS.len(), 18);
        let blacks = (1u8..=36).filter(|n| !RED_NUMBERS.contains(n)).count();
        assert_eq!(blacks, 18);
    }

    #[test]
    fn test_opposites() {
        assert_eq!(Color::Red.opposite(), Some(Color::Black));
        assert_eq!(Color::Black.opposite(), Some(Color::Red));
        assert_eq!(Color::Green.opposite(), None);
        assert_eq!(Parity::Even.opposite(), Some(Parity::Odd));
        assert_eq!(Parity::Zero.opposite(), None);
    }
}
