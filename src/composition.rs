//! Metal-composition synthesis for a declared purity.
//!
//! [`CompositionGenerator`] samples gold, silver and zinc uniformly inside the
//! band of a [`Purity`] and derives copper as the remainder, so that the four
//! values (parts per thousand, 3 decimals) add up to exactly 1000.

use std::fmt;
use std::ops::RangeInclusive;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on redraws before giving up on an exact-sum sample.
pub const MAX_SAMPLING_ATTEMPTS: u32 = 10_000;

const TOTAL: f64 = 1000.0;

#[derive(Debug, Error, PartialEq)]
pub enum CompositionError {
    #[error("invalid purity code: {0:?}")]
    InvalidPurity(String),

    #[error("no exact-sum composition for {purity} after {attempts} attempts")]
    Exhausted { purity: Purity, attempts: u32 },
}

/// Fineness class of a piece, in karat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purity {
    K14,
    K18,
    K22,
    K24,
}

impl Purity {
    pub const ALL: [Purity; 4] = [Purity::K14, Purity::K18, Purity::K22, Purity::K24];

    /// Parses the karat prefix of a declared purity such as `"22K916"`.
    pub fn from_declared(declared: &str) -> Result<Self, CompositionError> {
        let code: String = declared.trim().chars().take(2).collect();
        Self::ALL
            .into_iter()
            .find(|purity| purity.code() == code)
            .ok_or_else(|| CompositionError::InvalidPurity(declared.to_string()))
    }

    /// Karat number as written in a declared purity.
    pub fn code(self) -> &'static str {
        match self {
            Purity::K14 => "14",
            Purity::K18 => "18",
            Purity::K22 => "22",
            Purity::K24 => "24",
        }
    }

    fn bands(self) -> Bands {
        match self {
            Purity::K14 => Bands::Sampled {
                gold: 585.50..=587.50,
                silver: 40.0..=60.0,
                zinc: 8.0..=12.0,
            },
            Purity::K18 => Bands::Sampled {
                gold: 750.90..=752.90,
                silver: 20.0..=40.0,
                zinc: 6.0..=9.0,
            },
            Purity::K22 => Bands::Sampled {
                gold: 916.90..=918.90,
                silver: 12.5..=20.0,
                zinc: 6.0..=7.0,
            },
            Purity::K24 => Bands::Fixed(Composition {
                gold: 995.0,
                silver: 5.0,
                copper: 0.0,
                zinc: 0.0,
            }),
        }
    }
}

impl fmt::Display for Purity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}K", self.code())
    }
}

enum Bands {
    Sampled {
        gold: RangeInclusive<f64>,
        silver: RangeInclusive<f64>,
        zinc: RangeInclusive<f64>,
    },
    Fixed(Composition),
}

/// Parts per thousand of each generated metal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub gold: f64,
    pub silver: f64,
    pub copper: f64,
    pub zinc: f64,
}

impl Composition {
    pub fn total(&self) -> f64 {
        self.gold + self.silver + self.copper + self.zinc
    }
}

/// Draws compositions from a caller-supplied random source.
pub struct CompositionGenerator<R> {
    rng: R,
}

impl<R: Rng> CompositionGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Samples a composition for `purity` whose four components sum to
    /// exactly 1000 after rounding to 3 decimals.
    pub fn generate(&mut self, purity: Purity) -> Result<Composition, CompositionError> {
        match purity.bands() {
            Bands::Fixed(composition) => Ok(composition),
            Bands::Sampled { gold, silver, zinc } => self.sample(purity, &gold, &silver, &zinc),
        }
    }

    fn sample(
        &mut self,
        purity: Purity,
        gold_band: &RangeInclusive<f64>,
        silver_band: &RangeInclusive<f64>,
        zinc_band: &RangeInclusive<f64>,
    ) -> Result<Composition, CompositionError> {
        for _ in 0..MAX_SAMPLING_ATTEMPTS {
            let gold = round3(self.rng.gen_range(gold_band.clone()));
            let silver = round3(self.rng.gen_range(silver_band.clone()));
            let zinc = round3(self.rng.gen_range(zinc_band.clone()));
            let copper = round3(TOTAL - gold - silver - zinc);

            let candidate = Composition {
                gold,
                silver,
                copper,
                zinc,
            };
            if copper >= 0.0 && candidate.total() == TOTAL {
                return Ok(candidate);
            }
        }

        Err(CompositionError::Exhausted {
            purity,
            attempts: MAX_SAMPLING_ATTEMPTS,
        })
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn seeded(seed: u64) -> CompositionGenerator<StdRng> {
        CompositionGenerator::new(StdRng::seed_from_u64(seed))
    }

    fn decimals_at_most_three(value: f64) -> bool {
        ((value * 1000.0).round() / 1000.0 - value).abs() < 1e-9
    }

    #[test]
    fn every_purity_sums_to_exactly_one_thousand() {
        let mut generator = seeded(7);
        for purity in Purity::ALL {
            for _ in 0..200 {
                let c = generator.generate(purity).unwrap();
                assert_eq!(c.total(), 1000.0, "{purity}: {c:?}");
            }
        }
    }

    #[test]
    fn sampled_values_stay_inside_their_bands() {
        let mut generator = seeded(42);
        for _ in 0..500 {
            let c = generator.generate(Purity::K22).unwrap();
            assert!((916.90..=918.90).contains(&c.gold), "{c:?}");
            assert!((12.5..=20.0).contains(&c.silver), "{c:?}");
            assert!((6.0..=7.0).contains(&c.zinc), "{c:?}");
            assert!(c.copper > 0.0);
            assert!(decimals_at_most_three(c.gold));
            assert!(decimals_at_most_three(c.copper));
        }
    }

    #[test]
    fn twenty_four_karat_is_fixed() {
        let mut generator = seeded(1);
        let c = generator.generate(Purity::K24).unwrap();
        assert_eq!(
            c,
            Composition {
                gold: 995.0,
                silver: 5.0,
                copper: 0.0,
                zinc: 0.0
            }
        );
    }

    #[test]
    fn unsatisfiable_bands_exhaust_the_attempt_bound() {
        // Gold alone leaves no room for copper.
        let err = seeded(3)
            .sample(Purity::K22, &(999.0..=999.5), &(5.0..=6.0), &(1.0..=2.0))
            .unwrap_err();
        assert_eq!(
            err,
            CompositionError::Exhausted {
                purity: Purity::K22,
                attempts: MAX_SAMPLING_ATTEMPTS
            }
        );
        assert_eq!(
            crate::error::WorkflowError::from(err).kind(),
            crate::error::ErrorKind::GenerationExhausted
        );
    }

    #[test]
    fn declared_purity_prefix_is_parsed() {
        assert_eq!(Purity::from_declared("22K916").unwrap(), Purity::K22);
        assert_eq!(Purity::from_declared("18K750").unwrap(), Purity::K18);
        assert_eq!(Purity::from_declared(" 14K585").unwrap(), Purity::K14);
        assert_eq!(Purity::from_declared("24K995").unwrap(), Purity::K24);
    }

    #[test]
    fn unknown_purity_is_rejected() {
        assert_eq!(
            Purity::from_declared("20K833"),
            Err(CompositionError::InvalidPurity("20K833".into()))
        );
        assert!(matches!(
            Purity::from_declared(""),
            Err(CompositionError::InvalidPurity(_))
        ));
    }

    #[test]
    fn purity_display() {
        assert_eq!(Purity::K14.to_string(), "14K");
        assert_eq!(Purity::K22.to_string(), "22K");
    }
}
