// Purpose: To store constants that are used in the reduction
pub const ELEMENTARY_CHARGE: f64 = 1.602176634e-19; // Coulombs

// cps per nA of primary beam -> secondary ions per primary ion
pub const SECONDARY_ION_YIELD_FACTOR: f64 = ELEMENTARY_CHARGE * 1e9;

pub const DEAD_TIME_SCALE: f64 = 1e-9; // detector dead time is reported in ns
pub const PER_MIL: f64 = 1000.0;

// Mass-dependent fractionation exponents used for CAP values
pub const MDF_33S: f64 = 0.515; // relative to 34S/32S
pub const MDF_36S: f64 = 1.90; // relative to 34S/32S
pub const MDF_17O: f64 = 0.52; // relative to 18O/16O

// Skew-adjusted boxplot (Hubert & Vandervieren 2008)
pub const FENCE_SCALE: f64 = 1.5;
pub const FENCE_EXPONENTS_POSITIVE_SKEW: (f64, f64) = (-4.0, 3.0);
pub const FENCE_EXPONENTS_NEGATIVE_SKEW: (f64, f64) = (-3.0, 4.0);

pub const DEFAULT_ENSEMBLE_SIZE: usize = 10_000;
