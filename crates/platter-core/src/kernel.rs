//! Precomputed windowed-sinc interpolation kernel
//!
//! Variable-rate playback reads the source at fractional frame positions.
//! Evaluating a band-limited sinc for every output sample is too expensive
//! for the audio callback, so the kernel is tabulated once: the unit
//! interval is quantized into [`SUBDIVISION_STEPS`] buckets and each bucket
//! stores [`TAP_COUNT`] convolution coefficients (sinc × Kaiser window,
//! normalized to unit DC gain).
//!
//! ## References
//!
//! - CCRMA Stanford: Digital Audio Resampling (https://ccrma.stanford.edu/~jos/resample/)
//! - Kaiser & Schafer, "On the use of the I0-sinh window for spectrum analysis"

use std::f64::consts::PI;
use std::sync::OnceLock;

/// Fractional-phase resolution of the table
pub const SUBDIVISION_STEPS: usize = 1024;

/// Convolution width in source frames
pub const TAP_COUNT: usize = 16;

/// Kaiser window shape parameter. 8.0 puts the first sidelobe around
/// -80 dB, inaudible under scratch playback.
pub const KAISER_BETA: f64 = 8.0;

/// Row sums below this magnitude are left unnormalized
const NORMALIZE_EPSILON: f64 = 1e-6;

/// A table of windowed-sinc interpolation coefficients
///
/// Immutable once built; the process-wide instance from [`KernelTable::shared`]
/// may be read concurrently from any thread, including the audio callback.
pub struct KernelTable {
    /// Flat `subdivision_steps * tap_count` coefficient matrix, row-major
    coeffs: Vec<f32>,
    subdivision_steps: usize,
    tap_count: usize,
}

impl KernelTable {
    /// Build a table with explicit parameters
    ///
    /// The default table comes from [`KernelTable::shared`]; explicit
    /// construction exists for tests and offline analysis.
    pub fn new(subdivision_steps: usize, tap_count: usize, beta: f64) -> Self {
        let mut coeffs = vec![0.0f32; subdivision_steps * tap_count];
        let center = (tap_count / 2) as isize - 1;

        for bucket in 0..subdivision_steps {
            let frac = bucket as f64 / subdivision_steps as f64;
            let row = &mut coeffs[bucket * tap_count..(bucket + 1) * tap_count];

            let mut sum = 0.0f64;
            for (tap, coeff) in row.iter_mut().enumerate() {
                let sinc_point = (tap as isize - center) as f64 - frac;
                let sinc = if sinc_point.abs() < 1e-9 {
                    1.0
                } else {
                    (PI * sinc_point).sin() / (PI * sinc_point)
                };

                // Map the tap index onto [-1, 1] across the tap span
                let t = if tap_count > 1 {
                    2.0 * tap as f64 / (tap_count - 1) as f64 - 1.0
                } else {
                    0.0
                };
                // Floating error can push 1 - t² slightly negative at the edges
                let window = bessel_i0(beta * (1.0 - t * t).max(0.0).sqrt()) / bessel_i0(beta);

                let c = sinc * window;
                *coeff = c as f32;
                sum += c;
            }

            // Unit DC gain per row; a near-zero raw sum would blow up the
            // division, so such rows are left as computed
            if sum.abs() > NORMALIZE_EPSILON {
                let inv = (1.0 / sum) as f32;
                for coeff in row.iter_mut() {
                    *coeff *= inv;
                }
            }
        }

        Self {
            coeffs,
            subdivision_steps,
            tap_count,
        }
    }

    /// The process-wide table, built lazily on first use
    pub fn shared() -> &'static KernelTable {
        static TABLE: OnceLock<KernelTable> = OnceLock::new();
        TABLE.get_or_init(|| KernelTable::new(SUBDIVISION_STEPS, TAP_COUNT, KAISER_BETA))
    }

    /// Number of coefficients per row
    #[inline]
    pub fn tap_count(&self) -> usize {
        self.tap_count
    }

    /// Fractional-phase resolution
    #[inline]
    pub fn subdivision_steps(&self) -> usize {
        self.subdivision_steps
    }

    /// Look up the coefficient row for a fractional phase in `[0, 1)`
    ///
    /// The bucket index clamps to the last row so a phase of exactly 1.0
    /// (possible through floating rounding) stays in range.
    #[inline]
    pub fn row(&self, frac: f64) -> &[f32] {
        let bucket =
            ((frac * self.subdivision_steps as f64) as usize).min(self.subdivision_steps - 1);
        &self.coeffs[bucket * self.tap_count..(bucket + 1) * self.tap_count]
    }
}

/// Modified Bessel function of the first kind, order zero
///
/// Two-regime approximation: power series below 3.75, asymptotic expansion
/// above. Absolute error is below 2e-7 over the range used by the window.
fn bessel_i0(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 3.75 {
        let t = (x / 3.75) * (x / 3.75);
        1.0 + t
            * (3.5156229
                + t * (3.0899424
                    + t * (1.2067492 + t * (0.2659732 + t * (0.0360768 + t * 0.0045813)))))
    } else {
        let t = 3.75 / ax;
        (ax.exp() / ax.sqrt())
            * (0.39894228
                + t * (0.01328592
                    + t * (0.00225319
                        + t * (-0.00157565
                            + t * (0.00916281
                                + t * (-0.02057706
                                    + t * (0.02635537
                                        + t * (-0.01647633 + t * 0.00392377))))))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_row_sums_to_unity() {
        let table = KernelTable::new(SUBDIVISION_STEPS, TAP_COUNT, KAISER_BETA);
        for bucket in 0..table.subdivision_steps() {
            let frac = bucket as f64 / table.subdivision_steps() as f64;
            let row = table.row(frac);
            assert_eq!(row.len(), TAP_COUNT);
            let sum: f32 = row.iter().sum();
            assert!(
                (sum - 1.0).abs() < 1e-4,
                "bucket {} sums to {}",
                bucket,
                sum
            );
        }
    }

    #[test]
    fn test_zero_phase_row_is_unit_impulse() {
        // At frac = 0 the sinc hits its zero crossings on every tap except
        // the center, so the normalized row is a delta
        let table = KernelTable::new(64, TAP_COUNT, KAISER_BETA);
        let row = table.row(0.0);
        let center = TAP_COUNT / 2 - 1;
        for (tap, &c) in row.iter().enumerate() {
            if tap == center {
                assert!((c - 1.0).abs() < 1e-6, "center tap is {}", c);
            } else {
                assert!(c.abs() < 1e-6, "tap {} is {}", tap, c);
            }
        }
    }

    #[test]
    fn test_two_tap_table_degenerates_to_linear() {
        // With two taps the kernel reduces to a linear crossfade between
        // the bracketing frames
        let table = KernelTable::new(4, 2, KAISER_BETA);
        let row = table.row(0.0);
        assert!((row[0] - 1.0).abs() < 1e-6);
        assert!(row[1].abs() < 1e-6);
    }

    #[test]
    fn test_row_lookup_clamps_to_last_bucket() {
        let table = KernelTable::new(8, 4, KAISER_BETA);
        // frac == 1.0 must not index past the table
        let row = table.row(1.0);
        assert_eq!(row.len(), 4);
    }

    #[test]
    fn test_shared_table_is_built_once() {
        let a = KernelTable::shared() as *const KernelTable;
        let b = KernelTable::shared() as *const KernelTable;
        assert_eq!(a, b);
    }

    #[test]
    fn test_bessel_i0_reference_values() {
        // I0(0) = 1, I0(1) ≈ 1.2660658, I0(5) ≈ 27.239872
        assert!((bessel_i0(0.0) - 1.0).abs() < 1e-7);
        assert!((bessel_i0(1.0) - 1.2660658).abs() < 1e-5);
        assert!((bessel_i0(5.0) - 27.239872).abs() < 1e-3);
    }
}
