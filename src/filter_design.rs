//! Filter Design — quantized coefficient generation
//!
//! Designs tap sets for the fixed-point [`FirFilter`] stages: a
//! Hamming-windowed sinc low-pass, a root-raised-cosine matched filter,
//! and the complex band-edge pair used by the frequency discriminator.
//! Designs are computed in floating point, then scaled so the largest
//! tap exactly fills the requested two's-complement coefficient width.
//!
//! Coefficients should usually be about 2 bits wider than the input
//! data word, which keeps the quantization noise the filter introduces
//! below the input's own quantization floor. Matched filters should use
//! an odd number of taps so the group delay is an integer number of
//! samples, putting one tap on the symbol's ideal sampling point.
//!
//! The band-edge design returns separate real and imaginary tap sets:
//! the complex band-edge pair reduces to four real-coefficient filters,
//! two multiplies and one subtraction (see
//! [`fll_band_edge`](crate::fll_band_edge)), so the complex filter is
//! never materialized.
//!
//! [`FirFilter`]: crate::fir_filter::FirFilter
//!
//! ## Example
//!
//! ```rust
//! use baseband_sync::filter_design::{accumulator_width_for, design_low_pass};
//!
//! let taps = design_low_pass(11, 100e3, 2e6, 14).unwrap();
//! assert_eq!(taps.len(), 11);
//! // the center tap fills the 14-bit coefficient range exactly
//! assert_eq!(taps[5], 8191);
//!
//! // accumulator sizing for a 12-bit input stream
//! let acc = accumulator_width_for(&taps, 12);
//! assert!(acc > 12);
//! ```

use std::f64::consts::PI;

use crate::types::{word, DspError, DspResult, Sample};

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

fn check_taps_and_width(num_taps: usize, coefficient_width: u32) -> DspResult<()> {
    if num_taps == 0 {
        return Err(DspError::InvalidDesignParameter(
            "filter needs at least one tap".into(),
        ));
    }
    if coefficient_width < 2 || !word::valid_width(coefficient_width) {
        return Err(DspError::InvalidDesignParameter(format!(
            "coefficient width {coefficient_width} outside 2..=63"
        )));
    }
    Ok(())
}

fn check_rates(symbol_rate: f64, sample_rate: f64, rolloff: f64) -> DspResult<()> {
    if !(symbol_rate > 0.0) || !(sample_rate > 0.0) {
        return Err(DspError::InvalidDesignParameter(
            "rates must be positive".into(),
        ));
    }
    if !(0.0..=1.0).contains(&rolloff) {
        return Err(DspError::InvalidDesignParameter(format!(
            "rolloff {rolloff} outside 0..=1"
        )));
    }
    Ok(())
}

/// Scale and round a floating-point design so the limiting tap exactly
/// fills the `width`-bit two's-complement range.
fn quantize_with_limit(coeffs: &[f64], limit: f64, width: u32) -> Vec<Sample> {
    if limit == 0.0 {
        return vec![0; coeffs.len()];
    }
    let scale = if limit > 0.0 {
        word::max_value(width) as f64 / limit.abs()
    } else {
        word::min_value(width).unsigned_abs() as f64 / limit.abs()
    };
    coeffs
        .iter()
        .map(|&c| word::saturate((c * scale).round() as Sample, width))
        .collect()
}

/// The design value with the largest magnitude (keeping its sign).
fn limiting_value(coeffs: &[f64]) -> f64 {
    coeffs
        .iter()
        .fold(0.0f64, |m, &c| if c.abs() > m.abs() { c } else { m })
}

fn quantize(coeffs: &[f64], width: u32) -> Vec<Sample> {
    quantize_with_limit(coeffs, limiting_value(coeffs), width)
}

/// Hamming-windowed sinc low-pass, quantized to `coefficient_width` bits.
pub fn design_low_pass(
    num_taps: usize,
    cutoff_hz: f64,
    sample_rate: f64,
    coefficient_width: u32,
) -> DspResult<Vec<Sample>> {
    check_taps_and_width(num_taps, coefficient_width)?;
    if !(sample_rate > 0.0) || !(cutoff_hz > 0.0) || cutoff_hz >= sample_rate / 2.0 {
        return Err(DspError::InvalidDesignParameter(format!(
            "cutoff {cutoff_hz} Hz outside (0, {}/2)",
            sample_rate
        )));
    }

    let fc = cutoff_hz / sample_rate;
    let m = num_taps - 1;
    let mut coeffs = vec![0.0f64; num_taps];
    for (i, c) in coeffs.iter_mut().enumerate() {
        let n = i as f64 - m as f64 / 2.0;
        // Hamming window written symmetrically around the center tap
        let window = if m == 0 {
            1.0
        } else {
            0.54 + 0.46 * (2.0 * PI * n / m as f64).cos()
        };
        *c = 2.0 * fc * sinc(2.0 * fc * n) * window;
    }

    // unity DC gain before quantization
    let sum: f64 = coeffs.iter().sum();
    if sum.abs() > 1e-12 {
        for c in &mut coeffs {
            *c /= sum;
        }
    }

    Ok(quantize(&coeffs, coefficient_width))
}

/// Root-raised-cosine impulse response, quantized to
/// `coefficient_width` bits.
pub fn design_rrc(
    num_taps: usize,
    rolloff: f64,
    symbol_rate: f64,
    sample_rate: f64,
    coefficient_width: u32,
) -> DspResult<Vec<Sample>> {
    check_taps_and_width(num_taps, coefficient_width)?;
    check_rates(symbol_rate, sample_rate, rolloff)?;

    let mut coeffs = vec![0.0f64; num_taps];
    for (i, c) in coeffs.iter_mut().enumerate() {
        // time in symbol periods
        let t = (i as f64 - (num_taps - 1) as f64 / 2.0) * symbol_rate / sample_rate;
        *c = if t.abs() < 1e-12 {
            (1.0 - rolloff) + 4.0 * rolloff / PI
        } else if rolloff > 0.0 && (t.abs() - 1.0 / (4.0 * rolloff)).abs() < 1e-12 {
            rolloff / 2.0f64.sqrt()
                * ((1.0 + 2.0 / PI) * (PI / (4.0 * rolloff)).sin()
                    + (1.0 - 2.0 / PI) * (PI / (4.0 * rolloff)).cos())
        } else {
            let num = (PI * t * (1.0 - rolloff)).sin()
                + 4.0 * rolloff * t * (PI * t * (1.0 + rolloff)).cos();
            let den = PI * t * (1.0 - (4.0 * rolloff * t).powi(2));
            if den.abs() < 1e-20 {
                0.0
            } else {
                num / den
            }
        };
    }

    Ok(quantize(&coeffs, coefficient_width))
}

/// Band-edge filter pair, quantized to `coefficient_width` bits.
///
/// The prototype is a half-sine response centered at DC (a pair of
/// half-offset sincs in time), shifted up to the band edge at
/// `(1 + rolloff) * symbol_rate / 2`. Returns the real and imaginary
/// tap sets; the negative band-edge filter is the conjugate and needs
/// no taps of its own. Both sets share one scaling factor so their
/// relative gain is preserved.
pub fn design_band_edge(
    num_taps: usize,
    rolloff: f64,
    symbol_rate: f64,
    sample_rate: f64,
    coefficient_width: u32,
) -> DspResult<(Vec<Sample>, Vec<Sample>)> {
    check_taps_and_width(num_taps, coefficient_width)?;
    check_rates(symbol_rate, sample_rate, rolloff)?;

    let sps = sample_rate / symbol_rate;
    let mut real = vec![0.0f64; num_taps];
    let mut imag = vec![0.0f64; num_taps];
    for i in 0..num_taps {
        // time in samples around the filter center
        let t = i as f64 - (num_taps - 1) as f64 / 2.0;
        let envelope = sinc(2.0 * rolloff * t / sps - 0.5) + sinc(2.0 * rolloff * t / sps + 0.5);
        let phase = 2.0 * PI * t * (1.0 + rolloff) / (2.0 * sps);
        real[i] = envelope * phase.cos();
        imag[i] = envelope * phase.sin();
    }

    let limit_real = limiting_value(&real);
    let limit_imag = limiting_value(&imag);
    let limit = if limit_imag.abs() > limit_real.abs() {
        limit_imag
    } else {
        limit_real
    };

    Ok((
        quantize_with_limit(&real, limit, coefficient_width),
        quantize_with_limit(&imag, limit, coefficient_width),
    ))
}

/// Accumulator width required by a [`FirFilter`](crate::fir_filter::FirFilter)
/// over these taps: `input_width + ceil(log2(sum |taps|))`.
pub fn accumulator_width_for(taps: &[Sample], input_width: u32) -> u32 {
    input_width + word::ceil_log2(word::sum_abs(taps))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_pass_rejects_bad_parameters() {
        assert!(design_low_pass(0, 100e3, 2e6, 14).is_err());
        assert!(design_low_pass(11, 100e3, 2e6, 1).is_err());
        assert!(design_low_pass(11, 0.0, 2e6, 14).is_err());
        assert!(design_low_pass(11, 1.1e6, 2e6, 14).is_err());
    }

    #[test]
    fn test_low_pass_is_symmetric_with_full_scale_peak() {
        let taps = design_low_pass(15, 100e3, 2e6, 14).unwrap();
        assert_eq!(taps.len(), 15);
        for i in 0..15 {
            assert_eq!(taps[i], taps[14 - i], "linear phase requires symmetry");
        }
        let peak = *taps.iter().max().unwrap();
        assert_eq!(peak, word::max_value(14), "limiting tap must fill the width");
        assert_eq!(taps[7], peak, "peak sits at the center tap");
    }

    #[test]
    fn test_low_pass_dc_gain_is_positive() {
        let taps = design_low_pass(21, 50e3, 1e6, 12).unwrap();
        let sum: Sample = taps.iter().sum();
        assert!(sum > 0, "low-pass must pass DC, got sum {sum}");
    }

    #[test]
    fn test_rrc_center_tap_dominates() {
        let taps = design_rrc(21, 0.5, 500e3, 2e6, 14).unwrap();
        assert_eq!(taps.len(), 21);
        let center = taps[10];
        assert_eq!(center, word::max_value(14));
        for (i, &t) in taps.iter().enumerate() {
            assert!(t <= center, "tap {i} exceeds the center tap");
            assert_eq!(t, taps[20 - i], "RRC must be symmetric");
        }
    }

    #[test]
    fn test_rrc_zero_rolloff_is_a_sinc() {
        // alpha = 0 degenerates to sin(pi t)/(pi t): zero at integer
        // symbol offsets away from the center
        let taps = design_rrc(17, 0.0, 500e3, 2e6, 14).unwrap();
        // taps 4 samples apart from the center are whole-symbol offsets
        assert_eq!(taps[0], 0);
        assert_eq!(taps[4], 0);
        assert_eq!(taps[12], 0);
        assert_eq!(taps[16], 0);
        assert!(taps[8] > 0);
    }

    #[test]
    fn test_band_edge_symmetry() {
        let (real, imag) = design_band_edge(21, 0.5, 500e3, 2e6, 14).unwrap();
        assert_eq!(real.len(), 21);
        assert_eq!(imag.len(), 21);
        for i in 0..21 {
            assert_eq!(real[i], real[20 - i], "real part must be even");
            assert_eq!(imag[i], -imag[20 - i], "imaginary part must be odd");
        }
        assert_eq!(imag[10], 0, "center of the odd part is zero");
    }

    #[test]
    fn test_band_edge_shares_one_scale() {
        let (real, imag) = design_band_edge(21, 0.35, 500e3, 2e6, 12).unwrap();
        let peak = real
            .iter()
            .chain(imag.iter())
            .map(|t| t.unsigned_abs())
            .max()
            .unwrap();
        // one of the two sets carries the limiting tap at full scale
        let full = word::max_value(12).unsigned_abs();
        let full_neg = word::min_value(12).unsigned_abs();
        assert!(
            peak == full || peak == full_neg,
            "limiting tap must fill the coefficient width, got {peak}"
        );
    }

    #[test]
    fn test_accumulator_width_for_growth_bound() {
        // sum |taps| = 96 -> 7 bits of growth
        assert_eq!(accumulator_width_for(&[32, -32, 32], 12), 19);
        // single unit tap adds nothing
        assert_eq!(accumulator_width_for(&[1], 12), 12);
    }

    #[test]
    fn test_designed_taps_feed_a_fir_filter() {
        use crate::fir_filter::{FirFilter, FirFilterConfig};
        use crate::handshake::Stage;

        let taps = design_low_pass(11, 100e3, 2e6, 14).unwrap();
        let config = FirFilterConfig {
            input_width: 12,
            accumulator_width: accumulator_width_for(&taps, 12),
            output_truncation_bits: 0,
            top_bits_to_drop: 0,
            coefficients: taps.clone(),
        };
        let mut fir = FirFilter::new(config).unwrap();

        // impulse replays the designed taps
        let mut observed = Vec::new();
        observed.push(fir.clock(1, true, true).value);
        for _ in 1..taps.len() {
            observed.push(fir.clock(0, true, true).value);
        }
        assert_eq!(observed, taps);
    }
}
