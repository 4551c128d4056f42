//! FIR Filter — transposed-form fixed-point filter with bit-growth accounting
//!
//! Generic tapped filter operating on two's-complement words. The filter
//! keeps one accumulator per tap, updated in transposed form so each
//! accepted sample touches every accumulator exactly once:
//!
//! ```text
//!          x ──┬──────────┬──────────┬─ ... ─┐
//!              │*c[0]     │*c[1]     │*c[2]  │*c[N-1]
//!              ▼          ▼          ▼       ▼
//!   out ◄── [acc 0] ◄── [acc 1] ◄── ...  ◄─ [acc N-1]
//! ```
//!
//! Accumulators are wider than the input to absorb growth; the output is
//! a width-reduced view of the first accumulator that drops
//! `output_truncation_bits` low bits (the filter's designed DC gain as a
//! power of two) and `top_bits_to_drop` high bits, clamping to the
//! output range when the dropped high bits disagree.
//!
//! ## Example
//!
//! ```rust
//! use baseband_sync::fir_filter::{FirFilter, FirFilterConfig};
//! use baseband_sync::handshake::Stage;
//!
//! let config = FirFilterConfig {
//!     coefficients: vec![3, -2, 5],
//!     input_width: 12,
//!     accumulator_width: 16,
//!     output_truncation_bits: 0,
//!     top_bits_to_drop: 0,
//! };
//! let mut fir = FirFilter::new(config).unwrap();
//!
//! // a unit impulse replays the coefficient vector, one tap per cycle
//! assert_eq!(fir.clock(1, true, true).value, 3);
//! assert_eq!(fir.clock(0, true, true).value, -2);
//! assert_eq!(fir.clock(0, true, true).value, 5);
//! ```

use serde::{Deserialize, Serialize};

use crate::handshake::{OutputReg, Stage, StreamOut};
use crate::types::{word, DspError, DspResult, Sample};

/// Construction-time configuration of a [`FirFilter`].
///
/// All fields are fixed for the lifetime of the filter instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirFilterConfig {
    /// Tap coefficients, applied newest-sample-first. Never mutated.
    pub coefficients: Vec<Sample>,
    /// Width of input samples in bits.
    pub input_width: u32,
    /// Width of each accumulator in bits. Must cover
    /// `input_width + ceil(log2(sum |coefficients|))`.
    pub accumulator_width: u32,
    /// Low-order bits dropped from the output view.
    pub output_truncation_bits: u32,
    /// High-order bits dropped from the output view.
    pub top_bits_to_drop: u32,
}

impl FirFilterConfig {
    /// Width of the output word after both drops.
    pub fn output_width(&self) -> u32 {
        self.accumulator_width - self.output_truncation_bits - self.top_bits_to_drop
    }
}

/// Transposed-form fixed-point FIR filter.
///
/// Accepted inputs update all accumulators at `accumulator_width` with
/// wraparound; the output view saturates instead. One cycle of latency
/// from accepted input to valid output.
#[derive(Debug, Clone)]
pub struct FirFilter {
    config: FirFilterConfig,
    /// Transposed-form accumulators, `acc[0]` feeding the output view.
    acc: Vec<Sample>,
    out: OutputReg,
}

impl FirFilter {
    /// Build a filter, validating the configuration.
    ///
    /// Rejected configurations: an empty coefficient vector, widths
    /// outside 1..=63, a truncated output narrower than the input
    /// (`accumulator_width - output_truncation_bits < input_width`),
    /// an accumulator that cannot absorb the worst-case growth
    /// `input_width + ceil(log2(sum |coefficients|))`, or drops that
    /// leave no output bits.
    pub fn new(config: FirFilterConfig) -> DspResult<Self> {
        if config.coefficients.is_empty() {
            return Err(DspError::EmptyCoefficients);
        }
        if !word::valid_width(config.input_width) {
            return Err(DspError::InvalidWidth(config.input_width));
        }
        if !word::valid_width(config.accumulator_width) {
            return Err(DspError::InvalidWidth(config.accumulator_width));
        }
        let truncated = config
            .accumulator_width
            .checked_sub(config.output_truncation_bits)
            .ok_or(DspError::InvalidWidth(config.output_truncation_bits))?;
        if truncated < config.input_width {
            return Err(DspError::InsufficientAccumulatorWidth {
                accumulator: config.accumulator_width,
                required: config.input_width + config.output_truncation_bits,
            });
        }
        let required = config.input_width + word::ceil_log2(word::sum_abs(&config.coefficients));
        if config.accumulator_width < required {
            return Err(DspError::InsufficientAccumulatorWidth {
                accumulator: config.accumulator_width,
                required,
            });
        }
        match truncated.checked_sub(config.top_bits_to_drop) {
            Some(w) if word::valid_width(w) => {}
            _ => return Err(DspError::InvalidWidth(config.top_bits_to_drop)),
        }

        let taps = config.coefficients.len();
        Ok(Self {
            config,
            acc: vec![0; taps],
            out: OutputReg::new(),
        })
    }

    /// The filter's configuration.
    pub fn config(&self) -> &FirFilterConfig {
        &self.config
    }

    /// Width of the output word.
    pub fn output_width(&self) -> u32 {
        self.config.output_width()
    }

    /// Width-reduce the first accumulator into the output word.
    fn reduce(&self, acc0: Sample) -> Sample {
        let shifted = acc0 >> self.config.output_truncation_bits;
        let out_width = self.config.output_width();
        // True overflow shows as the dropped high bits disagreeing with
        // the result's sign bit; clamp by the accumulator's sign instead
        // of producing wrapped garbage.
        // TODO: revisit whether this check is sufficient for the widened
        // products of the frequency discrimination path (fll_band_edge).
        if word::fits(shifted, out_width) {
            shifted
        } else if shifted < 0 {
            word::min_value(out_width)
        } else {
            word::max_value(out_width)
        }
    }
}

impl Stage for FirFilter {
    type Input = Sample;

    fn clock(&mut self, input: Sample, input_valid: bool, out_ready: bool) -> StreamOut {
        if input_valid {
            let aw = self.config.accumulator_width;
            let n = self.acc.len();
            // Ascending order reads acc[i + 1] before it is overwritten,
            // reproducing the simultaneous register update.
            for i in 0..n - 1 {
                self.acc[i] = word::wrap(input * self.config.coefficients[i] + self.acc[i + 1], aw);
            }
            self.acc[n - 1] = word::wrap(input * self.config.coefficients[n - 1], aw);
            let reduced = self.reduce(self.acc[0]);
            self.out.update(Some(reduced), out_ready);
        } else {
            self.out.update(None, out_ready);
        }
        self.out.get()
    }

    fn output(&self) -> StreamOut {
        self.out.get()
    }

    fn reset(&mut self) {
        self.acc.fill(0);
        self.out.reset();
    }
}
