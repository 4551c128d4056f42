//! Band-Edge Frequency Discriminator — frequency-locked correction path
//!
//! Coarse frequency-offset detection for pulse-shaped signals. A complex
//! band-edge filter pair is decomposed into four real-coefficient FIR
//! filters so the whole path runs in fixed point with real multipliers:
//!
//! ```text
//!        ┌► [I × h_imag] ─┐
//!  I ────┤                ├─► (i·h_imag)(q·h_real) ─┐
//!        └► [I × h_real] ─┤                          ├─► a - b ─► [loop filter] ─► out
//!        ┌► [Q × h_real] ─┤                          │
//!  Q ────┤                ├─► (i·h_real)(q·h_imag) ─┘
//!        └► [Q × h_imag] ─┘
//! ```
//!
//! The cross product is the imaginary part of the band-edge power
//! difference; it grows to `2W-1` bits and the subtraction to `2W`,
//! where `W` is the shared FIR output width. Each arithmetic step is
//! pipelined by exactly one cycle and propagates the upstream filter's
//! `valid` unchanged. The resulting frequency-error term feeds a loop
//! filter, configured as either a FIR or a CIC instance, whose output is
//! the correction value handed to the external loop controller.
//!
//! ## Example
//!
//! ```rust
//! use baseband_sync::fir_filter::FirFilterConfig;
//! use baseband_sync::fll_band_edge::{FllBandEdge, FllBandEdgeConfig, LoopFilterConfig};
//! use baseband_sync::handshake::Stage;
//! use num_complex::Complex;
//!
//! let config = FllBandEdgeConfig {
//!     taps_real: vec![1, 0],
//!     taps_imag: vec![0, 1],
//!     input_width: 8,
//!     accumulator_width: 8,
//!     output_truncation_bits: 0,
//!     top_bits_to_drop: 0,
//!     loop_filter: LoopFilterConfig::Fir(FirFilterConfig {
//!         coefficients: vec![1],
//!         input_width: 16,
//!         accumulator_width: 16,
//!         output_truncation_bits: 0,
//!         top_bits_to_drop: 0,
//!     }),
//! };
//! let mut fll = FllBandEdge::new(config).unwrap();
//! let mut last = 0;
//! for n in 1..40 {
//!     let out = fll.clock(Complex::new(n, 1), true, true);
//!     if out.valid {
//!         last = out.value;
//!     }
//! }
//! // h_imag delays I by one sample, h_real passes Q: error settles at -1
//! assert_eq!(last, -1);
//! ```

use serde::{Deserialize, Serialize};

use crate::cic_filter::{CicConfig, CicDecimator};
use crate::fir_filter::{FirFilter, FirFilterConfig};
use crate::handshake::{OutputReg, Stage, StreamOut};
use crate::types::{word, DspError, DspResult, IqSample, Sample};

/// Loop filter selection for the correction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopFilterConfig {
    /// FIR loop filter over the frequency-error term.
    Fir(FirFilterConfig),
    /// CIC decimating loop filter over the frequency-error term.
    Cic(CicConfig),
}

/// Construction-time configuration of an [`FllBandEdge`].
///
/// The four internal FIR filters share one width configuration; only
/// their coefficient sets differ (real vs imaginary band-edge taps).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FllBandEdgeConfig {
    /// Real part of the band-edge prototype taps.
    pub taps_real: Vec<Sample>,
    /// Imaginary part of the band-edge prototype taps.
    pub taps_imag: Vec<Sample>,
    /// Width of the I and Q input samples in bits.
    pub input_width: u32,
    /// Accumulator width shared by the four filters.
    pub accumulator_width: u32,
    /// Low-order bits dropped from each filter output.
    pub output_truncation_bits: u32,
    /// High-order bits dropped from each filter output.
    pub top_bits_to_drop: u32,
    /// Loop filter fed by the frequency-error term.
    pub loop_filter: LoopFilterConfig,
}

#[derive(Debug, Clone)]
enum LoopFilter {
    Fir(FirFilter),
    Cic(CicDecimator),
}

impl LoopFilter {
    fn clock(&mut self, input: Sample, input_valid: bool, out_ready: bool) -> StreamOut {
        match self {
            LoopFilter::Fir(f) => f.clock(input, input_valid, out_ready),
            LoopFilter::Cic(c) => c.clock(input, input_valid, out_ready),
        }
    }

    fn output(&self) -> StreamOut {
        match self {
            LoopFilter::Fir(f) => f.output(),
            LoopFilter::Cic(c) => c.output(),
        }
    }

    fn output_width(&self) -> u32 {
        match self {
            LoopFilter::Fir(f) => f.output_width(),
            LoopFilter::Cic(c) => c.output_width(),
        }
    }

    fn input_width(&self) -> u32 {
        match self {
            LoopFilter::Fir(f) => f.config().input_width,
            LoopFilter::Cic(c) => c.config().input_length_bits,
        }
    }

    fn reset(&mut self) {
        match self {
            LoopFilter::Fir(f) => f.reset(),
            LoopFilter::Cic(c) => c.reset(),
        }
    }
}

/// Band-edge frequency discriminator with loop filter.
#[derive(Debug, Clone)]
pub struct FllBandEdge {
    config: FllBandEdgeConfig,
    fir_i_real: FirFilter,
    fir_i_imag: FirFilter,
    fir_q_real: FirFilter,
    fir_q_imag: FirFilter,
    product_width: u32,
    difference_width: u32,
    // one pipeline register per arithmetic step
    product_a: OutputReg,
    product_b: OutputReg,
    difference: OutputReg,
    loop_filter: LoopFilter,
}

impl FllBandEdge {
    /// Build the discriminator, validating tap sets and widths.
    pub fn new(config: FllBandEdgeConfig) -> DspResult<Self> {
        if config.taps_real.len() != config.taps_imag.len() {
            return Err(DspError::InvalidDesignParameter(format!(
                "band-edge tap sets must have equal length, got {} and {}",
                config.taps_real.len(),
                config.taps_imag.len()
            )));
        }

        let fir_config = |taps: &[Sample]| FirFilterConfig {
            coefficients: taps.to_vec(),
            input_width: config.input_width,
            accumulator_width: config.accumulator_width,
            output_truncation_bits: config.output_truncation_bits,
            top_bits_to_drop: config.top_bits_to_drop,
        };
        let fir_i_real = FirFilter::new(fir_config(&config.taps_real))?;
        let fir_i_imag = FirFilter::new(fir_config(&config.taps_imag))?;
        let fir_q_real = FirFilter::new(fir_config(&config.taps_real))?;
        let fir_q_imag = FirFilter::new(fir_config(&config.taps_imag))?;

        let filter_width = fir_i_real.output_width();
        let product_width = 2 * filter_width - 1;
        let difference_width = 2 * filter_width;
        if !word::valid_width(difference_width) {
            return Err(DspError::InvalidWidth(difference_width));
        }

        let loop_filter = match &config.loop_filter {
            LoopFilterConfig::Fir(cfg) => LoopFilter::Fir(FirFilter::new(cfg.clone())?),
            LoopFilterConfig::Cic(cfg) => LoopFilter::Cic(CicDecimator::new(*cfg)?),
        };
        if loop_filter.input_width() != difference_width {
            return Err(DspError::InvalidDesignParameter(format!(
                "loop filter input width {} must match the discriminator difference width {}",
                loop_filter.input_width(),
                difference_width
            )));
        }

        tracing::debug!(
            taps = config.taps_real.len(),
            filter_bits = filter_width,
            difference_bits = difference_width,
            output_bits = loop_filter.output_width(),
            "built band-edge frequency discriminator"
        );

        Ok(Self {
            config,
            fir_i_real,
            fir_i_imag,
            fir_q_real,
            fir_q_imag,
            product_width,
            difference_width,
            product_a: OutputReg::new(),
            product_b: OutputReg::new(),
            difference: OutputReg::new(),
            loop_filter,
        })
    }

    /// The discriminator's configuration.
    pub fn config(&self) -> &FllBandEdgeConfig {
        &self.config
    }

    /// Width of the frequency-error term, `2 * filter_output_width`.
    pub fn difference_width(&self) -> u32 {
        self.difference_width
    }

    /// Width of the correction output (the loop filter's output width).
    pub fn output_width(&self) -> u32 {
        self.loop_filter.output_width()
    }
}

impl Stage for FllBandEdge {
    type Input = IqSample;

    /// One edge of the whole path, clocked consumer-first so every
    /// register samples its upstream's previous-edge value.
    fn clock(&mut self, input: IqSample, input_valid: bool, out_ready: bool) -> StreamOut {
        // loop filter consumes the subtract register
        let diff = self.difference.get();
        self.loop_filter.clock(diff.value, diff.valid, out_ready);

        // subtract stage consumes the two product registers; its valid
        // is the products' valid, passed through unchanged.
        let a = self.product_a.get();
        let b = self.product_b.get();
        let diff_new = a
            .valid
            .then(|| word::wrap(a.value - b.value, self.difference_width));
        self.difference.update(diff_new, true);

        // product stage consumes the four filter outputs in lock-step;
        // the products wrap at their documented width.
        // TODO: saturation coverage of these widened products against
        // the FIR output clamp has not been verified end to end.
        let i_real = self.fir_i_real.output();
        let i_imag = self.fir_i_imag.output();
        let q_real = self.fir_q_real.output();
        let q_imag = self.fir_q_imag.output();
        let prod_a = i_imag
            .valid
            .then(|| word::wrap(i_imag.value * q_real.value, self.product_width));
        let prod_b = i_imag
            .valid
            .then(|| word::wrap(i_real.value * q_imag.value, self.product_width));
        self.product_a.update(prod_a, true);
        self.product_b.update(prod_b, true);

        // the four filters consume the I/Q input pair
        self.fir_i_real.clock(input.re, input_valid, true);
        self.fir_i_imag.clock(input.re, input_valid, true);
        self.fir_q_real.clock(input.im, input_valid, true);
        self.fir_q_imag.clock(input.im, input_valid, true);

        self.loop_filter.output()
    }

    fn output(&self) -> StreamOut {
        self.loop_filter.output()
    }

    fn reset(&mut self) {
        self.fir_i_real.reset();
        self.fir_i_imag.reset();
        self.fir_q_real.reset();
        self.fir_q_imag.reset();
        self.product_a.reset();
        self.product_b.reset();
        self.difference.reset();
        self.loop_filter.reset();
    }
}
