//! Gardner Timing Error Detector — symbol-rate error estimation
//!
//! Non-data-aided timing error detector for symbol clock recovery. The
//! detector shifts every accepted sample into a delay line spanning one
//! symbol period, but only recomputes its error estimate when an
//! external interpolator pulses `trigger` for one cycle:
//!
//! ```text
//!   error = (oldest - newest) * mid
//!
//!   newest ──► [0][1] ... [S/2-1] ... [S-1]
//!                   mid ──┘    oldest ──┘
//! ```
//!
//! With `S` samples per symbol (required even), `mid` sits half a symbol
//! behind the newest sample. Ordinary shift cycles leave the estimate
//! untouched. The error is a full-precision product: the output word is
//! `1 + 2*input_width` bits wide, so it can never overflow.
//!
//! [`GardnerTedIq`] runs two detectors in lock-step over an I/Q stream
//! and sums their estimates for QAM-shaped signals.
//!
//! ## Example
//!
//! ```rust
//! use baseband_sync::gardner_ted::GardnerTed;
//!
//! let mut ted = GardnerTed::new(12, 4).unwrap();
//!
//! // ramp input with the trigger held high: after the line fills,
//! // error = ((n-4) - n) * (n-2)
//! let mut last = 0;
//! for n in 0..10 {
//!     last = ted.clock(n, true, true, true).value;
//! }
//! let n = 9;
//! assert_eq!(last, ((n - 4) - n) * (n - 2));
//! ```

use crate::handshake::{OutputReg, StreamOut};
use crate::types::{word, DspError, DspResult, IqSample, Sample};

/// Gardner timing error detector for PAM-shaped (real-valued) signals.
#[derive(Debug, Clone)]
pub struct GardnerTed {
    input_width: u32,
    /// Delay line, index 0 = most recently stored sample.
    line: Vec<Sample>,
    out: OutputReg,
}

impl GardnerTed {
    /// Create a detector for `samples_per_symbol`-times oversampled input.
    ///
    /// `samples_per_symbol` must be even and nonzero so the mid-symbol
    /// tap exists; the derived output width `1 + 2*input_width` must be
    /// modelable.
    pub fn new(input_width: u32, samples_per_symbol: usize) -> DspResult<Self> {
        if !word::valid_width(input_width) {
            return Err(DspError::InvalidWidth(input_width));
        }
        if samples_per_symbol == 0 || samples_per_symbol % 2 != 0 {
            return Err(DspError::OddSamplesPerSymbol(samples_per_symbol));
        }
        let output_width = 1 + 2 * input_width;
        if !word::valid_width(output_width) {
            return Err(DspError::InvalidWidth(output_width));
        }
        Ok(Self {
            input_width,
            line: vec![0; samples_per_symbol],
            out: OutputReg::new(),
        })
    }

    /// Configured samples per symbol.
    pub fn samples_per_symbol(&self) -> usize {
        self.line.len()
    }

    /// Output word width, `1 + 2*input_width`.
    pub fn output_width(&self) -> u32 {
        1 + 2 * self.input_width
    }

    /// One clock edge.
    ///
    /// `input` is shifted into the delay line when `input_valid`;
    /// `trigger` is the external interpolator's one-cycle strobe and
    /// recomputes the error estimate from the pre-shift line and the
    /// sample currently on the input port.
    pub fn clock(
        &mut self,
        input: Sample,
        input_valid: bool,
        trigger: bool,
        out_ready: bool,
    ) -> StreamOut {
        let sps = self.line.len();
        let new = trigger.then(|| {
            let oldest = self.line[sps - 1];
            let mid = self.line[sps / 2 - 1];
            (oldest - input) * mid
        });
        if input_valid {
            self.line.rotate_right(1);
            self.line[0] = input;
        }
        self.out.update(new, out_ready);
        self.out.get()
    }

    /// The registered error estimate.
    pub fn output(&self) -> StreamOut {
        self.out.get()
    }

    /// Synchronous reset: clear the line and the estimate.
    pub fn reset(&mut self) {
        self.line.fill(0);
        self.out.reset();
    }
}

/// Gardner detector for QAM-shaped (complex-valued) signals.
///
/// Two independent PAM detectors share the same trigger and samples per
/// symbol; the error estimate is the sum of the in-phase and quadrature
/// estimates. The two run in lock-step by construction, so `valid` is
/// driven solely by the in-phase instance.
#[derive(Debug, Clone)]
pub struct GardnerTedIq {
    in_phase: GardnerTed,
    quadrature: GardnerTed,
}

impl GardnerTedIq {
    /// Create a QAM detector; same constraints as [`GardnerTed::new`],
    /// with one extra bit of output growth for the I+Q sum.
    pub fn new(input_width: u32, samples_per_symbol: usize) -> DspResult<Self> {
        let in_phase = GardnerTed::new(input_width, samples_per_symbol)?;
        let output_width = 2 + 2 * input_width;
        if !word::valid_width(output_width) {
            return Err(DspError::InvalidWidth(output_width));
        }
        Ok(Self {
            quadrature: in_phase.clone(),
            in_phase,
        })
    }

    /// Configured samples per symbol.
    pub fn samples_per_symbol(&self) -> usize {
        self.in_phase.samples_per_symbol()
    }

    /// Output word width, `2 + 2*input_width`.
    pub fn output_width(&self) -> u32 {
        self.in_phase.output_width() + 1
    }

    /// One clock edge over an I/Q sample pair.
    pub fn clock(
        &mut self,
        input: IqSample,
        input_valid: bool,
        trigger: bool,
        out_ready: bool,
    ) -> StreamOut {
        self.in_phase.clock(input.re, input_valid, trigger, out_ready);
        self.quadrature.clock(input.im, input_valid, trigger, out_ready);
        self.output()
    }

    /// Summed estimate; `valid` from the in-phase instance only.
    pub fn output(&self) -> StreamOut {
        let i = self.in_phase.output();
        let q = self.quadrature.output();
        StreamOut {
            value: i.value + q.value,
            valid: i.valid,
        }
    }

    /// Synchronous reset of both detectors.
    pub fn reset(&mut self) {
        self.in_phase.reset();
        self.quadrature.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex;

    #[test]
    fn test_construction_rejects_odd_samples_per_symbol() {
        assert_eq!(
            GardnerTed::new(12, 5).unwrap_err(),
            DspError::OddSamplesPerSymbol(5)
        );
        assert_eq!(
            GardnerTed::new(12, 0).unwrap_err(),
            DspError::OddSamplesPerSymbol(0)
        );
        assert!(GardnerTed::new(12, 4).is_ok());
    }

    #[test]
    fn test_construction_rejects_unmodelable_output_width() {
        // 1 + 2*32 = 65 bits of error word
        assert_eq!(
            GardnerTed::new(32, 4).unwrap_err(),
            DspError::InvalidWidth(65)
        );
        // the QAM variant needs one more bit: 2 + 2*31 = 64
        assert!(GardnerTed::new(31, 4).is_ok());
        assert_eq!(
            GardnerTedIq::new(31, 4).unwrap_err(),
            DspError::InvalidWidth(64)
        );
    }

    #[test]
    fn test_ramp_closed_form_over_many_symbols() {
        // sps = 4, input n, trigger held high:
        // error = ((n-4) - n) * (n-2) once the line is primed.
        let mut ted = GardnerTed::new(16, 4).unwrap();
        for n in 0..220 {
            let out = ted.clock(n, true, true, true);
            if n >= 4 {
                let expected = ((n - 4) - n) * (n - 2);
                assert_eq!(
                    out.value, expected,
                    "closed form mismatch at sample {n}"
                );
                assert!(out.valid);
            }
        }
    }

    #[test]
    fn test_no_recompute_without_trigger() {
        let mut ted = GardnerTed::new(12, 4).unwrap();
        for n in 0..8 {
            ted.clock(n, true, true, false);
        }
        let held = ted.output().value;

        // keep shifting with the trigger low: estimate must not change
        for n in 8..16 {
            let out = ted.clock(n, true, false, false);
            assert_eq!(out.value, held, "estimate must hold on shift-only cycles");
        }
    }

    #[test]
    fn test_valid_follows_trigger_not_shifts() {
        let mut ted = GardnerTed::new(12, 4).unwrap();
        // shift-only cycles produce no estimate
        for n in 0..4 {
            assert!(!ted.clock(n, true, false, true).valid);
        }
        // a trigger pulse does
        assert!(ted.clock(4, true, true, false).valid);
        // held while unacknowledged, cleared on ack
        assert!(ted.clock(5, true, false, false).valid);
        assert!(!ted.clock(6, true, false, true).valid);
    }

    #[test]
    fn test_trigger_without_new_sample_uses_port_value() {
        let mut ted = GardnerTed::new(12, 4).unwrap();
        for n in 0..4 {
            ted.clock(n, true, false, true);
        }
        // line (newest first): [3, 2, 1, 0]
        let out = ted.clock(10, false, true, true);
        assert_eq!(out.value, (0 - 10) * 1);
        // the line itself must be unchanged by the un-accepted sample
        let out = ted.clock(4, true, true, true);
        assert_eq!(out.value, (0 - 4) * 1);
    }

    #[test]
    fn test_shaped_transitions_on_time_error_is_zero() {
        // Alternating +100/-100 symbols with zero-valued transition
        // samples, 4 samples per symbol. Triggering on time places the
        // mid tap exactly on a transition zero, so the error vanishes;
        // triggering a sample late or early produces errors of opposite
        // sign.
        let pattern: [Sample; 8] = [100, 100, 0, -100, -100, -100, 0, 100];

        let run = |trigger_phase: usize| -> Vec<Sample> {
            let mut ted = GardnerTed::new(12, 4).unwrap();
            let mut errors = Vec::new();
            for n in 0usize..96 {
                let x = pattern[n % 8];
                let trigger = n % 4 == trigger_phase && n >= 8;
                let out = ted.clock(x, true, trigger, true);
                if out.valid {
                    errors.push(out.value);
                }
            }
            errors
        };

        assert!(run(0).iter().all(|&e| e == 0), "on-time error must be zero");
        assert!(run(1).iter().all(|&e| e == -20_000), "late error sign");
        assert!(run(3).iter().all(|&e| e == 20_000), "early error sign");
    }

    #[test]
    fn test_reset_clears_line_and_valid() {
        let mut ted = GardnerTed::new(12, 4).unwrap();
        for n in 0..6 {
            ted.clock(n + 10, true, true, false);
        }
        ted.reset();
        assert!(!ted.output().valid);
        // a trigger right after reset sees an all-zero line
        let out = ted.clock(7, true, true, true);
        assert_eq!(out.value, (0 - 7) * 0);
    }

    #[test]
    fn test_iq_sums_both_rails() {
        let mut iq = GardnerTedIq::new(12, 4).unwrap();
        let mut pam = GardnerTed::new(12, 4).unwrap();

        // Q = -I negates both product terms, so each rail contributes
        // the same estimate and the sum is exactly twice the PAM one.
        for n in 0..30 {
            let out = iq.clock(Complex::new(n, -n), true, true, true);
            let i_only = pam.clock(n, true, true, true);
            if n >= 4 {
                assert!(i_only.value != 0);
                assert_eq!(out.value, 2 * i_only.value);
            }
        }
    }

    #[test]
    fn test_iq_valid_driven_by_in_phase() {
        let mut iq = GardnerTedIq::new(12, 4).unwrap();
        for n in 0..4 {
            iq.clock(Complex::new(n, n), true, false, true);
        }
        assert!(!iq.output().valid);
        let out = iq.clock(Complex::new(4, 4), true, true, true);
        assert!(out.valid);
    }

    #[test]
    fn test_iq_output_width() {
        let iq = GardnerTedIq::new(12, 4).unwrap();
        assert_eq!(iq.output_width(), 26);
    }
}
