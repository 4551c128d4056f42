//! # Baseband Synchronization DSP Library
//!
//! Fixed-point, cycle-accurate signal processing for recovering timing
//! and frequency information from a sampled radio baseband signal. Every
//! stage models one clocked hardware block: two's-complement words of
//! configured width, deliberate wraparound where the mathematics relies
//! on it, saturation where it does not, and a uniform valid/ready
//! handshake at every boundary so the whole chain stays sample-accurate
//! under backpressure.
//!
//! ## Signal Flow
//!
//! ```text
//! samples ─► [FIR / CIC decimation] ─┬─► [Gardner TED] ──► timing error
//!                                    └─► [band-edge FLL] ► frequency correction
//! ```
//!
//! - **handshake**: the backpressure contract every stage obeys
//! - **fir_filter**: transposed-form FIR with bit-growth accounting
//! - **cic_filter**: integrator/comb/decimator/compensator chain
//! - **gardner_ted**: symbol-timing error detectors (PAM and QAM)
//! - **fll_band_edge**: band-edge frequency discriminator and loop filter
//! - **gain**: power-of-two gain stage with saturation
//! - **filter_design**: quantized coefficient generation
//!
//! The model is bit-for-bit reproducible: stages are driven one clock
//! edge at a time and commit exactly the state transitions the hardware
//! registers would, including integer wraparound in the CIC integrators
//! that the comb stages later cancel.
//!
//! ## Example
//!
//! ```rust
//! use baseband_sync::{FirFilter, FirFilterConfig, Stage};
//!
//! let config = FirFilterConfig {
//!     coefficients: vec![1, 2, 4, 2, 1],
//!     input_width: 12,
//!     accumulator_width: 16,
//!     output_truncation_bits: 0,
//!     top_bits_to_drop: 0,
//! };
//! let mut fir = FirFilter::new(config).unwrap();
//!
//! // drive one sample per clock edge; the output follows one cycle later
//! let out = fir.clock(100, true, true);
//! assert!(out.valid);
//! assert_eq!(out.value, 100);
//! ```

pub mod cic_filter;
pub mod filter_design;
pub mod fir_filter;
pub mod fll_band_edge;
pub mod gain;
pub mod gardner_ted;
pub mod handshake;
pub mod types;

pub use cic_filter::{CicConfig, CicDecimator, Comb, Compensator, Decimator, Integrator};
pub use fir_filter::{FirFilter, FirFilterConfig};
pub use fll_band_edge::{FllBandEdge, FllBandEdgeConfig, LoopFilterConfig};
pub use gain::ShiftGain;
pub use gardner_ted::{GardnerTed, GardnerTedIq};
pub use handshake::{OutputReg, Stage, StreamOut};
pub use types::{DspError, DspResult, IqSample, Sample};
