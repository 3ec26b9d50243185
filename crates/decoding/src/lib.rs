//! Token sampling and the autoregressive decode loop.
//!
//! Each step takes the last `W` ids of the buffer, asks the predictor for a
//! next-token distribution, applies temperature scaling and top-K truncation
//! and samples one id with a caller-supplied RNG.

pub mod decoder;
pub mod sampling;

pub use decoder::{
    CancelFlag, DecodeState, Decoder, GenerateOptions, GenerationMetrics, GenerationOutput,
};
pub use sampling::{scale_by_temperature, Candidate, Distribution};
