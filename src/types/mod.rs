//! Core types shared across the waterfall pipeline.
//!
//! - [`Frame`] is a copied-out, fixed-width slice of the waterfall
//! - [`Rgb`] is a single colour-mapped sample
//! - [`PlaybackState`] tracks the producer lifecycle
//! - [`StatusEvent`] carries human-readable notifications
//! - [`UpdateRate`] throttles observer streams

mod frame;
mod state;
mod update_rate;

pub use frame::{Frame, Rgb};
pub use state::{PlaybackState, StatusEvent};
pub use update_rate::UpdateRate;
