//! Stream combinators for observer streams

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
