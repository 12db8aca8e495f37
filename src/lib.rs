//! Decode-and-scroll waterfall engine for sonar fish-finder packet logs.
//!
//! Sonar Waterfall turns logged (or live) fish-finder packets into a scrolling
//! echogram: each packet becomes one colour-mapped column, and a fixed-width
//! window of columns is handed to consumers as a [`Frame`] on every tick.
//!
//! # Features
//!
//! - **File replay**: a packet log is decoded once into a bounded sample cache
//!   and scrolled at an adjustable speed with pause, seek and fast-forward
//! - **Live feeds**: records from any channel are coloured on arrival
//! - **Backpressure**: frames travel through a bounded queue; a slow consumer
//!   slows the producer instead of losing frames
//! - **Observers**: state, progress, throughput and status events over watch
//!   and broadcast channels
//!
//! ## Example (file replay)
//!
//! ```rust,no_run
//! use sonar_waterfall::{PlaybackState, Waterfall, WaterfallConfig};
//!
//! #[tokio::main]
//! async fn main() -> sonar_waterfall::Result<()> {
//!     let session = Waterfall::open("survey.txt", WaterfallConfig::default()).await?;
//!     let frames = session.frames();
//!
//!     while let Some(frame) = frames.next_frame().await {
//!         println!("frame {} at column {}", frame.tick, frame.position);
//!     }
//!     assert_eq!(session.wait_finished().await, PlaybackState::Finished);
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod config;
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decoding and colouring
pub mod cache;
pub mod color;
pub mod packet;
pub mod playback;

// Producer pipeline
pub mod controls;
pub mod driver;
pub mod monitor;
pub mod provider;
pub mod providers;
pub mod queue;
pub mod session;
pub mod stream;

pub use config::*;
pub use error::*;
pub use types::*;

pub use color::{ColorMapper, ColorPolicy, ColorTable};
pub use packet::PacketLogReader;
pub use queue::FrameReceiver;
pub use session::WaterfallSession;

/// Unified entry point for waterfall sessions.
///
/// # Examples
///
/// ## Live feed
/// ```rust,no_run
/// use sonar_waterfall::{Waterfall, WaterfallConfig};
///
/// #[tokio::main]
/// async fn main() -> sonar_waterfall::Result<()> {
///     let (tx, rx) = tokio::sync::mpsc::channel(64);
///     let session = Waterfall::live(rx, WaterfallConfig::default()).await?;
///     tx.send("0000000000000200FFFF0000".to_string()).await.ok();
///     let _frame = session.next_frame().await;
///     Ok(())
/// }
/// ```
pub struct Waterfall;

impl Waterfall {
    /// Open a packet log and start playing it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The file does not exist or is not readable
    /// - A record is malformed and `abort_on_malformed` is set
    pub async fn open<P: AsRef<std::path::Path>>(
        path: P,
        config: WaterfallConfig,
    ) -> Result<WaterfallSession> {
        WaterfallSession::open(path, config).await
    }

    /// Scroll records from a live feed.
    ///
    /// Each item on `records` is one packet record. The session finishes when
    /// every sender is dropped.
    pub async fn live(
        records: tokio::sync::mpsc::Receiver<String>,
        config: WaterfallConfig,
    ) -> Result<WaterfallSession> {
        WaterfallSession::live(records, config).await
    }
}
