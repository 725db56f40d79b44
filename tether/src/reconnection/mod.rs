//! Reconnection strategies for handling connection loss.
//!
//! The lifecycle manager consults a [`ReconnectionStrategy`] every time the
//! connection closes, including when a connect attempt fails. The strategy
//! decides whether another attempt is scheduled and after what delay.
//!
//! # Available Strategies
//!
//! - [`ExponentialBackoff`]: `min(initial * 2^n, max)` (default, 1s doubling to 30s)
//! - [`NoReconnect`]: Never attempts to reconnect
//!
//! # Examples
//!
//! ```
//! use tether::reconnection::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let strategy = ExponentialBackoff::builder()
//!     .initial_delay(Duration::from_millis(500))
//!     .max_delay(Duration::from_secs(10))
//!     .jitter(true)
//!     .max_attempts(Some(10))
//!     .build();
//! ```

mod exponential;
mod no_reconnect;
mod traits;

pub use exponential::{ExponentialBackoff, ExponentialBackoffBuilder};
pub use no_reconnect::NoReconnect;
pub use traits::{ReconnectionStats, ReconnectionStrategy};
