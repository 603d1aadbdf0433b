//! Builder pattern for connection configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tfp_client::IpConnection;
//!
//! # fn example() -> tfp_client::Result<()> {
//! let ipcon = IpConnection::builder()
//!     .request_timeout(Duration::from_secs(1))
//!     .error_sink(|error: tfp_client::Error| eprintln!("listener failed: {error}"))
//!     .build()?;
//! # let _ = ipcon;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

use super::connection::IpConnection;
use super::dispatch::{ErrorSink, TracingErrorSink};
use super::options::ConnectionOptions;

// ============================================================================
// IpConnectionBuilder
// ============================================================================

/// Builder for configuring an [`IpConnection`].
///
/// Use [`IpConnection::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct IpConnectionBuilder {
    /// Timing options.
    options: ConnectionOptions,
    /// Listener failure sink.
    error_sink: Option<Arc<dyn ErrorSink>>,
}

impl fmt::Debug for IpConnectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpConnectionBuilder")
            .field("options", &self.options)
            .field("custom_error_sink", &self.error_sink.is_some())
            .finish()
    }
}

impl IpConnectionBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all timing options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the request timeout.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets where listener failures are reported.
    ///
    /// Defaults to [`TracingErrorSink`].
    #[must_use]
    pub fn error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.error_sink = Some(Arc::new(sink));
        self
    }

    /// Builds the connection with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if a timeout is zero.
    pub fn build(self) -> Result<IpConnection> {
        self.options.validate()?;

        let sink = self
            .error_sink
            .unwrap_or_else(|| Arc::new(TracingErrorSink));

        Ok(IpConnection::with_parts(self.options, sink))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;

    #[test]
    fn test_build_with_defaults() {
        let ipcon = IpConnectionBuilder::new().build().expect("build");
        assert_eq!(ipcon.timeout(), ConnectionOptions::default().request_timeout);
    }

    #[test]
    fn test_build_rejects_zero_timeout() {
        let result = IpConnectionBuilder::new()
            .request_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_options_override() {
        let options = ConnectionOptions::new().with_request_timeout(Duration::from_millis(42));
        let ipcon = IpConnectionBuilder::new().options(options).build().expect("build");
        assert_eq!(ipcon.timeout(), Duration::from_millis(42));
    }
}
