// src/error.rs
//! Error type for the culling core and its startup path.
//!
//! Per-frame culling has no recoverable error path: everything it needs is
//! rebuilt from current state each frame. What can fail is one-time setup
//! (config, adapter, device, surface, window) and diagnostic read-backs, and
//! those failures travel up to `main` as [`Error`].

use thiserror::Error;

/// Main error type for the crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O errors (config file access, crash log).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration that parsed but violates an invariant.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No GPU adapter matched the request.
    #[error("no suitable GPU adapter found")]
    AdapterUnavailable,

    /// The adapter refused the device request.
    #[error("device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    /// Surface creation failed for the window.
    #[error("surface creation failed: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    /// Window creation failed.
    #[error("window creation failed: {0}")]
    Window(#[from] winit::error::OsError),

    /// The event loop could not be created or exited abnormally.
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    /// Mapping a GPU buffer for read-back failed.
    #[error("GPU read-back failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    /// Simple custom message.
    #[error("{0}")]
    Custom(String),

    /// Context chaining, see [`crate::context::Context`].
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a custom error message.
    #[inline]
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Self::Custom(msg.into())
    }

    /// Create a configuration error.
    #[inline]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap `self` with a context message.
    #[inline]
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// Quick static message.
    #[inline]
    pub fn msg(msg: &'static str) -> Self {
        Self::Custom(msg.into())
    }

    #[inline]
    pub fn is_config(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::WithContext { source, .. } => source.is_config(),
            _ => false,
        }
    }
}

/// Convenient `Result` alias, use `crate::Result<T>` everywhere.
pub type Result<T> = std::result::Result<T, Error>;
