// Native codec engine bindings

#[cfg(feature = "mozjpeg")]
mod errmgr;
#[cfg(feature = "mozjpeg")]
pub mod mozjpeg;

#[cfg(feature = "mozjpeg")]
pub use mozjpeg::MozjpegEngine;
