//! Indicator and signal engine for OHLCV bar series.
//!
//! Raw bars are normalized into a [`model::Series`], indicator columns are
//! added in an [`frame::IndicatorFrame`], and the last row of a fast/slow
//! moving-average pair is turned into a [`signal::SignalAction`].

pub mod config;
pub mod error;
pub mod frame;
pub mod indicator;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod signal;
pub mod source;
