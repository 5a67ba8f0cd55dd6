//! Real-time bystander detection and screen privacy decisions.
//!
//! Three loops share state only through latest-value slots: capture
//! publishes frames, analysis turns the newest frame into a privacy
//! decision, render composes the newest frame with the newest decision.

pub mod blurring;
pub mod capture;
pub mod config;
pub mod decision;
pub mod detection;
pub mod pipeline;
pub mod render;
pub mod shared;

#[cfg(test)]
mod testing;
