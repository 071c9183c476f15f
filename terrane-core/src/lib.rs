#![warn(clippy::all)]

//! Core data structures for image feature detection and point cloud spatial analysis
//!
//! Terrane provides the building blocks that the algorithms in `terrane-algorithms` operate on:
//! integral images with constant-time box sums, a generic bucketed 2-D k-d tree, raster and
//! point-record access traits, and a progress/cancellation contract shared by all long-running
//! operations.

pub extern crate nalgebra;
extern crate self as terrane_core;

/// Point record access and filtering
pub mod cloud;
/// Error taxonomy shared by all operations
pub mod error;
/// Integral images and box sums
pub mod image;
/// Mathematical tools: bounds and spatial indexing
pub mod math;
/// Progress reporting and cooperative cancellation
pub mod progress;
/// Raster access traits and an in-memory raster
pub mod raster;
