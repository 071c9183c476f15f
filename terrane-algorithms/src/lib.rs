#![warn(clippy::all)]

//! Algorithms for image feature detection and point cloud analysis
//!
//! This crate provides a SURF-style interest point pipeline (scale-space detection, descriptor
//! extraction, matching) over the integral images of `terrane-core`, plus point cloud tools:
//! drop-based ground segmentation and IDW/maximum grid interpolation.

/// Grid interpolation of point cloud attributes
pub mod interpolation;
/// Region-growing segmentation of point clouds
pub mod segmentation;
/// Scale-invariant interest point detection, description and matching
pub mod surf;
