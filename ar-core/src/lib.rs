//! # AR Core
//!
//! This library provides the common abstractions and types shared by the
//! planar augmented-reality tracking crates in this workspace. This includes
//! the camera model, keypoints, correspondences, and the pose of the planar
//! reference relative to the camera. The crate is intentionally small so that
//! every other crate can depend on it without noticeable build cost.
//!
//! The camera coordinate frame used throughout is the standard computer
//! vision convention:
//!
//! * Origin is the optical center
//! * Positive z axis is forwards
//! * Positive y axis is down
//! * Positive x axis is right
//!
//! Note that this is a right-handed coordinate space. Converting poses from
//! this frame into a renderer's eye space is the job of the pipeline crate,
//! not of these types.
//!
//! The crate is designed to work with `#![no_std]`. `libm` is used
//! (through `nalgebra`) for math algorithms that aren't present in `core`.

#![no_std]

mod intrinsics;
mod keypoint;
mod matches;
mod point;
mod pose;

pub use intrinsics::*;
pub use keypoint::*;
pub use matches::*;
pub use nalgebra;
pub use point::*;
pub use pose::*;
pub use sample_consensus;
