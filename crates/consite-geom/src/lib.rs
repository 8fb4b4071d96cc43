#![deny(missing_docs)]

//! Planar geometry kernel implementing the `consite-core` [`GeometryOps`]
//! contract on top of the `geo` crate.
//!
//! [`GeometryOps`]: consite_core::GeometryOps

mod flags;
mod hash;
mod kernel;
pub mod shapes;

pub use flags::KernelConfig;
pub use hash::shape_fingerprint;
pub use kernel::PlanarKernel;
pub use shapes::{circle, rectangle};
