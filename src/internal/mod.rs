//! Crate-private plumbing: rPGP codec helpers and key policy checks.

mod helpers;
mod policy;

pub(crate) use helpers::*;
pub(crate) use policy::*;
