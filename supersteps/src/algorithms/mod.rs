//! Analysers shipped with the crate.

pub mod multilayer_lpa;

pub use multilayer_lpa::{Communities, Community, LpaConfig, Member, MultilayerLpa, Omega};
