//! Classification pipeline

pub mod classifier;
