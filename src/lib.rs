// Newsfold: near-duplicate story clustering for multi-feed readers
//
// This is the library root. Each module corresponds to a major subsystem
// of the clustering pipeline.

pub mod clustering;
pub mod config;
pub mod db;
pub mod output;
pub mod similarity;
pub mod status;
