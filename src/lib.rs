//! nvenc-capacity: command line front end for dual-NVENC capacity tests

pub mod cli;
