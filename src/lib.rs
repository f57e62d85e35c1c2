#![allow(unused_assignments)] // thiserror/miette proc macros trigger false positives

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod packer;
pub mod paths;
pub mod pipeline;
pub mod progress;
pub mod runner;
pub mod vagrant;
pub mod vagrantfile;
