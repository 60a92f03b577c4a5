//! Bucket watermarking
//!
//! This library provides the core of the bucket-watermark batch job, which
//! lists images under a prefix of an S3-compatible bucket, stamps a watermark
//! into each bottom corner and uploads the results under a target prefix.

pub mod app_state;
pub mod config;
pub mod models;
pub mod services;
pub mod telemetry;
