//! # channel-crawler
//!
//! Distributed crawler for application metadata. Consumes URLs from a
//! pgmq work queue, renders each page in headless Chromium, extracts the
//! application's name, rating and number of ratings, and upserts the
//! result into Postgres keyed by application name.
//!
//! Delivery flow per worker slot: rate gate, decode, scrape, persist,
//! then ack or reject. See [`engine`].

pub mod broker;
pub mod config;
pub mod db;
pub mod driver;
pub mod engine;
pub mod error;
pub mod model;
pub mod scrape;
pub mod store;
pub mod supervisor;
pub mod telemetry;
