//! market-chat - per-product buyer/seller chat for a marketplace.
//!
//! Resolves one conversation per (product, buyer, seller), persists messages
//! to an append-only log, pushes committed messages to every live viewer, and
//! gives the sender an optimistic echo that reconciles with the durable record.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
