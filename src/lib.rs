//! VCF Bot: collects contacts over chat and publishes a monthly address book.

pub mod bot;
pub mod channels;
pub mod config;
pub mod contacts;
pub mod error;
pub mod notifier;
pub mod snapshot;
pub mod store;
