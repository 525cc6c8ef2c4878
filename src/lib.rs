//! Personal RSS/Atom aggregator backend.
//!
//! Subscriptions and articles live in SQLite ([`storage`]). A reconciliation
//! engine ([`feed::Refresher`]) periodically pulls every subscribed feed and
//! inserts the articles it has not seen before. Clients read and triage
//! articles through a bearer-token protected JSON API ([`api`]).

pub mod api;
pub mod auth;
pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
