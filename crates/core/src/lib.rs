//! Catalog, persisted view state and navigation for the BayWatch browser.
//!
//! The presenter drives a [`session::Session`]; everything it renders comes
//! from [`projection::project`].
#![allow(clippy::len_without_is_empty)]
pub mod catalog;
pub mod debounce;
pub mod deep_link;
pub mod error;
pub mod navigator;
pub mod projection;
pub mod session;
pub mod store;
pub mod types;
pub mod view_state;
