//! Tagged Todos — multi-tenant todo lists with per-owner tags and a
//! session-remembered, tag-scoped listing.

pub mod accounts;
pub mod config;
pub mod error;
pub mod seed;
pub mod service;
pub mod store;
pub mod tags;
pub mod todos;
pub mod web;
