//! Offline-aware client for the Open API blog service.
//!
//! The heart of the crate is [`mediator`]: a reusable protocol that reconciles
//! a local reactive cache with a remote service and reports progress as a
//! stream of [`LifecycleState`](mediator::LifecycleState)s. The repositories
//! express the concrete account and blog operations on top of it.

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod logging;
pub mod mediator;
pub mod models;
pub mod pagination;
pub mod repository;
