//! Typed clients for the OpenStack services the harness drives.
//!
//! Each service gets a thin client over a shared REST layer:
//!
//! - [`auth::Session`] — Keystone password login and service catalog
//! - [`compute::ComputeApi`] — Nova servers, hypervisors, flavors, keypairs
//! - [`network::NetworkApi`] — Neutron networks, routers, floating IPs, agents
//! - [`volume::BlockStorageApi`] — Cinder volumes and snapshots
//! - [`image::ImageApi`] — Glance images
//!
//! Responses are decoded once, at the boundary, into explicit records with
//! status enums; callers never touch raw JSON. All calls return
//! [`error::ApiError`], whose narrow variants (`NotFound`, `Conflict`) are
//! what polling call sites tolerate while a resource converges.

pub mod auth;
pub mod compute;
pub mod config;
pub mod error;
pub mod image;
pub mod network;
pub mod rest;
pub mod volume;

pub use auth::{ServiceType, Session};
pub use config::Config;
pub use error::ApiError;
pub use rest::RestClient;
