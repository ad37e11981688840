//! Orchestrates the Artistry room-redesign services: object detection,
//! segmentation, design advice and image generation, plus the cost, product
//! and persistence services around them.

pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod models;
pub mod poll;
pub mod results;
pub mod routes;
pub mod workflow;

pub use client::{HttpServiceClient, ServiceClient};
pub use config::Config;
pub use error::{ArtistryError, Result};
pub use workflow::{FlowKind, Orchestrator, Phase, StateProjection, WorkflowRun, WorkflowSnapshot};
