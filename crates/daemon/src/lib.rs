//! Engagement orchestrator daemon: services, background jobs and the admin API.

pub mod api;
pub mod collaborators;
pub mod config;
pub mod distributor;
pub mod events;
pub mod health;
pub mod orchestrator;
pub mod popularity;
pub mod quality;
pub mod registry;
pub mod rng;
pub mod scheduler;
pub mod selector;
pub mod state;
pub mod task_queue;
