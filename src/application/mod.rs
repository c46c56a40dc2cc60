//! Application layer wiring DTOs and services for Sahayak.

pub mod dtos;
pub mod services;

pub use dtos::{ChatRequest, ChatResponse, ErrorBody, HealthStatusResponse};
pub use services::{ChatService, KnowledgeService};
