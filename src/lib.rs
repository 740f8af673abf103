//! Kernel de télémétrie Lumen : ingestion UDP (logs + heartbeats des
//! devices LED), état borné en mémoire, API REST + push WebSocket.

pub mod config;
pub mod devices;
pub mod health;
pub mod http;
pub mod logbuffer;
pub mod models;
pub mod state;
pub mod udp;
pub mod ws;
