//! Client library for the BWT Perla local device API
//!
//! Two client variants talk to the appliance over HTTP: [`BwtApi`] for
//! devices with a numeric access code (full telemetry document) and
//! [`BwtSilkApi`] for older firmware that only exposes its raw register
//! block. Both implement [`BwtClient`] and produce the same immutable
//! [`CurrentData`] snapshot.

mod client;
mod codes;
mod data;
mod error;

pub use client::{BwtApi, BwtClient, BwtSilkApi, ClientKind};
pub use codes::AlarmCode;
pub use data::{treated_to_blended, BwtStatus, CurrentData};
pub use error::ApiError;
