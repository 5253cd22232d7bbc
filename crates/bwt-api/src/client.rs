//! HTTP clients for the two device API variants

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::codes::AlarmCode;
use crate::data::{BwtStatus, CurrentData};
use crate::error::ApiError;

/// Default local API port on the appliance
const DEVICE_PORT: u16 = 8884;

/// Request timeout against the device
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Which client variant is talking to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// Full telemetry document, access-code authenticated
    Perla,
    /// Register-only firmware without an access code
    Silk,
}

/// Opaque async device client.
///
/// The integration treats the device protocol as a collaborator: one
/// validation call at setup, one poll per coordinator cycle, close on
/// teardown.
#[async_trait]
pub trait BwtClient: Send + Sync {
    /// Which API variant this client speaks
    fn kind(&self) -> ClientKind;

    /// Fetch one full snapshot
    async fn poll(&self) -> Result<CurrentData, ApiError>;

    /// One validation call against the device, used at entry setup
    async fn validate(&self) -> Result<(), ApiError> {
        self.poll().await.map(|_| ())
    }

    /// Release the connection to the device
    async fn close(&self);
}

/// Wire layout of the current-data document
#[derive(Debug, Deserialize)]
struct WireCurrentData {
    current_flow: u32,
    total_output: u64,
    day_output: u64,
    month_output: u64,
    year_output: u64,
    hardness_in: u16,
    hardness_out: u16,
    capacity_1: u32,
    capacity_2: u32,
    regeneration_count_1: u32,
    regeneration_count_2: u32,
    regenerativ_level: u8,
    regenerativ_days: u16,
    state: u8,
    holiday_mode: i64,
    #[serde(default)]
    active_alarms: Vec<u8>,
}

impl From<WireCurrentData> for CurrentData {
    fn from(wire: WireCurrentData) -> Self {
        CurrentData {
            current_flow: wire.current_flow,
            total_output: wire.total_output,
            day_output: wire.day_output,
            month_output: wire.month_output,
            year_output: wire.year_output,
            hardness_in: wire.hardness_in,
            hardness_out: wire.hardness_out,
            capacity_1: wire.capacity_1,
            capacity_2: wire.capacity_2,
            regeneration_count_1: wire.regeneration_count_1,
            regeneration_count_2: wire.regeneration_count_2,
            regenerativ_level: wire.regenerativ_level,
            regenerativ_days: wire.regenerativ_days,
            state: BwtStatus::from_code(wire.state),
            holiday_mode: wire.holiday_mode,
            alarms: wire.active_alarms.into_iter().map(AlarmCode::from_id).collect(),
            registers: Vec::new(),
        }
    }
}

/// Wire layout of the silk register document
#[derive(Debug, Deserialize)]
struct WireRegisters {
    registers: Vec<u16>,
}

fn build_http_client() -> Result<reqwest::Client, ApiError> {
    Ok(reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(ApiError::AccessDenied);
    }
    if !status.is_success() {
        return Err(ApiError::Status(status.as_u16()));
    }
    Ok(response)
}

/// Access-code authenticated client for the full Perla API
pub struct BwtApi {
    http: reqwest::Client,
    base_url: String,
    code: u32,
}

impl BwtApi {
    pub fn new(host: &str, code: u32) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_http_client()?,
            base_url: format!("http://{host}:{DEVICE_PORT}"),
            code,
        })
    }

    /// Fetch and decode the current-data document
    pub async fn get_current_data(&self) -> Result<CurrentData, ApiError> {
        let url = format!("{}/api/current", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("code", self.code)])
            .send()
            .await?;
        let body = check_status(response)?.text().await?;
        let wire: WireCurrentData = serde_json::from_str(&body)?;
        debug!(url, "fetched current data");
        Ok(wire.into())
    }
}

#[async_trait]
impl BwtClient for BwtApi {
    fn kind(&self) -> ClientKind {
        ClientKind::Perla
    }

    async fn poll(&self) -> Result<CurrentData, ApiError> {
        self.get_current_data().await
    }

    async fn close(&self) {
        // reqwest pools connections; dropping the client releases them.
        debug!(base_url = %self.base_url, "closing device client");
    }
}

/// Codeless client for silk firmware exposing only the raw register block
pub struct BwtSilkApi {
    http: reqwest::Client,
    base_url: String,
}

impl BwtSilkApi {
    pub fn new(host: &str) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_http_client()?,
            base_url: format!("http://{host}:{DEVICE_PORT}"),
        })
    }

    /// Fetch the raw register block
    pub async fn get_registers(&self) -> Result<Vec<u16>, ApiError> {
        let url = format!("{}/api/registers", self.base_url);
        let response = self.http.get(&url).send().await?;
        let body = check_status(response)?.text().await?;
        let wire: WireRegisters = serde_json::from_str(&body)?;
        debug!(url, count = wire.registers.len(), "fetched registers");
        Ok(wire.registers)
    }
}

#[async_trait]
impl BwtClient for BwtSilkApi {
    fn kind(&self) -> ClientKind {
        ClientKind::Silk
    }

    async fn poll(&self) -> Result<CurrentData, ApiError> {
        Ok(CurrentData::from_registers(self.get_registers().await?))
    }

    async fn close(&self) {
        debug!(base_url = %self.base_url, "closing device client");
    }
}
