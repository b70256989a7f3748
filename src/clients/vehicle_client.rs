use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clients::{VehicleDirectory, VehicleSnapshot, VehicleStatus};
use crate::error::{RentalError, RentalResult};

const SERVICE: &str = "vehicle-service";

/// Vehicle payload as served by the vehicle service
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VehicleDto {
    id: i64,
    brand: String,
    model: String,
    license_plate: String,
    category: Option<String>,
    daily_price: Decimal,
    status: VehicleStatus,
}

impl From<VehicleDto> for VehicleSnapshot {
    fn from(dto: VehicleDto) -> Self {
        VehicleSnapshot {
            id: dto.id,
            brand: dto.brand,
            model: dto.model,
            license_plate: dto.license_plate,
            category: dto.category,
            daily_price: dto.daily_price,
            status: dto.status,
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusUpdate {
    status: VehicleStatus,
}

/// HTTP client for the vehicle service
pub struct HttpVehicleDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVehicleDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> RentalResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RentalError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn vehicle_url(&self, id: i64) -> String {
        format!("{}/vehicles/{}", self.base_url, id)
    }
}

/// Transport errors are transient when retrying could plausibly succeed
fn transport_error(operation: &str, err: reqwest::Error) -> RentalError {
    let transient = err.is_timeout() || err.is_connect() || err.is_request();
    RentalError::remote(SERVICE, operation, transient, err.to_string())
}

/// Map a non-success status, 5xx being transient
fn status_error(operation: &str, id: i64, status: StatusCode, body: String) -> RentalError {
    if status == StatusCode::NOT_FOUND {
        return RentalError::not_found("Vehicle", id);
    }
    RentalError::remote(
        SERVICE,
        operation,
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
        format!("HTTP {}: {}", status, body),
    )
}

#[async_trait]
impl VehicleDirectory for HttpVehicleDirectory {
    async fn get_vehicle(&self, id: i64) -> RentalResult<VehicleSnapshot> {
        debug!("Fetching vehicle {} from {}", id, SERVICE);

        let response = self
            .client
            .get(self.vehicle_url(id))
            .send()
            .await
            .map_err(|e| transport_error("get_vehicle", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("get_vehicle", id, status, body));
        }

        let dto: VehicleDto = response.json().await.map_err(|e| {
            RentalError::remote(SERVICE, "get_vehicle", false, format!("Malformed vehicle payload: {}", e))
        })?;

        Ok(dto.into())
    }

    async fn set_vehicle_status(&self, id: i64, status: VehicleStatus) -> RentalResult<()> {
        let response = self
            .client
            .put(format!("{}/status", self.vehicle_url(id)))
            .json(&StatusUpdate { status })
            .send()
            .await
            .map_err(|e| transport_error("set_vehicle_status", e))?;

        let http_status = response.status();
        if !http_status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Vehicle {} status update to {} failed with {}", id, status, http_status);
            return Err(status_error("set_vehicle_status", id, http_status, body));
        }

        info!("Vehicle {} marked {}", id, status);
        Ok(())
    }
}
