// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Route handlers of the management API

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use log::{info, warn};
use rocket::http::{ContentType, Header, Status};
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::{delete, get, post, put, Request, Response, State};
use serde::{Deserialize, Serialize};

use crate::modbus::exchange;
use crate::modbus::{ModbusSlaveServer, Point, PointValue, SimulatorError};

/// Shared handle to the simulated slave, managed by Rocket
pub type ServerState = Arc<ModbusSlaveServer>;

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine readable error kind
    pub error: String,
    pub message: String,
}

/// Error returned by the API handlers
#[derive(Debug)]
pub struct ApiError {
    status: Status,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: Status, error: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

impl From<SimulatorError> for ApiError {
    fn from(err: SimulatorError) -> Self {
        let (status, kind) = match &err {
            SimulatorError::AlreadyRunning => (Status::Conflict, "already_running"),
            SimulatorError::InvalidConfig(_) => (Status::UnprocessableEntity, "invalid_config"),
            SimulatorError::IllegalDataAddress { .. } => {
                (Status::BadRequest, "illegal_data_address")
            }
            SimulatorError::IllegalDataValue(_) => (Status::BadRequest, "illegal_data_value"),
            SimulatorError::PointNotFound(_) => (Status::NotFound, "point_not_found"),
            SimulatorError::InvalidValue(_) => (Status::UnprocessableEntity, "invalid_value"),
            SimulatorError::Io(_) => (Status::InternalServerError, "io"),
            SimulatorError::Json(_) => (Status::BadRequest, "json"),
        };
        warn!("Management request failed: {}", err);
        ApiError::new(status, kind, err.to_string())
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        (self.status, Json(self.body)).respond_to(request)
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Listener state reported by `/api/server`
#[derive(Debug, Serialize, Deserialize)]
pub struct ServerStatus {
    pub running: bool,
    /// Bound socket address while running
    pub address: Option<String>,
    pub max_clients: usize,
    pub points: usize,
}

async fn server_status(server: &ModbusSlaveServer) -> ServerStatus {
    ServerStatus {
        running: server.is_running().await,
        address: server.local_addr().await.map(|a| a.to_string()),
        max_clients: server.max_clients(),
        points: server.store().point_count(),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartRequest {
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
}

/// Raw register bytes as base64
#[derive(Debug, Serialize, Deserialize)]
pub struct RawValue {
    pub value: String,
}

/// Point list served as a file download
pub struct ExportFile {
    file_name: String,
    json: String,
}

impl<'r> Responder<'r, 'static> for ExportFile {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .header(ContentType::JSON)
            .header(Header::new(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.file_name),
            ))
            .sized_body(self.json.len(), Cursor::new(self.json))
            .ok()
    }
}

#[get("/server")]
pub async fn get_server(server: &State<ServerState>) -> Json<ServerStatus> {
    Json(server_status(server).await)
}

#[post("/server/start", format = "json", data = "<request>")]
pub async fn start_server(
    server: &State<ServerState>,
    request: Json<StartRequest>,
) -> ApiResult<Json<ServerStatus>> {
    server.start(request.port).await?;
    Ok(Json(server_status(server).await))
}

#[post("/server/stop")]
pub async fn stop_server(server: &State<ServerState>) -> Json<ServerStatus> {
    server.stop().await;
    Json(server_status(server).await)
}

#[get("/points")]
pub fn list_points(server: &State<ServerState>) -> Json<Vec<Point>> {
    Json(server.store().list_points())
}

/// Add a point or replace the one with the same id
#[put("/points", format = "json", data = "<point>")]
pub fn set_point(server: &State<ServerState>, point: Json<Point>) -> ApiResult<Json<Point>> {
    Ok(Json(server.store().set_point(point.into_inner())?))
}

#[delete("/points/<id>")]
pub fn remove_point(server: &State<ServerState>, id: &str) -> ApiResult<Json<Point>> {
    server
        .store()
        .remove_point(id)
        .map(Json)
        .ok_or_else(|| SimulatorError::PointNotFound(id.to_string()).into())
}

/// Replace the whole configuration with the posted list
#[post("/points/import", format = "json", data = "<points>")]
pub fn import_points(
    server: &State<ServerState>,
    points: Json<Vec<Point>>,
) -> ApiResult<Json<ImportSummary>> {
    let imported = server.store().import_points(points.into_inner())?;
    info!("Imported {} points through the management API", imported);
    Ok(Json(ImportSummary { imported }))
}

#[get("/points/export")]
pub fn export_points(server: &State<ServerState>) -> ApiResult<ExportFile> {
    let json = exchange::points_to_json(&server.store().list_points())?;
    Ok(ExportFile {
        file_name: exchange::export_file_name(&chrono::Local::now()),
        json,
    })
}

#[get("/values")]
pub fn get_values(server: &State<ServerState>) -> Json<HashMap<String, String>> {
    Json(
        server
            .store()
            .get_all_values()
            .into_iter()
            .map(|(id, bytes)| (id, exchange::encode_raw_value(&bytes)))
            .collect(),
    )
}

#[put("/values/<id>", format = "json", data = "<value>")]
pub fn set_raw_value(
    server: &State<ServerState>,
    id: &str,
    value: Json<RawValue>,
) -> ApiResult<Status> {
    let bytes = exchange::decode_raw_value(&value.value)
        .map_err(|e| ApiError::new(Status::BadRequest, "invalid_base64", e.to_string()))?;
    server.store().set_value(id, &bytes)?;
    Ok(Status::NoContent)
}

#[get("/points/<id>/value")]
pub fn read_value(server: &State<ServerState>, id: &str) -> ApiResult<Json<PointValue>> {
    Ok(Json(server.store().read_value(id)?))
}

#[put("/points/<id>/value", format = "json", data = "<value>")]
pub fn write_value(
    server: &State<ServerState>,
    id: &str,
    value: Json<PointValue>,
) -> ApiResult<Status> {
    server.store().write_value(id, &value)?;
    Ok(Status::NoContent)
}
