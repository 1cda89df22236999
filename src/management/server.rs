// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::path::PathBuf;
use std::sync::Arc;

use rocket::config::LogLevel;
use rocket::data::{Limits, ToByteUnit};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::figment::Figment;
use rocket::http::Header;
use rocket::{options, routes, Build, Request, Response, Rocket};

use super::api;
use crate::config::ManagementConfig;
use crate::modbus::ModbusSlaveServer;

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, PUT, DELETE, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/// # Answers to OPTIONS requests
#[options("/<_path..>")]
async fn options(_path: PathBuf) -> Result<(), std::io::Error> {
    Ok(())
}

/// Rocket configuration for the management API
pub fn management_figment(config: &ManagementConfig) -> Figment {
    rocket::Config::figment()
        .merge((
            "ident",
            format!("ModbusSlaveSimulator/{}", env!("CARGO_PKG_VERSION")),
        ))
        .merge(("limits", Limits::new().limit("json", 2.mebibytes())))
        .merge(("address", config.address.clone()))
        .merge(("port", config.port))
        .merge(("log_level", LogLevel::Normal))
        .merge(("cli_colors", false))
}

/// Build the management API around a simulated slave
pub fn build_rocket(figment: Figment, server: Arc<ModbusSlaveServer>) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(CORS)
        .mount(
            "/api",
            routes![
                options,
                api::get_server,
                api::start_server,
                api::stop_server,
                api::list_points,
                api::set_point,
                api::remove_point,
                api::import_points,
                api::export_points,
                api::get_values,
                api::set_raw_value,
                api::read_value,
                api::write_value,
            ],
        )
        .manage(server)
}
