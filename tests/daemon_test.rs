// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use tempfile::tempdir;
use tokio_modbus::prelude::*;

use rust_modbus_slave::config::Config;
use rust_modbus_slave::daemon::Daemon;
use rust_modbus_slave::modbus::exchange;
use rust_modbus_slave::modbus::{Point, ValueType};

#[tokio::test]
async fn test_daemon_serves_points_file() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let temp_dir = tempdir()?;
    let points_path = temp_dir.path().join("points.json");
    exchange::save_points(
        &points_path,
        &[Point::new("level", 20, 1, ValueType::Uint16).with_initial_value(vec![0x01, 0x00])],
    )?;

    let mut config = Config::default();
    config.modbus.address = "127.0.0.1".to_string();
    config.modbus.port = 0;
    config.management.enabled = false;
    config.points_file = Some(points_path.to_string_lossy().to_string());

    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;

    let server = daemon.server().expect("daemon owns a server");
    let socket_addr = server.local_addr().await.expect("modbus server is running");

    let mut ctx = tcp::connect(socket_addr).await?;
    assert_eq!(ctx.read_holding_registers(20, 1).await??, vec![0x0100]);
    ctx.disconnect().await?;

    daemon.shutdown().await;
    assert!(!server.is_running().await);
    daemon.join().await?;

    Ok(())
}

#[tokio::test]
async fn test_daemon_fails_on_missing_points_file() {
    let mut config = Config::default();
    config.modbus.enabled = false;
    config.management.enabled = false;
    config.points_file = Some("/nonexistent/points.json".to_string());

    let mut daemon = Daemon::new();
    assert!(daemon.launch(&config).await.is_err());
}
