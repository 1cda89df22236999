// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info};
use rocket::Shutdown;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::management::{build_rocket, management_figment};
use crate::modbus::{exchange, ModbusSlaveServer, RegisterStore};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Background services of the simulator
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: CancellationToken,
    server: Option<Arc<ModbusSlaveServer>>,
    web_shutdown: Option<Shutdown>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: CancellationToken::new(),
            server: None,
            web_shutdown: None,
        }
    }

    /// Launch all configured tasks based on configuration
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let server = Arc::new(ModbusSlaveServer::with_max_clients(
            RegisterStore::shared(),
            config.modbus.max_clients,
        ));
        self.server = Some(Arc::clone(&server));

        if let Some(points_file) = &config.points_file {
            let count = exchange::import_file(server.store(), points_file)
                .with_context(|| format!("Failed to import points from {}", points_file))?;
            info!("Loaded {} points from {}", count, points_file);
        }

        if config.modbus.enabled {
            self.start_modbus_server(config, &server).await?;
        }

        if config.management.enabled {
            self.start_web_server(config, Arc::clone(&server)).await?;
        }

        self.start_heartbeat(server);

        Ok(())
    }

    /// The simulated slave, once launched
    pub fn server(&self) -> Option<Arc<ModbusSlaveServer>> {
        self.server.clone()
    }

    async fn start_modbus_server(&self, config: &Config, server: &ModbusSlaveServer) -> Result<()> {
        let socket_addr = resolve(&config.modbus.address, config.modbus.port).await?;
        server
            .start_on(socket_addr)
            .await
            .with_context(|| format!("Failed to start Modbus server on {}", socket_addr))?;
        Ok(())
    }

    /// Start the Rocket management API
    async fn start_web_server(
        &mut self,
        config: &Config,
        server: Arc<ModbusSlaveServer>,
    ) -> Result<()> {
        info!(
            "Starting management API on {}:{}",
            config.management.address, config.management.port
        );

        let rocket = build_rocket(management_figment(&config.management), server);
        let ignited = rocket.ignite().await?;
        self.web_shutdown = Some(ignited.shutdown());

        let task = tokio::spawn(async move {
            ignited.launch().await?;
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs the simulator status periodically
    fn start_heartbeat(&mut self, server: Arc<ModbusSlaveServer>) {
        debug!("Starting heartbeat monitor");

        let running = self.running.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = running.cancelled() => break,
                    _ = time::sleep(HEARTBEAT_INTERVAL) => {
                        debug!(
                            "Daemon heartbeat: modbus {} with {} points",
                            if server.is_running().await { "running" } else { "stopped" },
                            server.store().point_count()
                        );
                    }
                }
            }
            Ok(())
        });

        self.tasks.push(task);
    }

    /// Stop the Modbus server, the management API and the heartbeat
    pub async fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.cancel();
        if let Some(server) = &self.server {
            server.stop().await;
        }
        if let Some(shutdown) = &self.web_shutdown {
            shutdown.clone().notify();
        }
    }

    /// Wait for all tasks to complete
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match task.await {
                Ok(Err(e)) => error!("Task failed: {:#}", e),
                Err(e) => error!("Task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        Ok(())
    }
}

/// Resolve a configured host and port to a bindable address
async fn resolve(address: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((address, port))
        .await
        .with_context(|| format!("Failed to resolve {}:{}", address, port))?
        .next()
        .with_context(|| format!("No address found for {}:{}", address, port))
}
