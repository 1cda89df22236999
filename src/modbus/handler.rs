// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus request handler for the simulated slave
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the device that provides data,
//! while the client is the device that requests data.
//!
//! ## Supported function codes
//!
//! | Code | Request | Store access |
//! |------|---------|--------------|
//! | 0x01 | Read Coils | shared lock, `word != 0` |
//! | 0x02 | Read Discrete Inputs | shared lock, `word != 0` |
//! | 0x03 | Read Holding Registers | shared lock |
//! | 0x04 | Read Input Registers | shared lock |
//! | 0x05 | Write Single Coil | exclusive lock, `0xFF00` / `0x0000` |
//! | 0x06 | Write Single Register | exclusive lock |
//! | 0x0F | Write Multiple Coils | exclusive lock, `0xFF00` / `0x0000` |
//! | 0x10 | Write Multiple Registers | exclusive lock |
//!
//! Coils, discrete inputs, holding and input registers all share the same
//! register address space. Any address of a request that is not served by an
//! enabled point aborts the whole request with `IllegalDataAddress`, before
//! any write is applied. Other function codes are answered with
//! `IllegalFunction`. Quantities above the protocol limits (125 registers or
//! 2000 bits per read, 123 registers or 1968 coils per write) are answered
//! with `IllegalDataValue`.

use std::future;

use log::{debug, error};
use tokio::sync::OwnedSemaphorePermit;
use tokio_modbus::prelude::*;

use super::error::SimulatorError;
use super::store::SharedRegisterStore;

/// Per-connection Modbus service backed by a shared [`RegisterStore`](super::store::RegisterStore).
///
/// One handler is created for every accepted client connection. All
/// handlers share the same store, so a write from one client is visible to
/// the next read of any other client.
///
/// The optional connection permit is released when the connection, and with
/// it the handler, is dropped.
pub struct ModbusRequestHandler {
    store: SharedRegisterStore,
    _permit: Option<OwnedSemaphorePermit>,
}

impl tokio_modbus::server::Service for ModbusRequestHandler {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    /// Process a Modbus request and provide a response
    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Received Modbus request: {:?}", req);
        future::ready(self.handle(req))
    }
}

impl ModbusRequestHandler {
    /// Create a handler without a connection limit
    pub fn new(store: SharedRegisterStore) -> Self {
        Self {
            store,
            _permit: None,
        }
    }

    /// Create a handler holding one connection slot of the server
    pub fn with_permit(store: SharedRegisterStore, permit: OwnedSemaphorePermit) -> Self {
        Self {
            store,
            _permit: Some(permit),
        }
    }

    /// Dispatch a decoded request to the store
    pub fn handle(&self, req: Request<'static>) -> Result<Response, ExceptionCode> {
        let res = match req {
            Request::ReadCoils(addr, cnt) => {
                debug!("Reading {} coils starting from address {}", cnt, addr);
                self.store
                    .read_bits(addr, cnt)
                    .map(Response::ReadCoils)
            }
            Request::ReadDiscreteInputs(addr, cnt) => {
                debug!(
                    "Reading {} discrete inputs starting from address {}",
                    cnt, addr
                );
                self.store
                    .read_bits(addr, cnt)
                    .map(Response::ReadDiscreteInputs)
            }
            Request::WriteSingleCoil(addr, value) => {
                debug!("Writing {} to coil {}", value, addr);
                self.store
                    .write_bits(addr, std::slice::from_ref(&value))
                    .map(|_| Response::WriteSingleCoil(addr, value))
            }
            Request::WriteMultipleCoils(addr, values) => {
                debug!(
                    "Writing {} coils starting from address {}",
                    values.len(),
                    addr
                );
                self.store
                    .write_bits(addr, &values)
                    .map(|_| Response::WriteMultipleCoils(addr, values.len() as u16))
            }
            Request::ReadInputRegisters(addr, cnt) => {
                debug!(
                    "Reading {} input registers starting from address {}",
                    cnt, addr
                );
                self.store
                    .read_registers(addr, cnt)
                    .map(Response::ReadInputRegisters)
            }
            Request::ReadHoldingRegisters(addr, cnt) => {
                debug!(
                    "Reading {} holding registers starting from address {}",
                    cnt, addr
                );
                self.store
                    .read_registers(addr, cnt)
                    .map(Response::ReadHoldingRegisters)
            }
            Request::WriteMultipleRegisters(addr, values) => {
                debug!(
                    "Writing {} values to holding registers starting from address {}",
                    values.len(),
                    addr
                );
                self.store
                    .write_registers(addr, &values)
                    .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16))
            }
            Request::WriteSingleRegister(addr, value) => {
                debug!("Writing value {} to holding register {}", value, addr);
                self.store
                    .write_registers(addr, std::slice::from_ref(&value))
                    .map(|_| Response::WriteSingleRegister(addr, value))
            }
            _ => {
                error!(
                    "Exception::IllegalFunction - Unimplemented function code in request: {req:?}"
                );
                return Err(ExceptionCode::IllegalFunction);
            }
        };

        res.map_err(|e: SimulatorError| {
            error!("Modbus request error: {}", e);
            e.exception_code()
        })
    }
}
