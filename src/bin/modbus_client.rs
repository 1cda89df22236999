// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::future::Future;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::time::{self, Duration};
use tokio_modbus::prelude::*;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Register table to read
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Coils,
    DiscreteInputs,
    Holding,
    Input,
}

/// Diagnostic Modbus client for the slave simulator
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Modbus server address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Modbus server port
    #[clap(long, default_value = "502")]
    port: u16,

    /// Unit identifier
    #[clap(long, default_value = "1")]
    unit: u8,

    /// Table to read from
    #[clap(long, value_enum, default_value = "holding")]
    kind: Kind,

    /// Starting address
    #[clap(long, default_value = "0")]
    start: u16,

    /// Number of coils or registers to read
    #[clap(long, default_value = "1")]
    quantity: u16,

    /// Also decode pairs of registers as big-endian float32
    #[clap(long)]
    float32: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    let socket_addr = format!("{}:{}", args.address, args.port)
        .parse()
        .with_context(|| format!("Invalid server address {}:{}", args.address, args.port))?;
    println!("Connecting to Modbus server at {}", socket_addr);

    let mut ctx = tcp::connect_slave(socket_addr, Slave(args.unit)).await?;

    println!(
        "Reading {} {:?} starting at address {}",
        args.quantity, args.kind, args.start
    );

    match args.kind {
        Kind::Coils => {
            let bits = request(REQUEST_TIMEOUT, ctx.read_coils(args.start, args.quantity)).await?;
            print_bits(args.start, &bits);
        }
        Kind::DiscreteInputs => {
            let bits = request(
                REQUEST_TIMEOUT,
                ctx.read_discrete_inputs(args.start, args.quantity),
            )
            .await?;
            print_bits(args.start, &bits);
        }
        Kind::Holding => {
            let words = request(
                REQUEST_TIMEOUT,
                ctx.read_holding_registers(args.start, args.quantity),
            )
            .await?;
            print_words(args.start, &words, args.float32);
        }
        Kind::Input => {
            let words = request(
                REQUEST_TIMEOUT,
                ctx.read_input_registers(args.start, args.quantity),
            )
            .await?;
            print_words(args.start, &words, args.float32);
        }
    }

    ctx.disconnect().await?;
    Ok(())
}

/// Await a Modbus request, giving up after `timeout`
async fn request<T, F>(timeout: Duration, pending: F) -> Result<T>
where
    F: Future<Output = tokio_modbus::Result<T>>,
{
    let response = time::timeout(timeout, pending)
        .await
        .with_context(|| format!("No response within {:?}", timeout))??;
    Ok(response?)
}

fn print_bits(start: u16, bits: &[bool]) {
    for (i, bit) in bits.iter().enumerate() {
        println!("Address {}: {}", usize::from(start) + i, bit);
    }
}

fn print_words(start: u16, words: &[u16], float32: bool) {
    println!("Raw register values: {:04X?}", words);
    for (i, word) in words.iter().enumerate() {
        println!("Register {}: {} (0x{:04X})", usize::from(start) + i, word, word);
    }
    if float32 {
        for (i, pair) in words.chunks_exact(2).enumerate() {
            let value = f32::from_bits((u32::from(pair[0]) << 16) | u32::from(pair[1]));
            let first = usize::from(start) + 2 * i;
            println!("Registers {}-{}: {}", first, first + 1, value);
        }
    }
}
