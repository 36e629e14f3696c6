//! Sheetrun - execute sheets of source files on a remote host.
//!
//! For each client WebSocket session the server provisions a unique
//! scratch workspace over SSH, uploads the sheet's files, launches the
//! language-appropriate command under a pseudo-terminal, and streams
//! terminal I/O back in real time.
//!
//! Architecture:
//! - The SSH/SFTP wire protocols are delegated to the OpenSSH client
//!   binary behind a transport trait; this crate implements the
//!   orchestration on top
//! - File sets come from the sheet store service by reference; the
//!   store is a collaborator, not part of this crate

mod cli;
mod command;
mod config;
mod envfile;
mod error;
mod models;
mod server;
mod session;
mod store;
mod transport;
mod workspace;

use anyhow::Result;
use clap::Parser;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    cli::execute(cli).await
}
