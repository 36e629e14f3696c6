//! CLI argument definitions and dispatch.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::models::{FileEntry, FileSetRef};
use crate::server::{self, AppState};
use crate::session::SessionManager;
use crate::store::{FakeSheetStore, HttpSheetStore, SheetStore};
use crate::transport::{ExecScript, FakeTransport, OpenSshTransport, RemoteTransport};

/// Sheetrun - run sheets of source files on a remote host
#[derive(Parser, Debug)]
#[command(name = "sheetrun")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the orchestration server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Run against in-memory fakes instead of the sheet store and
        /// SSH. Serves a seeded "demo"/"v1" sheet for local testing.
        #[arg(long)]
        fake: bool,
    },
}

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve { port, fake } => {
            let config = Config::from_env();
            let (store, transport) = if fake {
                fake_backends()
            } else {
                (
                    Arc::new(HttpSheetStore::new(config.store_url.clone())) as Arc<dyn SheetStore>,
                    Arc::new(OpenSshTransport) as Arc<dyn RemoteTransport>,
                )
            };
            let state = Arc::new(AppState {
                store,
                transport,
                sessions: SessionManager::new(),
                config,
            });
            server::start_server(state, port).await
        }
    }
}

/// In-memory store and transport with one runnable demo sheet.
fn fake_backends() -> (Arc<dyn SheetStore>, Arc<dyn RemoteTransport>) {
    let store = FakeSheetStore::new();
    store.insert(
        &FileSetRef {
            sheet_id: "demo".into(),
            version_id: "v1".into(),
        },
        vec![FileEntry::new(
            "main.py",
            "print('hello from sheetrun')\n",
            "python",
        )],
    );
    let transport = FakeTransport::with_script(ExecScript {
        chunks: vec!["hello from sheetrun\r\n".into()],
        exit_code: Some(0),
        ..ExecScript::default()
    });
    (Arc::new(store), Arc::new(transport))
}
