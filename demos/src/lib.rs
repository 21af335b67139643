//! Shared CLI surface for the sample clients: every demo connects the same
//! way, so the connection arguments live in one place.

use std::path::PathBuf;

use clap::Args;
use snfs_client::{ClientContext, ClientError, FileClient};

#[derive(Debug, Args)]
pub struct ConnectArgs {
    /// Path the server's socket is bound at.
    #[arg(long)]
    pub socket: PathBuf,

    /// Path to bind this client's own socket at.
    #[arg(long)]
    pub local_socket: PathBuf,
}

impl ConnectArgs {
    /// Connects a [`FileClient`] using these arguments.
    ///
    /// # Errors
    ///
    /// See [`FileClient::init`].
    pub fn connect(&self) -> Result<FileClient, ClientError> {
        FileClient::init(&self.socket, &self.local_socket)
    }

    /// Connects the raw [`ClientContext`] stub, for demos that need calls
    /// (like `ping`) the file API does not expose.
    ///
    /// # Errors
    ///
    /// See [`ClientContext::connect`].
    pub fn connect_stub(&self) -> Result<ClientContext, ClientError> {
        ClientContext::connect(&self.socket, &self.local_socket)
    }
}
