//! CLI commands
//!
//! Each command builds its own client from the configuration file and the
//! global connection flags, runs, and reports an [`ExitCode`].

pub mod acl;
pub mod download;
pub mod rm;
pub mod stat;
pub mod upload;

use std::sync::Arc;

use clap::Subcommand;
use rsu_core::{Client, ConfigManager};
use rsu_http::HttpTransport;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Where and how to reach the service
#[derive(Debug, Clone, Default)]
pub struct Connection {
    /// Overrides the endpoint from the configuration file
    pub endpoint: Option<String>,
    pub token: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a file through a resumable session
    Upload(upload::UploadArgs),

    /// Download an object to a file
    Download(download::DownloadArgs),

    /// Show object metadata
    Stat(stat::StatArgs),

    /// Delete an object
    Rm(rm::RmArgs),

    /// Manage object access control lists
    #[command(subcommand)]
    Acl(acl::AclCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}

/// Execute a command other than `completions`
pub async fn execute(
    command: Commands,
    connection: &Connection,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    match command {
        Commands::Upload(args) => upload::execute(args, connection, &formatter).await,
        Commands::Download(args) => download::execute(args, connection, &formatter).await,
        Commands::Stat(args) => stat::execute(args, connection, &formatter).await,
        Commands::Rm(args) => rm::execute(args, connection, &formatter).await,
        Commands::Acl(cmd) => acl::execute(cmd, connection, &formatter).await,
        Commands::Completions(_) => {
            formatter.error("completions are generated before any command runs");
            ExitCode::GeneralError
        }
    }
}

/// Build a client from the configuration file and the connection flags
pub fn setup_client(connection: &Connection, formatter: &Formatter) -> Result<Client, ExitCode> {
    let config = match ConfigManager::new().and_then(|manager| manager.load()) {
        Ok(config) => config,
        Err(e) => {
            formatter.error(&format!("Failed to load configuration: {e}"));
            return Err(ExitCode::GeneralError);
        }
    };

    let endpoint = connection.endpoint.as_deref().unwrap_or(&config.endpoint);
    let transport = match HttpTransport::new(endpoint, connection.token.clone()) {
        Ok(t) => t,
        Err(e) => {
            formatter.error(&format!("Failed to create HTTP client: {e}"));
            return Err(ExitCode::UsageError);
        }
    };
    tracing::debug!(endpoint, "Using storage endpoint");

    match Client::from_config(Arc::new(transport), &config) {
        Ok(client) => Ok(client),
        Err(e) => {
            formatter.error(&format!("Invalid configuration: {e}"));
            Err(ExitCode::GeneralError)
        }
    }
}

/// Print a failed operation and map it to an exit code
pub fn report(formatter: &Formatter, action: &str, error: &rsu_core::Error) -> ExitCode {
    formatter.error(&format!("{action}: {error}"));
    ExitCode::from(error)
}

/// Split `bucket/object` into its parts
pub fn parse_object_path(path: &str) -> Result<(String, String), String> {
    if path.is_empty() {
        return Err("Path cannot be empty".to_string());
    }

    match path.split_once('/') {
        Some((bucket, object)) if !bucket.is_empty() && !object.is_empty() => {
            Ok((bucket.to_string(), object.to_string()))
        }
        _ => Err(format!("Expected bucket/object, got '{path}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_path() {
        let (bucket, object) = parse_object_path("mybucket/path/to/file.txt").unwrap();
        assert_eq!(bucket, "mybucket");
        assert_eq!(object, "path/to/file.txt");
    }

    #[test]
    fn test_parse_object_path_errors() {
        assert!(parse_object_path("").is_err());
        assert!(parse_object_path("mybucket").is_err());
        assert!(parse_object_path("mybucket/").is_err());
        assert!(parse_object_path("/object").is_err());
    }
}
