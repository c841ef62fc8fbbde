//! download command - Read an object into a local file

use std::path::PathBuf;

use clap::Args;
use rsu_core::ReadObjectRequest;
use serde::Serialize;

use super::{Connection, parse_object_path, report, setup_client};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Download an object
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Source object (bucket/object)
    pub source: String,

    /// Local destination file
    pub dest: PathBuf,

    /// Read this generation instead of the live one
    #[arg(long)]
    pub generation: Option<i64>,

    /// Overwrite the destination if it exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct DownloadOutput {
    bucket: String,
    object: String,
    path: PathBuf,
    size: usize,
    size_human: String,
}

/// Execute the download command
pub async fn execute(
    args: DownloadArgs,
    connection: &Connection,
    formatter: &Formatter,
) -> ExitCode {
    let (bucket, object) = match parse_object_path(&args.source) {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    if args.dest.exists() && !args.force {
        formatter.error(&format!(
            "'{}' already exists (use --force to overwrite)",
            args.dest.display()
        ));
        return ExitCode::UsageError;
    }

    let client = match setup_client(connection, formatter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let mut request = ReadObjectRequest::new(&bucket, &object);
    request.generation = args.generation;

    let data = match client.read_object(request).await {
        Ok(data) => data,
        Err(e) => return report(formatter, "Failed to download object", &e),
    };

    if let Err(e) = tokio::fs::write(&args.dest, &data).await {
        formatter.error(&format!("Failed to write '{}': {e}", args.dest.display()));
        return ExitCode::GeneralError;
    }

    let output = DownloadOutput {
        bucket,
        object,
        path: args.dest,
        size: data.len(),
        size_human: formatter.format_size(data.len() as u64),
    };
    if formatter.is_json() {
        formatter.json(&output);
    } else {
        formatter.success(&format!(
            "Downloaded {} to {} ({})",
            formatter.style_name(&format!("{}/{}", output.bucket, output.object)),
            output.path.display(),
            formatter.style_size(&output.size_human)
        ));
    }
    ExitCode::Success
}
