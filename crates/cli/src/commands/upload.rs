//! upload command - Resumable file upload
//!
//! Streams a local file through a resumable session. With `--state-file`,
//! Ctrl-C suspends the upload and records the session so that running the
//! same command again continues from the offset the service reports.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use indicatif::ProgressBar;
use rsu_core::{
    ObjectMetadata, ObjectWriteStream, Preconditions, ResumableUploadRequest, SessionState,
    StatusCode, SuspendedUpload, UploadOptions,
};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::{Connection, parse_object_path, report, setup_client};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Upload a file
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local file to upload
    pub file: PathBuf,

    /// Destination (bucket/object)
    pub target: String,

    /// Content type (guessed from the file name when omitted)
    #[arg(long)]
    pub content_type: Option<String>,

    /// Chunk size in bytes, rounded up to a multiple of 256 KiB
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<usize>,

    /// Only write if the live generation matches (0: object must not exist)
    #[arg(long, value_name = "GENERATION")]
    pub if_generation_match: Option<i64>,

    /// Record the session here so an interrupted upload can be resumed
    #[arg(long, value_name = "PATH")]
    pub state_file: Option<PathBuf>,
}

/// Contents of the state file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadState {
    bucket: String,
    object: String,
    file_size: u64,
    #[serde(flatten)]
    upload: SuspendedUpload,
}

impl UploadState {
    fn matches(&self, bucket: &str, object: &str, file_size: u64) -> bool {
        self.bucket == bucket && self.object == object && self.file_size == file_size
    }
}

#[derive(Debug, Serialize)]
struct UploadOutput {
    bucket: String,
    object: String,
    size: i64,
    size_human: String,
    generation: i64,
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resumed_from: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SuspendedOutput {
    status: &'static str,
    session_id: String,
    committed_size: u64,
    state_file: Option<PathBuf>,
}

/// Execute the upload command
pub async fn execute(args: UploadArgs, connection: &Connection, formatter: &Formatter) -> ExitCode {
    let (bucket, object) = match parse_object_path(&args.target) {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    let file_size = match tokio::fs::metadata(&args.file).await {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => {
            formatter.error(&format!("'{}' is not a regular file", args.file.display()));
            return ExitCode::UsageError;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            formatter.error(&format!("File not found: {}", args.file.display()));
            return ExitCode::NotFound;
        }
        Err(e) => {
            formatter.error(&format!("Cannot read '{}': {e}", args.file.display()));
            return ExitCode::GeneralError;
        }
    };

    let saved = match args.state_file.as_deref().map(load_state).transpose() {
        Ok(saved) => saved.flatten(),
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::GeneralError;
        }
    };
    if let Some(state) = &saved
        && !state.matches(&bucket, &object, file_size)
    {
        formatter.error(&format!(
            "State file belongs to an upload of {} bytes to {}/{}",
            state.file_size, state.bucket, state.object
        ));
        return ExitCode::UsageError;
    }

    let content_type = args.content_type.clone().unwrap_or_else(|| {
        mime_guess::from_path(&args.file)
            .first_or_octet_stream()
            .to_string()
    });
    let mut preconditions = Preconditions::new();
    if let Some(generation) = args.if_generation_match {
        preconditions = preconditions.if_generation_match(generation);
    }
    let request = ResumableUploadRequest::new(&bucket, &object)
        .with_content_type(&content_type)
        .with_preconditions(preconditions);

    let mut options = match &saved {
        Some(state) => UploadOptions::restore(&state.upload.session_id),
        None => UploadOptions::new(),
    };
    if let Some(size) = args.chunk_size {
        options = options.with_chunk_size(size);
    }

    let client = match setup_client(connection, formatter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let mut stream = match client.write_object(request, options).await {
        Ok(s) => s,
        Err(e) if saved.is_some() && e.code() == StatusCode::NotFound => {
            formatter.error(&format!(
                "The saved upload session no longer exists; remove {} to start over",
                args.state_file.as_deref().unwrap_or(Path::new("")).display()
            ));
            return ExitCode::NotFound;
        }
        Err(e) => return report(formatter, "Failed to start upload", &e),
    };

    let offset = stream.next_expected_byte();
    if offset > file_size {
        formatter.error(&format!(
            "The service has {offset} bytes committed but the file only has {file_size}"
        ));
        return ExitCode::Conflict;
    }
    let resumed_from = saved.is_some().then_some(offset);
    if offset > 0 && !formatter.is_json() {
        formatter.println(&format!(
            "Resuming upload at {} of {}",
            formatter.format_size(offset),
            formatter.format_size(file_size)
        ));
    }

    let mut state = UploadState {
        bucket: bucket.clone(),
        object: object.clone(),
        file_size,
        upload: SuspendedUpload {
            session_id: stream.session_id().to_string(),
            committed_size: offset,
        },
    };
    if let Some(path) = &args.state_file
        && let Err(e) = save_state(path, &state)
    {
        formatter.warning(&format!("{e:#}"));
    }

    let progress = formatter.progress_bar(file_size, &object);
    if let Some(pb) = &progress {
        pb.set_position(offset);
    }

    let outcome = tokio::select! {
        result = send_file(&args.file, offset, &mut stream, progress.as_ref()) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    let result = match outcome {
        Some(result) => result,
        None => {
            return suspend(stream, &mut state, args.state_file.as_deref(), formatter);
        }
    };

    match result {
        Ok(metadata) => {
            if let Some(path) = &args.state_file {
                clear_state(path);
            }

            let output = UploadOutput {
                bucket,
                object,
                size: metadata.size,
                size_human: formatter.format_size(metadata.size.max(0) as u64),
                generation: metadata.generation,
                content_type: metadata.content_type.clone(),
                resumed_from,
            };
            if formatter.is_json() {
                formatter.json(&output);
            } else {
                formatter.success(&format!(
                    "Uploaded {} to {} ({}, generation {})",
                    args.file.display(),
                    formatter.style_name(&format!("{}/{}", output.bucket, output.object)),
                    formatter.style_size(&output.size_human),
                    output.generation
                ));
            }
            ExitCode::Success
        }
        Err(e) => match e.downcast_ref::<rsu_core::Error>() {
            Some(error) => {
                if let Some(path) = &args.state_file {
                    if error.is_exhausted() {
                        formatter.warning(&format!(
                            "Upload state kept in {}; run the command again to resume",
                            path.display()
                        ));
                    } else {
                        clear_state(path);
                    }
                }
                report(formatter, "Upload failed", error)
            }
            None => {
                formatter.error(&format!("Upload failed: {e:#}"));
                ExitCode::GeneralError
            }
        },
    }
}

/// Stream the file from `offset` and finalize the object
async fn send_file(
    path: &Path,
    offset: u64,
    stream: &mut ObjectWriteStream,
    progress: Option<&ProgressBar>,
) -> anyhow::Result<ObjectMetadata> {
    if stream.state() == SessionState::Closed {
        return Ok(stream.metadata().await?);
    }

    let mut file = File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.seek(SeekFrom::Start(offset))
        .await
        .with_context(|| format!("failed to seek {} to {offset}", path.display()))?;

    let mut buffer = vec![0u8; stream.chunk_size()];
    loop {
        let n = file
            .read(&mut buffer)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        stream.write(&buffer[..n]).await?;
        if let Some(pb) = progress {
            pb.inc(n as u64);
        }
    }

    Ok(stream.close().await?)
}

fn suspend(
    stream: ObjectWriteStream,
    state: &mut UploadState,
    state_file: Option<&Path>,
    formatter: &Formatter,
) -> ExitCode {
    let suspended = match stream.state() {
        // Interrupted while the last chunk was in flight. The service may
        // already hold the object; restoring the session tells either way.
        SessionState::Finalizing => SuspendedUpload {
            session_id: stream.session_id().to_string(),
            committed_size: stream.next_expected_byte(),
        },
        _ => match stream.suspend() {
            Ok(s) => s,
            Err(e) => {
                formatter.error(&format!("Upload interrupted and could not be suspended: {e}"));
                return ExitCode::Interrupted;
            }
        },
    };

    state.upload = suspended.clone();
    if let Some(path) = state_file
        && let Err(e) = save_state(path, state)
    {
        formatter.error(&format!("{e:#}"));
    }

    if formatter.is_json() {
        formatter.json(&SuspendedOutput {
            status: "suspended",
            session_id: suspended.session_id,
            committed_size: suspended.committed_size,
            state_file: state_file.map(Path::to_path_buf),
        });
    } else {
        match state_file {
            Some(path) => formatter.warning(&format!(
                "Upload suspended at {}; run the same command to resume (state in {})",
                formatter.format_size(suspended.committed_size),
                path.display()
            )),
            None => formatter.warning(&format!(
                "Upload suspended at {}; session {}",
                formatter.format_size(suspended.committed_size),
                formatter.style_url(&suspended.session_id)
            )),
        }
    }
    ExitCode::Interrupted
}

fn load_state(path: &Path) -> anyhow::Result<Option<UploadState>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read upload state {}", path.display()))?;
    let state = serde_json::from_str(&content)
        .with_context(|| format!("invalid upload state in {}", path.display()))?;
    Ok(Some(state))
}

fn save_state(path: &Path, state: &UploadState) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(state)?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write upload state {}", path.display()))?;
    tracing::debug!(path = %path.display(), committed = state.upload.committed_size, "Saved upload state");
    Ok(())
}

fn clear_state(path: &Path) {
    if let Err(e) = std::fs::remove_file(path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove upload state");
    }
}
