//! stat command - Show object metadata

use clap::Args;
use rsu_core::{ObjectMetadata, ObjectRequest};

use super::{Connection, parse_object_path, report, setup_client};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Show object metadata
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Object path (bucket/object)
    pub path: String,

    /// Describe this generation instead of the live one
    #[arg(long)]
    pub generation: Option<i64>,
}

/// Execute the stat command
pub async fn execute(args: StatArgs, connection: &Connection, formatter: &Formatter) -> ExitCode {
    let (bucket, object) = match parse_object_path(&args.path) {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    let client = match setup_client(connection, formatter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let mut request = ObjectRequest::new(&bucket, &object);
    request.generation = args.generation;

    match client.get_object_metadata(request).await {
        Ok(metadata) => {
            if formatter.is_json() {
                formatter.json(&metadata);
            } else {
                for line in render(&metadata, formatter) {
                    formatter.println(&line);
                }
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, "Failed to get object metadata", &e),
    }
}

fn render(metadata: &ObjectMetadata, formatter: &Formatter) -> Vec<String> {
    let line = |key: &str, value: String| {
        format!("{} {value}", formatter.style_key(&format!("{:<15}", format!("{key}:"))))
    };

    let mut lines = vec![
        line(
            "Name",
            formatter.style_name(&format!("{}/{}", metadata.bucket, metadata.name)),
        ),
        line(
            "Size",
            format!(
                "{} ({} bytes)",
                formatter.style_size(&formatter.format_size(metadata.size.max(0) as u64)),
                metadata.size
            ),
        ),
        line("Generation", metadata.generation.to_string()),
        line("Metageneration", metadata.metageneration.to_string()),
    ];

    if let Some(content_type) = &metadata.content_type {
        lines.push(line("Content-Type", content_type.clone()));
    }
    if let Some(class) = &metadata.storage_class {
        lines.push(line("Storage Class", class.clone()));
    }
    if let Some(created) = &metadata.time_created {
        lines.push(line("Created", formatter.style_date(&created.to_string())));
    }
    if let Some(etag) = &metadata.etag {
        lines.push(line("ETag", etag.clone()));
    }
    if let Some(md5) = &metadata.md5_hash {
        lines.push(line("MD5", md5.clone()));
    }
    if let Some(crc) = &metadata.crc32c {
        lines.push(line("CRC32C", crc.clone()));
    }
    for (key, value) in &metadata.metadata {
        lines.push(line(&format!("  {key}"), value.clone()));
    }

    lines
}
