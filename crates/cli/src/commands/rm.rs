//! rm command - Delete an object

use clap::Args;
use rsu_core::{ObjectRequest, Preconditions};
use serde::Serialize;

use super::{Connection, parse_object_path, report, setup_client};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Delete an object
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object path (bucket/object)
    pub path: String,

    /// Delete this generation instead of the live one
    #[arg(long)]
    pub generation: Option<i64>,

    /// Only delete if the live generation matches
    #[arg(long, value_name = "GENERATION")]
    pub if_generation_match: Option<i64>,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    bucket: String,
    object: String,
    status: &'static str,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, connection: &Connection, formatter: &Formatter) -> ExitCode {
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

    let mut preconditions = Preconditions::new();
    if let Some(generation) = args.if_generation_match {
        preconditions = preconditions.if_generation_match(generation);
    }
    let mut request = ObjectRequest::new(&bucket, &object).with_preconditions(preconditions);
    request.generation = args.generation;

    match client.delete_object(request).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&RmOutput {
                    bucket,
                    object,
                    status: "removed",
                });
            } else {
                formatter.success(&format!(
                    "Removed {}",
                    formatter.style_name(&format!("{bucket}/{object}"))
                ));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, "Failed to remove object", &e),
    }
}
