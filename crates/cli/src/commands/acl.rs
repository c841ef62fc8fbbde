//! acl command - Manage object access control lists
//!
//! Every change goes through the client's retry executor. Pass `--if-match`
//! with the entry's etag to make an update or removal safe to retry.

use clap::{Args, Subcommand};
use rsu_core::{
    AclPatch, CreateObjectAclRequest, ObjectAccessControl, ObjectAclRequest, ObjectRequest,
    PatchObjectAclRequest, Preconditions,
};
use serde::Serialize;

use super::{Connection, parse_object_path, report, setup_client};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

const ROLES: &[&str] = &["READER", "OWNER"];

#[derive(Subcommand, Debug)]
pub enum AclCommands {
    /// List the ACL entries of an object
    #[command(alias = "list")]
    Ls(AclObjectArgs),

    /// Show one ACL entry
    Get(AclEntityArgs),

    /// Grant a role to an entity
    Add(AclGrantArgs),

    /// Replace an existing entry
    Update(AclChangeArgs),

    /// Change the role of an existing entry, leaving other fields alone
    Patch(AclChangeArgs),

    /// Remove an entry
    #[command(alias = "remove")]
    Rm(AclRemoveArgs),
}

#[derive(Args, Debug)]
pub struct AclObjectArgs {
    /// Object path (bucket/object)
    pub path: String,

    /// Object generation (defaults to the live one)
    #[arg(long)]
    pub generation: Option<i64>,
}

#[derive(Args, Debug)]
pub struct AclEntityArgs {
    /// Object path (bucket/object)
    pub path: String,

    /// Entity, e.g. user-alice@example.com or allUsers
    pub entity: String,

    /// Object generation (defaults to the live one)
    #[arg(long)]
    pub generation: Option<i64>,
}

#[derive(Args, Debug)]
pub struct AclGrantArgs {
    /// Object path (bucket/object)
    pub path: String,

    /// Entity, e.g. user-alice@example.com or allUsers
    pub entity: String,

    /// READER or OWNER
    #[arg(value_parser = parse_role)]
    pub role: String,

    /// Object generation (defaults to the live one)
    #[arg(long)]
    pub generation: Option<i64>,
}

#[derive(Args, Debug)]
pub struct AclChangeArgs {
    /// Object path (bucket/object)
    pub path: String,

    /// Entity, e.g. user-alice@example.com or allUsers
    pub entity: String,

    /// READER or OWNER
    #[arg(value_parser = parse_role)]
    pub role: String,

    /// Only change the entry if its etag still matches
    #[arg(long, value_name = "ETAG")]
    pub if_match: Option<String>,

    /// Object generation (defaults to the live one)
    #[arg(long)]
    pub generation: Option<i64>,
}

#[derive(Args, Debug)]
pub struct AclRemoveArgs {
    /// Object path (bucket/object)
    pub path: String,

    /// Entity, e.g. user-alice@example.com or allUsers
    pub entity: String,

    /// Only remove the entry if its etag still matches
    #[arg(long, value_name = "ETAG")]
    pub if_match: Option<String>,

    /// Object generation (defaults to the live one)
    #[arg(long)]
    pub generation: Option<i64>,
}

#[derive(Debug, Serialize)]
struct AclListOutput {
    bucket: String,
    object: String,
    items: Vec<ObjectAccessControl>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct AclRemoveOutput {
    bucket: String,
    object: String,
    entity: String,
    status: &'static str,
}

/// Normalize a role name to the service's spelling
fn parse_role(role: &str) -> Result<String, String> {
    let upper = role.trim().to_ascii_uppercase();
    if ROLES.contains(&upper.as_str()) {
        Ok(upper)
    } else {
        Err(format!(
            "unknown role '{role}' (expected one of: {})",
            ROLES.join(", ")
        ))
    }
}

fn etag_precondition(if_match: Option<String>) -> Preconditions {
    match if_match {
        Some(etag) => Preconditions::new().if_match_etag(etag),
        None => Preconditions::new(),
    }
}

/// Execute an acl subcommand
pub async fn execute(cmd: AclCommands, connection: &Connection, formatter: &Formatter) -> ExitCode {
    match cmd {
        AclCommands::Ls(args) => execute_ls(args, connection, formatter).await,
        AclCommands::Get(args) => execute_get(args, connection, formatter).await,
        AclCommands::Add(args) => execute_add(args, connection, formatter).await,
        AclCommands::Update(args) => execute_change(args, false, connection, formatter).await,
        AclCommands::Patch(args) => execute_change(args, true, connection, formatter).await,
        AclCommands::Rm(args) => execute_rm(args, connection, formatter).await,
    }
}

async fn execute_ls(args: AclObjectArgs, connection: &Connection, formatter: &Formatter) -> ExitCode {
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

    let items = match client.list_object_acl(request).await {
        Ok(items) => items,
        Err(e) => return report(formatter, "Failed to list ACL", &e),
    };

    if formatter.is_json() {
        formatter.json(&AclListOutput {
            bucket,
            object,
            count: items.len(),
            items,
        });
    } else if items.is_empty() {
        formatter.println("No ACL entries");
    } else {
        formatter.println(&render_table(&items, formatter));
    }
    ExitCode::Success
}

async fn execute_get(args: AclEntityArgs, connection: &Connection, formatter: &Formatter) -> ExitCode {
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

    let mut request = ObjectAclRequest::new(&bucket, &object, &args.entity);
    request.generation = args.generation;

    match client.get_object_acl(request).await {
        Ok(acl) => {
            print_entry(&acl, formatter);
            ExitCode::Success
        }
        Err(e) => report(formatter, "Failed to get ACL entry", &e),
    }
}

async fn execute_add(args: AclGrantArgs, connection: &Connection, formatter: &Formatter) -> ExitCode {
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

    let mut request = CreateObjectAclRequest::new(&bucket, &object, &args.entity, &args.role);
    request.generation = args.generation;

    match client.create_object_acl(request).await {
        Ok(acl) => {
            if formatter.is_json() {
                formatter.json(&acl);
            } else {
                formatter.success(&format!("Granted {} to {}", acl.role, acl.entity));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, "Failed to add ACL entry", &e),
    }
}

async fn execute_change(
    args: AclChangeArgs,
    patch: bool,
    connection: &Connection,
    formatter: &Formatter,
) -> ExitCode {
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

    let preconditions = etag_precondition(args.if_match);
    let result = if patch {
        let mut request = PatchObjectAclRequest::new(
            &bucket,
            &object,
            &args.entity,
            AclPatch::new().set_role(&args.role),
        )
        .with_preconditions(preconditions);
        request.generation = args.generation;
        client.patch_object_acl(request).await
    } else {
        let mut request = CreateObjectAclRequest::new(&bucket, &object, &args.entity, &args.role)
            .with_preconditions(preconditions);
        request.generation = args.generation;
        client.update_object_acl(request).await
    };

    match result {
        Ok(acl) => {
            if formatter.is_json() {
                formatter.json(&acl);
            } else {
                formatter.success(&format!(
                    "Set {} to {} (etag {})",
                    acl.entity, acl.role, acl.etag
                ));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, "Failed to change ACL entry", &e),
    }
}

async fn execute_rm(args: AclRemoveArgs, connection: &Connection, formatter: &Formatter) -> ExitCode {
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

    let mut request = ObjectAclRequest::new(&bucket, &object, &args.entity)
        .with_preconditions(etag_precondition(args.if_match));
    request.generation = args.generation;

    match client.delete_object_acl(request).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&AclRemoveOutput {
                    bucket,
                    object,
                    entity: args.entity,
                    status: "removed",
                });
            } else {
                formatter.success(&format!("Removed {} from {bucket}/{object}", args.entity));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, "Failed to remove ACL entry", &e),
    }
}

fn print_entry(acl: &ObjectAccessControl, formatter: &Formatter) {
    if formatter.is_json() {
        formatter.json(acl);
        return;
    }

    let field = |key: &str, value: &str| {
        if !value.is_empty() {
            formatter.println(&format!(
                "{} {value}",
                formatter.style_key(&format!("{:<10}", format!("{key}:")))
            ));
        }
    };
    field("Entity", &acl.entity);
    field("Role", &acl.role);
    field("Email", &acl.email);
    field("Domain", &acl.domain);
    field("ETag", &acl.etag);
}

fn render_table(items: &[ObjectAccessControl], formatter: &Formatter) -> String {
    let mut table = formatter.table(&["ENTITY", "ROLE", "EMAIL", "ETAG"]);
    for acl in items {
        table.add_row(vec![
            acl.entity.as_str(),
            acl.role.as_str(),
            acl.email.as_str(),
            acl.etag.as_str(),
        ]);
    }
    table.to_string()
}
