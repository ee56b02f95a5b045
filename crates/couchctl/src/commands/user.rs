//! User document commands

use super::CommandContext;
use crate::cli::UserCommands;
use crate::error::{CouchCtlError, Result as CliResult};
use crate::output::OutputFormat;
use serde_json::Value;
use std::io::IsTerminal;
use tracing::debug;

pub async fn handle_user_command(cmd: &UserCommands, ctx: &CommandContext<'_>) -> CliResult<()> {
    let (conn, _) = ctx.connection().await?;

    match cmd {
        UserCommands::List => {
            let names = conn.list_user_names().await?;
            debug!("{} user(s)", names.len());
            ctx.print(names, OutputFormat::Table)
        }
        UserCommands::Get { name } => {
            let doc = conn.get_user_info(name).await?;
            ctx.print(doc, OutputFormat::Json)
        }
        UserCommands::Create {
            name,
            new_password,
            roles,
        } => {
            let password = match new_password {
                Some(password) => password.clone(),
                None if std::io::stdin().is_terminal() => {
                    rpassword::prompt_password(format!("Password for new user {}: ", name))?
                }
                None => String::new(),
            };
            let reply = check_reply(conn.create_user(name, &password, roles).await?)?;
            ctx.print(reply, OutputFormat::Table)
        }
        UserCommands::Delete { name } => {
            let reply = check_reply(conn.delete_user(name).await?)?;
            ctx.print(reply, OutputFormat::Table)
        }
    }
}

/// Document writes come back as `{"ok": true, ...}` or as an error body such
/// as a revision conflict
fn check_reply(reply: Value) -> CliResult<Value> {
    match reply.get("error").and_then(Value::as_str) {
        Some(error) => {
            let reason = reply
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Err(CouchCtlError::ApiError {
                message: format!("{}: {}", error, reason),
            })
        }
        None => Ok(reply),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_reply_passes_ok() {
        let reply = json!({"ok": true, "id": "org.couchdb.user:alice", "rev": "1-abc"});
        assert_eq!(check_reply(reply.clone()).unwrap(), reply);
    }

    #[test]
    fn test_check_reply_surfaces_conflict() {
        let err = check_reply(json!({
            "error": "conflict",
            "reason": "Document update conflict."
        }))
        .unwrap_err();
        assert!(matches!(err, CouchCtlError::ApiError { .. }));
        assert!(err.to_string().contains("conflict: Document update conflict."));
    }
}
