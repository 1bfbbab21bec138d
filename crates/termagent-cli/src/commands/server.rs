use anyhow::Result;
use serde_json::json;
use termagent_client::AgentClient;

use crate::context::CliContext;
use crate::output::print_json;

/// Reports reachability. An unreachable server is an answer, not a failure.
pub(crate) fn run_status(ctx: &CliContext, json: bool) -> Result<()> {
    let client = ctx.client()?;
    match client.status() {
        Ok(status) => {
            if json {
                print_json(&json!({
                    "online": true,
                    "base_url": ctx.base_url,
                    "status": status.status,
                    "model": status.model,
                    "message": status.message,
                }))?;
            } else {
                match status.model.as_deref() {
                    Some(model) => println!("online ({model}) at {}", ctx.base_url),
                    None => println!("online at {}", ctx.base_url),
                }
            }
        }
        Err(e) => {
            ctx.observer.warn_log(&format!("status check failed: {e}"));
            if json {
                print_json(&json!({
                    "online": false,
                    "base_url": ctx.base_url,
                    "error": e.to_string(),
                }))?;
            } else {
                println!("offline at {}", ctx.base_url);
            }
        }
    }
    Ok(())
}

pub(crate) fn run_clear(ctx: &CliContext, json: bool) -> Result<()> {
    ctx.client()?.clear()?;
    if json {
        print_json(&json!({ "cleared": true }))?;
    } else {
        println!("{}", ctx.cfg.ui.greeting);
    }
    Ok(())
}

pub(crate) fn run_health(ctx: &CliContext, json: bool) -> Result<()> {
    let healthy = ctx.client()?.health()?;
    if json {
        print_json(&json!({ "healthy": healthy, "base_url": ctx.base_url }))?;
    } else {
        println!("{}", if healthy { "healthy" } else { "degraded" });
    }
    Ok(())
}
