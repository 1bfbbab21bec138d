use anyhow::{Result, bail};
use serde_json::json;
use std::io::Write;
use std::sync::{Arc, Mutex};
use termagent_client::AgentClient;
use termagent_core::{StreamCallback, StreamEvent};

use crate::context::CliContext;
use crate::output::print_json;

#[derive(Default)]
struct Collected {
    text: String,
    errors: Vec<String>,
}

pub(crate) fn run_send(ctx: &CliContext, message: &str, no_stream: bool, json: bool) -> Result<()> {
    let message = message.trim();
    if message.is_empty() {
        bail!("message is empty; nothing was sent");
    }
    let max = ctx.cfg.server.max_message_length;
    let len = message.chars().count();
    if max > 0 && len > max {
        bail!("message too long ({len} characters, limit {max})");
    }

    let client = ctx.client()?;
    if no_stream {
        let reply = client.chat(message)?;
        if json {
            print_json(&json!({ "response": reply }))?;
        } else {
            println!("{reply}");
        }
        return Ok(());
    }

    let collected = Arc::new(Mutex::new(Collected::default()));
    let sink = Arc::clone(&collected);
    let cb: StreamCallback = Arc::new(move |event: StreamEvent| match event {
        StreamEvent::Message { content } => {
            if json {
                if let Ok(mut c) = sink.lock() {
                    c.text.push_str(&content);
                }
            } else {
                let mut out = std::io::stdout().lock();
                let _ = out.write_all(content.as_bytes());
                let _ = out.flush();
            }
        }
        StreamEvent::Error { content } => {
            if !json {
                eprintln!("Error: {content}");
            }
            if let Ok(mut c) = sink.lock() {
                c.errors.push(content);
            }
        }
        StreamEvent::End => {}
    });

    let summary = client.stream(message, cb)?;
    let collected = collected
        .lock()
        .map_err(|_| anyhow::anyhow!("stream output lock poisoned"))?;
    if json {
        print_json(&json!({
            "request_id": summary.request_id,
            "response": collected.text,
            "errors": collected.errors,
            "events": summary.events,
            "skipped_lines": summary.skipped_lines,
            "saw_end": summary.saw_end,
        }))?;
    } else {
        println!();
    }
    Ok(())
}
