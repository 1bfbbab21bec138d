use anyhow::{Result, bail};
use std::io::IsTerminal;
use std::sync::Arc;
use termagent_ui::{
    ChatSession, ControllerOptions, KeyBindings, TerminalController, TuiTheme, load_keybindings,
    run_tui,
};

use crate::context::CliContext;

pub(crate) fn run_chat(mut ctx: CliContext) -> Result<()> {
    if !std::io::stdout().is_terminal() || !std::io::stdin().is_terminal() {
        bail!("interactive chat needs a terminal; use `termagent send <MESSAGE>` instead");
    }
    let bindings = load_bindings(&ctx);

    // The chat screen owns the terminal from here on.
    ctx.observer.set_quiet(true);
    let client = ctx.client()?;
    let controller = TerminalController::new(ControllerOptions {
        greeting: ctx.cfg.ui.greeting.clone(),
        max_message_length: ctx.cfg.server.max_message_length,
        reduced_motion: ctx.cfg.ui.reduced_motion,
    });
    let session = ChatSession::new(
        controller,
        bindings,
        Arc::new(client),
        Some(ctx.observer.clone()),
    );
    run_tui(session, TuiTheme::from_config(&ctx.cfg.theme))
}

fn load_bindings(ctx: &CliContext) -> KeyBindings {
    let Some(path) = ctx.keybindings_path().filter(|p| p.exists()) else {
        return KeyBindings::default();
    };
    match load_keybindings(&path) {
        Ok(bindings) => bindings,
        Err(e) => {
            ctx.observer.warn_log(&format!(
                "ignoring invalid keybindings file {}: {e}",
                path.display()
            ));
            KeyBindings::default()
        }
    }
}
