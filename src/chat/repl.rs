// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Interactive chat loop

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use crate::error::Result;
use crate::history::{SessionHistoryStore, TurnRole};

const PROMPT: &str = ">> ";

/// One parsed line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Blank line
    Empty,
    /// /exit or /quit
    Exit,
    /// /help
    Help,
    /// /history
    History,
    /// /session with no argument
    ShowSession,
    /// /session <id>
    SwitchSession(String),
    /// /sessions
    ListSessions,
    /// Any other /command
    Unknown(String),
    /// Text for the model
    Message(String),
}

/// Something that answers messages in a session, driven by `run_repl`
#[async_trait(?Send)]
pub trait Responder {
    fn history(&self) -> &SessionHistoryStore;

    /// Session the loop starts in
    fn default_session(&self) -> &str;

    fn model(&self) -> &str;

    /// Answer `input` in `session_id`
    ///
    /// Implementations that stream hand each fragment to `on_delta`;
    /// others leave it uncalled and only return the reply.
    async fn reply(
        &self,
        session_id: &str,
        input: &str,
        on_delta: &mut dyn for<'d> FnMut(&'d str),
    ) -> Result<String>;
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return ReplCommand::Message(line.to_string());
        };

        let mut parts = rest.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        match (command, arg) {
            ("exit" | "quit", _) => ReplCommand::Exit,
            ("help", _) => ReplCommand::Help,
            ("history", _) => ReplCommand::History,
            ("sessions", _) => ReplCommand::ListSessions,
            ("session", None) => ReplCommand::ShowSession,
            ("session", Some(id)) => ReplCommand::SwitchSession(id.to_string()),
            (other, _) => ReplCommand::Unknown(other.to_string()),
        }
    }
}

fn print_label<W: Write>(out: &mut W, label: &str, color: Color) -> Result<()> {
    out.execute(SetForegroundColor(color))?;
    write!(out, "{}", label)?;
    out.execute(ResetColor)?;
    Ok(())
}

fn print_help<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "Commands:")?;
    writeln!(out, "  /history         show this session's messages")?;
    writeln!(out, "  /session         show the current session")?;
    writeln!(out, "  /session <id>    switch to another session")?;
    writeln!(out, "  /sessions        list sessions")?;
    writeln!(out, "  /exit            leave")?;
    Ok(())
}

/// Read lines from `input` until EOF or /exit, answering each message
///
/// Inference errors are printed and the loop continues; only terminal I/O
/// errors end it early.
pub async fn run_repl<T, R, W>(responder: &T, input: R, mut out: W) -> Result<()>
where
    T: Responder + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut session_id = responder.default_session().to_string();
    let mut lines = input.lines();

    tracing::info!(session_id = %session_id, model = %responder.model(), "chat started");

    loop {
        print_label(&mut out, PROMPT, Color::Green)?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            break;
        };
        let line = line?;

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Exit => break,
            ReplCommand::Help => print_help(&mut out)?,
            ReplCommand::History => {
                let turns = responder.history().snapshot(&session_id);
                if turns.is_empty() {
                    writeln!(out, "(no messages in '{}')", session_id)?;
                }
                for turn in turns {
                    let color = match turn.role() {
                        TurnRole::User => Color::Green,
                        TurnRole::Assistant => Color::Cyan,
                    };
                    print_label(&mut out, &format!("{}: ", turn.role()), color)?;
                    writeln!(out, "{}", turn.text())?;
                }
            }
            ReplCommand::ShowSession => writeln!(out, "session: {}", session_id)?,
            ReplCommand::SwitchSession(id) => {
                tracing::debug!(from = %session_id, to = %id, "switching session");
                session_id = id;
                let turns = responder.history().get_or_create(&session_id).len();
                writeln!(out, "session: {} ({} messages)", session_id, turns)?;
            }
            ReplCommand::ListSessions => {
                for id in responder.history().session_ids() {
                    let marker = if id == session_id { "*" } else { " " };
                    writeln!(out, "{} {}", marker, id)?;
                }
            }
            ReplCommand::Unknown(command) => {
                writeln!(out, "unknown command: /{}", command)?;
                print_help(&mut out)?;
            }
            ReplCommand::Message(text) => {
                let mut streamed = false;
                let mut write_error: Option<io::Error> = None;
                let result = responder
                    .reply(&session_id, &text, &mut |delta: &str| {
                        streamed = true;
                        if write_error.is_none() {
                            if let Err(e) = write!(out, "{}", delta).and_then(|_| out.flush()) {
                                write_error = Some(e);
                            }
                        }
                    })
                    .await;

                // The terminal is gone; the reply, if any, is already recorded
                if let Some(e) = write_error {
                    return Err(e.into());
                }

                match result {
                    Ok(reply) if streamed => {
                        tracing::trace!(chars = reply.len(), "streamed reply");
                        writeln!(out)?;
                    }
                    Ok(reply) => writeln!(out, "{}", reply)?,
                    Err(e) => {
                        if streamed {
                            writeln!(out)?;
                        }
                        tracing::warn!(error = %e, "chat turn failed");
                        print_label(&mut out, "error: ", Color::Red)?;
                        writeln!(out, "{}", e)?;
                    }
                }
            }
        }
    }

    tracing::info!(sessions = responder.history().len(), "chat ended");
    Ok(())
}
