// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::chain::codegen::{DEFAULT_LANGUAGE, DEFAULT_TASK};

/// chainsmith - prompt chains and history-aware chat on local models
#[derive(Parser, Debug)]
#[command(name = "chainsmith")]
#[command(version, about = "Prompt chains and history-aware chat on local models")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a function for a task, then a test for it
    Code(CodeArgs),

    /// Start an interactive chat that remembers the conversation
    Chat(ChatArgs),

    /// Answer questions from text documents
    Ask(AskArgs),
}

/// Arguments for the code subcommand
#[derive(clap::Args, Debug)]
pub struct CodeArgs {
    /// What the function should do
    #[arg(long, default_value = DEFAULT_TASK)]
    pub task: String,

    /// Language to write it in
    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    pub language: String,
}

/// Arguments for the chat subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    /// Session to start in
    #[arg(short, long)]
    pub session: Option<String>,

    /// Model to use instead of the configured chat model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Disable streaming output
    #[arg(long)]
    pub no_stream: bool,
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// Text files to answer from
    #[arg(required = true)]
    pub documents: Vec<PathBuf>,

    /// Question to answer; repeat for follow-ups. Without one, questions
    /// are read interactively
    #[arg(short, long = "question")]
    pub questions: Vec<String>,

    /// Session to record the questions in
    #[arg(short, long)]
    pub session: Option<String>,

    /// Model to use instead of the configured answer model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Number of chunks to retrieve per question
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_defaults() {
        let cli = Cli::try_parse_from(["chainsmith", "code"]).unwrap();
        match cli.command {
            Commands::Code(args) => {
                assert_eq!(args.task, "return a list of numbers");
                assert_eq!(args.language, "python");
            }
            other => panic!("Expected Code command, got {:?}", other),
        }
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_code_with_args() {
        let cli = Cli::try_parse_from([
            "chainsmith",
            "code",
            "--task",
            "reverse a string",
            "--language",
            "rust",
        ])
        .unwrap();
        match cli.command {
            Commands::Code(args) => {
                assert_eq!(args.task, "reverse a string");
                assert_eq!(args.language, "rust");
            }
            other => panic!("Expected Code command, got {:?}", other),
        }
    }

    #[test]
    fn test_chat_args() {
        let cli = Cli::try_parse_from([
            "chainsmith",
            "-vv",
            "chat",
            "--session",
            "work",
            "-m",
            "llama3",
            "--no-stream",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.session.as_deref(), Some("work"));
                assert_eq!(args.model.as_deref(), Some("llama3"));
                assert!(args.no_stream);
            }
            other => panic!("Expected Chat command, got {:?}", other),
        }
    }

    #[test]
    fn test_chat_defaults() {
        let cli = Cli::try_parse_from(["chainsmith", "chat"]).unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert!(args.session.is_none());
                assert!(args.model.is_none());
                assert!(!args.no_stream);
            }
            other => panic!("Expected Chat command, got {:?}", other),
        }
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli =
            Cli::try_parse_from(["chainsmith", "chat", "--config", "/tmp/s.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.json")));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["chainsmith"]).is_err());
        assert!(Cli::try_parse_from(["chainsmith", "deploy"]).is_err());
    }

    #[test]
    fn test_ask_args() {
        let cli = Cli::try_parse_from([
            "chainsmith",
            "ask",
            "notes.txt",
            "guide.txt",
            "-q",
            "What is the capital of UK?",
            "--question",
            "And its population?",
            "-k",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Ask(args) => {
                assert_eq!(
                    args.documents,
                    vec![PathBuf::from("notes.txt"), PathBuf::from("guide.txt")]
                );
                assert_eq!(
                    args.questions,
                    vec!["What is the capital of UK?", "And its population?"]
                );
                assert_eq!(args.top_k, Some(3));
                assert!(args.session.is_none());
                assert!(args.model.is_none());
            }
            other => panic!("Expected Ask command, got {:?}", other),
        }
    }

    #[test]
    fn test_ask_requires_a_document() {
        assert!(Cli::try_parse_from(["chainsmith", "ask"]).is_err());
        assert!(Cli::try_parse_from(["chainsmith", "ask", "-q", "why?"]).is_err());
    }
}
