// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in prompt texts

/// Asks for a bare function; variables: `language`, `task`
pub const CODE_TEMPLATE: &str = "Write a short {language} function that will {task}. \
Please provide only the code without any explanation.";

/// Asks for a test of generated code; variables: `language`, `code`
pub const TEST_TEMPLATE: &str = "Write a test for the following {language} language code:\n\
{code}. Output the code in a code block. \
Please provide only the code without any explanation or chatting.";

/// Default system prompt for the interactive chat
pub const CHAT_SYSTEM_TEMPLATE: &str =
    "If you don't know the answer, make up your best guess. You must answer in Russian language.";

/// System prompt for answering from retrieved documents; variable: `context`
pub const QA_SYSTEM_TEMPLATE: &str = "You are an expert in AI topics. \
You are provided multiple context items that are related to the prompt you have to answer. \
Use the following pieces of context to answer the question at the end.\n\n{context}";
