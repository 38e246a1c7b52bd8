//! Prompt preparation for attached documents.
//!
//! The upload flow embeds extracted document text into a user turn behind
//! [`DOCUMENT_MARKER`]. Those turns get an analysis preamble before they reach
//! the provider. Count, order and roles never change.

use crate::llm::types::{ChatMessage, Role};

/// Marker the client places in front of extracted document text.
pub const DOCUMENT_MARKER: &str = "[Documento anexado:";

pub const DOCUMENT_PREAMBLE: &str = "Você é um assistente especializado em análise de documentos. \
Analise o documento fornecido e responda às perguntas do usuário com base no conteúdo do documento.";

/// Prefix every user turn that carries a document with the analysis preamble.
#[must_use]
pub fn enhance(conversation: Vec<ChatMessage>) -> Vec<ChatMessage> {
    conversation.into_iter().map(enhance_message).collect()
}

fn enhance_message(message: ChatMessage) -> ChatMessage {
    if message.role != Role::User || !message.content.contains(DOCUMENT_MARKER) {
        return message;
    }
    ChatMessage { content: format!("{DOCUMENT_PREAMBLE}\n\n{}", message.content), ..message }
}
