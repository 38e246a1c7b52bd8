//! Deterministic local stand-in for the completion provider.
//!
//! Picks a canned reply from the last user turn and streams it word by word.
//! Used for development without a credential and as the backing provider of
//! the `/api/chat/mock` route.

use std::time::Duration;

use futures::StreamExt;

use super::config::MockTiming;
use super::types::{ChatMessage, DeltaStream, LlmError, Role, TextDelta};
use crate::transform::DOCUMENT_MARKER;

const REPLY_DOCUMENT: &str = "Baseado no documento que você anexou, posso ver que contém informações relevantes. \
Analisando o conteúdo fornecido, posso ajudá-lo com suas perguntas sobre o documento. \
O que gostaria de saber especificamente?";
pub const REPLY_GREETING: &str = "Olá! Sou o IntelliFlow, seu assistente inteligente. Como posso ajudá-lo hoje?";
const REPLY_HELP: &str = "Posso ajudá-lo com diversas tarefas:\n\n- Responder perguntas\n- Analisar documentos\n\
- Explicar conceitos\n- Gerar conteúdo\n- E muito mais!\n\nO que você gostaria de fazer?";
const REPLY_AI: &str = "Inteligência Artificial (IA) é a capacidade de máquinas de realizar tarefas que normalmente \
requerem inteligência humana, como aprendizado, raciocínio e reconhecimento de padrões.";
const REPLY_THANKS: &str = "De nada! Fico feliz em ajudar. Se tiver mais alguma dúvida, estou à disposição!";

const ECHO_PREFIX_CHARS: usize = 50;

pub struct SimulatedClient {
    timing: MockTiming,
}

impl SimulatedClient {
    #[must_use]
    pub fn new(timing: MockTiming) -> Self {
        Self { timing }
    }

    /// Stream a canned reply for `messages`. Never fails.
    ///
    /// # Errors
    ///
    /// Infallible; the `Result` matches the live client's signature.
    pub async fn stream(&self, messages: &[ChatMessage]) -> Result<DeltaStream, LlmError> {
        if self.timing.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.timing.delay_ms)).await;
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map_or("", |m| m.content.as_str());
        let reply = canned_reply(last_user);
        let word_delay = Duration::from_millis(self.timing.word_delay_ms);

        let words = word_chunks(&reply).into_iter().enumerate();
        let stream = futures::stream::iter(words)
            .then(move |(i, word)| async move {
                if i > 0 && !word_delay.is_zero() {
                    tokio::time::sleep(word_delay).await;
                }
                Ok::<_, LlmError>(TextDelta::text(word))
            })
            .chain(futures::stream::once(async { Ok::<_, LlmError>(TextDelta::end()) }));
        Ok(Box::pin(stream))
    }
}

/// Choose the reply for the last user message. Earlier rules win.
pub(crate) fn canned_reply(user_message: &str) -> String {
    let lower = user_message.to_lowercase();
    let mentions = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if user_message.contains(DOCUMENT_MARKER) {
        return REPLY_DOCUMENT.to_string();
    }
    if mentions(&["olá", "oi", "hello"]) {
        return REPLY_GREETING.to_string();
    }
    if mentions(&["ajuda", "help"]) {
        return REPLY_HELP.to_string();
    }
    if mentions(&["inteligência artificial", "ia", "ai"]) {
        return REPLY_AI.to_string();
    }
    if mentions(&["obrigado", "thanks", "valeu"]) {
        return REPLY_THANKS.to_string();
    }

    let prefix: String = user_message.chars().take(ECHO_PREFIX_CHARS).collect();
    format!(
        "Entendi sua pergunta sobre \"{prefix}...\". Esta é uma resposta simulada do mock. \
Em produção, esta resposta viria da API da OpenAI. Você pode me fazer perguntas sobre diversos \
tópicos e eu tentarei ajudá-lo da melhor forma possível."
    )
}

/// Split on single spaces; every word but the last keeps a trailing space.
pub(crate) fn word_chunks(text: &str) -> Vec<String> {
    let words: Vec<&str> = text.split(' ').collect();
    let last = words.len().saturating_sub(1);
    words
        .into_iter()
        .enumerate()
        .map(|(i, w)| if i < last { format!("{w} ") } else { w.to_string() })
        .collect()
}

#[cfg(test)]
#[path = "simulated_test.rs"]
mod tests;
