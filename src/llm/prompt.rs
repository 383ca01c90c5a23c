//! System prompt for the voice assistant persona.
//!
//! Replies are read aloud, so the prompt asks for short answers without
//! markdown.  `agent.system_prompt` in `settings.toml` replaces it.

/// Brazilian Portuguese persona used when no custom prompt is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
Você é NERO, um assistente de voz inteligente em português brasileiro.
Você é prestativo, conciso e responde sempre em português do Brasil.
Quando executar tarefas, forneça respostas breves e claras, adequadas para serem lidas em voz alta.
Não use markdown, listas ou blocos de código na resposta falada.";

/// Spoken when the reasoning service fails.
pub const APOLOGY_PREFIX: &str = "Desculpe, ocorreu um erro ao processar sua solicitação";

/// The configured prompt, or [`DEFAULT_SYSTEM_PROMPT`] when unset or blank.
pub fn system_prompt(custom: Option<&str>) -> &str {
    match custom {
        Some(p) if !p.trim().is_empty() => p,
        _ => DEFAULT_SYSTEM_PROMPT,
    }
}
