pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod prompt;
pub mod sse;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use prompt::PromptBuilder;
