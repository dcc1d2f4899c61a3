mod anthropic;

pub use anthropic::AnthropicLlm;
