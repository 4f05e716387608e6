pub mod chunker;
pub mod composite;
pub mod llm_service;
pub mod prompt_builder;
pub mod score_parser;

pub use chunker::{chunk, Chunker};
pub use composite::{compute_composite, compute_composite_from_slice, score_text, ScoreReport};
pub use llm_service::{LlmClient, OpenAiLlmService};
pub use prompt_builder::PromptBuilder;
pub use score_parser::{parse_scores, ItemMatch, ScoreParser};
