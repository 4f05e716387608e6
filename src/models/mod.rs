pub mod chunk;
pub mod event;
pub mod loaders;
pub mod phase;
pub mod request;
pub mod results;
pub mod rubric;
pub mod score;

pub use chunk::{Chunk, ChunkPreview, ChunkPreviewReport};
pub use event::{EventStatus, PipelineEvent, ProgressEvent};
pub use loaders::{load_analysis_request, load_story_text};
pub use phase::Phase;
pub use request::{AnalysisRequest, StoryMeta};
pub use results::{AnalysisResults, Extraction, PhaseOutputs};
pub use rubric::{RubricMeta, ESC_COEFFICIENTS, ESC_TOTAL, ITEM_COUNT, ITEM_NAMES};
pub use score::{CompositeScore, RawScores, ScoreBand};
