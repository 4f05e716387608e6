pub mod hybrid;
pub mod phase_machine;
pub mod retry;

pub use hybrid::{build_prompt, validate_pasted_response, HybridPrompt, MIN_RESPONSE_CHARS};
pub use phase_machine::{MachineState, MappingHalf, PhaseMachine, PhaseTimings, Step};
pub use retry::{call_with_retry, RetryPolicy};
