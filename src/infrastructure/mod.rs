pub mod clock;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use clock::{Clock, TokioClock};
#[cfg(any(test, feature = "test-support"))]
pub use mock::{RecordingClock, ScriptedLlm};
