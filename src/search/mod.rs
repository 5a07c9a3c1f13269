//! Search orchestration: query refinement, multi-source fan-out, merge, filtering, and ranking.

pub mod analyze;
pub mod filter;
pub mod outcome;
pub mod pipeline;
pub mod rank;
pub mod refine;
pub mod session;

pub use pipeline::Pipeline;
pub use rank::RankProgress;
pub use session::{SearchSession, SessionError};
