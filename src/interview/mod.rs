//! Interview
//!
//! Candidate sessions, the round state machine and the Session API that
//! drives a candidate from Foundation to a final profile.

pub mod answer;
pub mod service;
pub mod session;
pub mod state_machine;

pub use answer::Answer;
pub use service::InterviewService;
pub use session::{AnswerLog, CandidateInfo, CandidateSession, IssuedQuestions};
pub use state_machine::{check_submission, Stage};
