pub mod assistant;
pub mod audio;
pub mod orchestrator;
pub mod realtime;
pub mod session;
pub mod telephony;

// Re-export commonly used types for convenience
pub use assistant::{
    AssistantError, AssistantResult, AssistantsClient, BackendConfig, BackendTurnResult,
    ConversationBackend,
};

pub use audio::{AudioError, Transcoder};

pub use orchestrator::{CallOutcome, EndReason, OrchestratorError, TurnOrchestrator};

pub use realtime::{
    OpenAIRealtime, OpenAIRealtimeConnector, RealtimeConfig, RealtimeError, RealtimeResult,
    SpeechChannel, SpeechConnector, SpeechEvent,
};

pub use session::{CallSession, CallState, SessionError, SessionRegistry};
