//! Error taxonomy for the voice engine's embedding API.

/// Mirrors `rv_voice_result_t`: fatal errors unwind creation, recoverable
/// errors are returned from the call *and* enqueued as an `Event::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum VoiceError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("allocation failure")]
    OutOfMemory,
    #[error("engine not initialized")]
    NotInitialized,
    #[error("session not connected")]
    NotConnected,
    #[error("internal engine failure")]
    Internal,
}

pub type VoiceResult<T> = Result<T, VoiceError>;
