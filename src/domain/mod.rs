pub mod callback;
pub mod error;
pub mod model;

pub use callback::CallbackAction;
pub use error::RelayError;
pub use model::{
    AttachmentKind, ChatId, Identity, MessageId, RenamePrompt, SourceKind, Token, TransferPhase,
    TransferRequest, UserId, VideoSelection,
};
