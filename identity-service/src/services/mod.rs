//! Account provisioning and session services.

pub mod avatar;
pub mod bootstrap;
pub mod code_sender;
pub mod error;
pub mod human_check;
pub mod id_allocator;
pub mod metrics;
pub mod mirror;
pub mod session;
pub mod session_store;
pub mod signup;
pub mod store;
pub mod verification;

pub use avatar::{AvatarService, AvatarStorage, LocalAvatarStorage};
pub use bootstrap::Bootstrap;
pub use code_sender::{CodeChannel, CodeDelivery, CodeSender, NoopDelivery};
pub use error::{Rejection, ServiceError};
pub use human_check::{
    Captcha, CaptchaGenerator, HumanCheckProvider, HumanCheckService, SvgCaptcha,
};
pub use id_allocator::{IdAllocator, IdGenerator, IdStrategy, UuidGenerator};
pub use mirror::{HttpUserMirror, NoopMirror, UserMirror};
pub use session::{SessionAuthenticator, SessionState, APPLICATION_OWNER};
pub use session_store::{MemorySessionStore, RedisSessionStore, SessionStore, SessionToken};
pub use signup::SignupService;
pub use store::{MemoryStore, MongoStore, RecordStore, StoreError};
pub use verification::{CodeRegistry, VerificationGate, VerificationRejection};
