pub mod client;
pub mod config;
pub mod gallery;
pub mod riddle;
pub mod scroll;
pub mod session;
pub mod state;
pub mod stream;
pub mod whatif;

// Re-export main types for convenience
pub use client::{ChatEndpoint, FragmentStream, SignatureClient};
pub use config::{Config, Endpoints};
pub use gallery::{Artwork, Gallery, GalleryState};
pub use riddle::{GatePhase, NoticeKind, Riddle, RiddleGate, Verdict, VerifyRequest};
pub use scroll::AutoScroll;
pub use session::ChatSession;
pub use state::{Exchange, InFlightTurn, MessageStore, Turn, TurnId, TurnRole};
pub use stream::{StreamError, StreamUpdate, Utf8Decoder};
pub use whatif::WhatIfContext;
