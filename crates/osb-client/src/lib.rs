//! # osb-client
//!
//! Client-side session and control-channel runtime for the osb cloud
//! browser: a remote browser renders HTML5 content server-side, streams its
//! UI back as video or image frames, and reverse-dispatches media and
//! browser RPCs over an HTTP long-polling control channel.
//!
//! An embedding application implements [`SessionListener`] (its local media
//! player, MSE/EME plumbing, resource loader and renderer), starts a session
//! through a [`SessionRegistry`], and receives rendered frames plus
//! delegated media operations in return.
//!
//! ```no_run
//! use std::sync::Arc;
//! use osb_client::{ClientConfig, SessionRegistry, SessionStartOptions};
//!
//! # async fn run(listener: Arc<dyn osb_client::SessionListener>) -> Result<(), osb_client::ClientError> {
//! let registry = SessionRegistry::new(ClientConfig::default());
//! let session = registry
//!     .start(SessionStartOptions::new("https://osb.example.com", "https://app.example.com")
//!         .pull_mode(true)
//!         .listener(listener))
//!     .await?;
//! session.ui_stream_start(osb_client::ui::UI_FMT_JPEG_ALPHA_PNG, false, Some(1000)).await?;
//! // ... run until done ...
//! registry.stop(&session).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod control;
pub mod dispatch;
pub mod errors;
pub mod http;
pub mod listener;
pub mod notify;
pub mod session;
pub mod ui;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ClientConfig;
pub use errors::ClientError;
pub use listener::{
    CdmSessionCreated, CdmSessionLoaded, KeySystemConfiguration, KeySystemSupport, ListenerError,
    LoadResourceResult, SessionListener, VideoFrame,
};
pub use notify::VideoState;
pub use session::{InputEvent, SessionContext, SessionRegistry, SessionStartOptions};

/// Keyboard codes understood by `/osb/session/event` key injection.
pub mod keys {
    pub const KEY_UP: u32 = 0x26;
    pub const KEY_DOWN: u32 = 0x28;
    pub const KEY_LEFT: u32 = 0x25;
    pub const KEY_RIGHT: u32 = 0x27;
    pub const KEY_ENTER: u32 = 0xd;
    pub const KEY_BACKSPACE: u32 = 0x8;
    pub const KEY_ESCAPE: u32 = 0x1b;
}
