//! # osb-proto
//!
//! Wire-format layer for the osb control channel and UI image stream.
//!
//! Every control-channel transfer uses one framed format: a UTF-8 JSON
//! header terminated by `"\n\n"`, optionally followed by a raw binary
//! payload whose length equals the header's `payloadSize` field. This crate
//! implements that codec plus the request/response header types, the
//! numeric-as-string field conventions (all numbers travel as decimal
//! strings, with `"inf"`/`"-inf"` sentinels where infinities are legal), and
//! the media enumerations shared between client and listener.

#![deny(unsafe_code)]

pub mod fields;
pub mod frame;
pub mod image;
pub mod media;
pub mod request;
pub mod response;

pub use frame::{decode_frame, encode_frame, Frame, FrameError};
pub use image::{UiImage, UiImageHeader};
pub use media::{AppendMode, EmeRequirement, EmeSessionType, NetworkState, ReadyState, TimeRanges};
pub use request::{ByteRange, ControlRequest};
pub use response::ResponseBuilder;

/// Content type used on both directions of the control channel.
pub const CONTENT_TYPE_JSON: &str = "text/json";

/// Service name carried by client-initiated notifications.
pub const SERVICE_EVENT_NOTIFICATION: &str = "eventNotification";
