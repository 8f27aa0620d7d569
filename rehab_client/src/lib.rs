pub mod capture;
pub mod config;
pub mod error;
pub mod frame;
pub mod notice;
pub mod overlay;
pub mod rest;
pub mod session;
pub mod state;
pub mod stream;

pub use capture::{Camera, Permission};
pub use config::Endpoints;
pub use error::ClientError;
pub use frame::FrameSource;
pub use notice::{Notice, NoticeKind};
pub use rest::RestClient;
pub use session::SessionCommand;
pub use state::{MediaRef, TrackerState};
pub use stream::StreamCommand;
