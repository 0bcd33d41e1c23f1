//! Everything between the conversation window and the wire.
//!
//! - [`capabilities`]: model identifier → feature flags.
//! - [`attachment`]: per-call image/audio attachments and magic-byte sniffing.
//! - [`request`]: the classic and alternate request envelopes.
//! - [`response`]: batch decoding of both envelopes.
//! - [`streaming`]: the two SSE grammars behind one [`StreamDecoder`].
//! - [`transport`]: the [`Transport`] collaborator and its `reqwest` implementation.
//! - [`retry`]: transient-failure backoff inside [`HttpTransport`].
//! - [`multipart`]: form bodies for uploads.

pub mod attachment;
pub mod capabilities;
pub mod multipart;
pub mod request;
pub mod response;
pub mod retry;
pub mod streaming;
pub mod transport;

pub use attachment::{Attachment, FileReader, StdFileReader};
pub use capabilities::{ModelCapabilities, capabilities_for};
pub use multipart::MultipartForm;
pub use request::{RequestBody, assemble};
pub use response::{Reply, decode};
pub use retry::RetryConfig;
pub use streaming::{Dialect, StreamDecoder};
pub use transport::{Headers, HttpTransport, Transport, TransportFuture};
