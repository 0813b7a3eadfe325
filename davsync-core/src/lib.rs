mod client;

pub use client::{ChunkOutcome, DavClient, DavError, DavMeta, etag_from_headers, strip_quotes};
