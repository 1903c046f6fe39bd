#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Typed access to the hosted backend the administrative actions run against.
//!
//! The service exposes three independent collaborators, each modelled as a
//! trait so the action runner can be exercised without a network:
//! - [`RecordStore`]: filtered read/insert/update/delete over REST tables.
//! - [`IdentityAdmin`]: account management on the auth service.
//! - [`BlobStore`]: bucket listing, object upload and removal.
//!
//! [`BackendClient`] implements all three over one `reqwest` client.

pub mod client;
pub mod error;
pub mod filter;
pub mod identity;
pub mod records;
pub mod remedy;
pub mod storage;

pub use client::BackendClient;
pub use error::{BackendError, BackendResult, ErrorClass, RemoteError};
pub use filter::{Filter, FilterOp, validate_identifier};
pub use identity::{Account, AccountPage, AccountPatch, IdentityAdmin, NewAccount};
pub use records::{RecordQuery, RecordStore, Row};
pub use remedy::suggest_remedy;
pub use storage::{BlobStore, Bucket, StoredObject, UploadReceipt, UploadRequest};
