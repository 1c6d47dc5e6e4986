//! Recursive container rewriting.
//!
//! One engine ([`ContainerStripper`]) drives every archive encoding through
//! the [`ContainerCodec`] seam:
//!
//! - **Listing**: [`ContainerCodec::visit_members`] walks entries in native
//!   order.
//! - **Per member**: regular files are extracted into a scratch workspace,
//!   re-resolved, stripped with the caller's method and re-added with
//!   neutral entry fields; unsupported ones follow the pass-through policy.
//! - **Finalizing**: the Result Container is finished with an empty
//!   container-level comment, then either promoted over the original or
//!   left beside it under the `.cleaned` suffix.
//!
//! Every exit path, including errors, destroys extracted members and any
//! partial Result Container before returning.

pub mod codec;
mod engine;
mod scratch;

pub use codec::ContainerCodec;
pub use codec::EntryFields;
pub use codec::MemberKind;
pub use codec::MemberRecord;
pub use codec::MemberSink;
pub use engine::ContainerStripper;
pub use engine::MemberOutcome;
pub use engine::RewriteReport;

use crate::formats::tar::TarCodec;
use crate::formats::zip::ZipCodec;

/// Handler for tar archives.
pub type TarStripper<'r> = ContainerStripper<'r, TarCodec>;

/// Handler for zip archives and zip-packaged office documents.
pub type ZipStripper<'r> = ContainerStripper<'r, ZipCodec>;
