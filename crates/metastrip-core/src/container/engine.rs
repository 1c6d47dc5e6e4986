//! The container state machine shared by every archive encoding.
//!
//! A rewrite lists the members, extracts each regular file into a
//! [`ScratchWorkspace`], re-resolves and strips it, re-adds it with
//! neutral entry fields, then promotes the Result Container. An audit walks
//! the same way but only asks each member whether it is clean.

use std::ops::ControlFlow;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;

use crate::Resolver;
use crate::Result;
use crate::StripError;
use crate::UnreadableReason;
use crate::container::codec::ContainerCodec;
use crate::container::codec::EntryFields;
use crate::container::codec::MemberKind;
use crate::container::codec::MemberRecord;
use crate::container::codec::MemberSink;
use crate::container::scratch::ScratchWorkspace;
use crate::output::PendingOutput;
use crate::resolver::Resolution;
use crate::strip::MetaValue;
use crate::strip::Metadata;
use crate::strip::Strip;
use crate::strip::StripMethod;
use crate::strip::StripTarget;

/// Member counts of one rewrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewriteReport {
    /// Members stripped by their own handler and re-added.
    pub stripped: usize,
    /// Unsupported members re-added unmodified.
    pub passed_through: usize,
    /// Unsupported or metadata-only members left out.
    pub dropped: usize,
    /// Entries that are neither files nor directories, or have unusable
    /// names; never extracted.
    pub skipped: usize,
}

/// Result of the recursive resolve-and-strip step for one member.
#[derive(Debug)]
pub enum MemberOutcome {
    /// The member's own handler stripped it in place.
    Stripped,
    /// No handler could strip it; the error says why.
    Unsupported(StripError),
}

/// Rewrites and audits one container through its codec.
#[derive(Debug)]
pub struct ContainerStripper<'r, C: ContainerCodec> {
    target: StripTarget,
    codec: C,
    resolver: &'r Resolver,
}

impl<'r, C: ContainerCodec> ContainerStripper<'r, C> {
    pub(crate) const fn new(target: StripTarget, codec: C, resolver: &'r Resolver) -> Self {
        Self {
            target,
            codec,
            resolver,
        }
    }

    /// The bound container and policies.
    #[must_use]
    pub const fn target(&self) -> &StripTarget {
        &self.target
    }

    /// The container encoding.
    #[must_use]
    pub const fn codec(&self) -> C {
        self.codec
    }

    fn path(&self) -> &Path {
        self.target.path()
    }

    /// Strips every member and writes the Result Container, then promotes
    /// it according to the backup policy.
    ///
    /// Returns where the result ended up and what happened to each member.
    /// On error the original is untouched and neither the partial result
    /// nor any extracted member survives.
    pub fn rewrite(&self, method: StripMethod) -> Result<(PathBuf, RewriteReport)> {
        let path = self.path();
        let options = self.target.options();
        tracing::debug!(path = %path.display(), codec = self.codec.name(), ?method, "rewriting container");

        let pending = PendingOutput::new(path)?;
        let file = pending.create().map_err(|e| StripError::ContainerWriteFailure {
            path: pending.path().to_path_buf(),
            source: e,
        })?;
        let mut sink = self.codec.create_sink(file, pending.path())?;
        let mut scratch = ScratchWorkspace::beside(path)?;
        let mut report = RewriteReport::default();

        self.codec.visit_members(path, &mut |record, content| {
            if self.codec.is_metadata_member(&record.name) {
                tracing::debug!(member = %record.name, "dropping metadata member");
                report.dropped += 1;
                return Ok(ControlFlow::Continue(()));
            }

            let member = match scratch.member_path(path, &record.name) {
                Ok(member) => member,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping member");
                    report.skipped += 1;
                    return Ok(ControlFlow::Continue(()));
                }
            };

            match record.kind {
                MemberKind::Directory => scratch.defer_dir(member),
                MemberKind::Other => {
                    tracing::warn!(member = %record.name, "skipping entry that is not a regular file");
                    report.skipped += 1;
                }
                MemberKind::File => {
                    scratch.extract(path, &member, content)?;
                    let added = match self.strip_member(&member, method)? {
                        MemberOutcome::Stripped => {
                            tracing::debug!(member = %record.name, container = %path.display(), "member stripped");
                            report.stripped += 1;
                            true
                        }
                        MemberOutcome::Unsupported(reason) => {
                            if options.pass_through || self.codec.keeps_unsupported() {
                                tracing::info!(member = %record.name, %reason, "passing member through");
                                report.passed_through += 1;
                                true
                            } else {
                                tracing::info!(member = %record.name, %reason, "dropping unsupported member");
                                report.dropped += 1;
                                false
                            }
                        }
                    };
                    if added {
                        sink.add_file(&record.name, &member, record.executable)?;
                    }
                    scratch.shred(&member)?;
                }
            }
            Ok(ControlFlow::Continue(()))
        })?;

        sink.finish()?;
        scratch.finish()?;
        let output = pending.commit(options.backup)?;

        tracing::info!(
            path = %path.display(),
            output = %output.display(),
            stripped = report.stripped,
            passed_through = report.passed_through,
            dropped = report.dropped,
            skipped = report.skipped,
            "container treated"
        );
        Ok((output, report))
    }

    /// Resolves the extracted member and strips it in place with the same
    /// method. Only fatal errors are returned as `Err`.
    fn strip_member(&self, member: &Path, method: StripMethod) -> Result<MemberOutcome> {
        let options = self.target.options().for_member();
        let stripper = match self.resolver.resolve(member, options) {
            Resolution::Handler(stripper) => stripper,
            Resolution::Unknown(reason) => return Ok(MemberOutcome::Unsupported(reason)),
        };

        match stripper.strip_with(method) {
            Ok(()) => Ok(MemberOutcome::Stripped),
            Err(err) if err.is_fatal() => {
                tracing::error!(member = %member.display(), error = %err, "fatal error while stripping member");
                Err(err)
            }
            Err(err) => Ok(MemberOutcome::Unsupported(err)),
        }
    }

    /// Whether the container and every member are free of metadata.
    ///
    /// Stops at the first dirty finding. Members without a handler count
    /// as dirty, except empty ones and those of codecs that always keep
    /// unsupported members.
    pub fn audit(&self) -> Result<bool> {
        let path = self.path();
        if !self.codec.container_meta(path)?.is_empty() {
            tracing::debug!(path = %path.display(), "container-level metadata present");
            return Ok(false);
        }

        let mut scratch = ScratchWorkspace::beside(path)?;
        let mut clean = true;

        self.codec.visit_members(path, &mut |record, content| {
            let verdict = self.audit_member(&mut scratch, record, content)?;
            if verdict {
                Ok(ControlFlow::Continue(()))
            } else {
                tracing::debug!(member = %record.name, container = %path.display(), "dirty member");
                clean = false;
                Ok(ControlFlow::Break(()))
            }
        })?;

        scratch.finish()?;
        Ok(clean)
    }

    fn audit_member(
        &self,
        scratch: &mut ScratchWorkspace,
        record: &MemberRecord<C::Fields>,
        content: &mut dyn std::io::Read,
    ) -> Result<bool> {
        let path = self.path();
        if !record.fields.is_neutral() || self.codec.is_metadata_member(&record.name) {
            return Ok(false);
        }

        let Ok(member) = scratch.member_path(path, &record.name) else {
            return Ok(false);
        };

        match record.kind {
            MemberKind::Directory => {
                scratch.defer_dir(member);
                Ok(true)
            }
            MemberKind::Other => Ok(false),
            MemberKind::File => {
                scratch.extract(path, &member, content)?;
                let verdict = self.member_is_clean(&member);
                scratch.shred(&member)?;
                verdict
            }
        }
    }

    fn member_is_clean(&self, member: &Path) -> Result<bool> {
        let options = self.target.options().for_member();
        match self.resolver.resolve(member, options) {
            Resolution::Handler(stripper) => match stripper.is_clean() {
                Ok(clean) => Ok(clean),
                Err(err) if err.is_fatal() => Err(err),
                Err(err) => {
                    tracing::info!(error = %err, "member could not be audited");
                    Ok(false)
                }
            },
            Resolution::Unknown(StripError::UnreadableInput {
                reason: UnreadableReason::Empty,
                ..
            }) => Ok(true),
            Resolution::Unknown(_) => Ok(self.codec.keeps_unsupported()),
        }
    }

    /// Metadata of every member keyed by member name: its non-neutral
    /// entry fields merged with what its own handler reports. The
    /// container's own metadata is keyed by its file name.
    pub fn collect_meta(&self) -> Result<Metadata> {
        let path = self.path();
        let mut scratch = ScratchWorkspace::beside(path)?;
        let mut meta = Metadata::new();

        self.codec.visit_members(path, &mut |record, content| {
            let mut fields = record.fields.to_meta();
            if self.codec.is_metadata_member(&record.name) {
                let value = if fields.is_empty() {
                    MetaValue::from("present")
                } else {
                    MetaValue::Nested(fields)
                };
                meta.insert(record.name.clone(), value);
                return Ok(ControlFlow::Continue(()));
            }

            if matches!(record.kind, MemberKind::File)
                && let Ok(member) = scratch.member_path(path, &record.name)
            {
                scratch.extract(path, &member, content)?;
                let inner = self.member_meta(&member);
                scratch.shred(&member)?;
                for (key, value) in inner? {
                    fields.entry(key).or_insert(value);
                }
            }

            if !fields.is_empty() {
                meta.insert(record.name.clone(), MetaValue::Nested(fields));
            }
            Ok(ControlFlow::Continue(()))
        })?;
        scratch.finish()?;

        let container = self.codec.container_meta(path)?;
        if !container.is_empty() {
            let key = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
            meta.insert(key, MetaValue::Nested(container));
        }
        Ok(meta)
    }

    fn member_meta(&self, member: &Path) -> Result<Metadata> {
        let options = self.target.options().for_member();
        match self.resolver.resolve(member, options) {
            Resolution::Handler(stripper) => match stripper.get_meta() {
                Ok(meta) => Ok(meta),
                Err(err) if err.is_fatal() => Err(err),
                Err(err) => {
                    tracing::info!(error = %err, "member metadata could not be read");
                    Ok(Metadata::new())
                }
            },
            Resolution::Unknown(_) => Ok(Metadata::new()),
        }
    }
}

impl<C: ContainerCodec> Strip for ContainerStripper<'_, C> {
    fn is_clean(&self) -> Result<bool> {
        self.audit()
    }

    fn get_meta(&self) -> Result<Metadata> {
        self.collect_meta()
    }

    fn remove_all(&self) -> Result<()> {
        self.rewrite(StripMethod::Normal).map(|_| ())
    }

    fn remove_all_ugly(&self) -> Result<()> {
        self.rewrite(StripMethod::Ugly).map(|_| ())
    }
}
