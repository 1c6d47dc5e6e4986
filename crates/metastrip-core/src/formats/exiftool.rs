//! Images handled by the external `exiftool` binary.
//!
//! Registered for `image/jpeg` and `image/png` in place of the structural
//! parsers when [`Capabilities::exiftool`](crate::Capabilities) is set.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use crate::Result;
use crate::StripError;
use crate::output::PendingOutput;
use crate::strip::Metadata;
use crate::strip::Strip;
use crate::strip::StripMethod;
use crate::strip::StripTarget;

const EXIFTOOL: &str = "exiftool";

/// Groups describing the file or exiftool itself rather than its content.
const IGNORED_GROUPS: &[&str] = &["ExifTool", "File", "System", "Composite", "ICC_Profile"];

/// Structural tags every image carries.
const STRUCTURAL_TAGS: &[&str] = &[
    "ImageWidth",
    "ImageHeight",
    "BitDepth",
    "ColorType",
    "Compression",
    "Filter",
    "Interlace",
    "Palette",
    "Gamma",
    "SRGBRendering",
    "PixelsPerUnitX",
    "PixelsPerUnitY",
    "PixelUnits",
    "JFIFVersion",
    "ResolutionUnit",
    "XResolution",
    "YResolution",
];

/// Image handler backed by `exiftool`.
#[derive(Debug)]
pub struct ExiftoolStripper {
    target: StripTarget,
}

impl ExiftoolStripper {
    pub(crate) const fn new(target: StripTarget) -> Self {
        Self { target }
    }

    /// The bound file and policies.
    #[must_use]
    pub const fn target(&self) -> &StripTarget {
        &self.target
    }

    fn run(&self, command: &mut Command) -> Result<Output> {
        let path = self.target.path();
        let output = command
            .output()
            .map_err(|e| StripError::malformed(path, format!("unable to run {EXIFTOOL}: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StripError::malformed(
                path,
                format!("{EXIFTOOL} exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(output)
    }

    /// Writes the cleaned copy and returns where it ended up.
    pub fn clean(&self, method: StripMethod) -> Result<PathBuf> {
        let pending = PendingOutput::new(self.target.path())?;
        // exiftool refuses to write over an existing file; the placeholder
        // is ours and its name stays reserved until commit.
        match fs::remove_file(pending.path()) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.run(&mut strip_command(method, self.target.path(), pending.path()))?;
        let output = pending.commit(self.target.options().backup)?;
        tracing::debug!(path = %self.target.path().display(), ?method, "stripped with exiftool");
        Ok(output)
    }
}

fn strip_command(method: StripMethod, input: &Path, output: &Path) -> Command {
    let mut command = Command::new(EXIFTOOL);
    command.args(["-q", "-m", "-all="]);
    if method == StripMethod::Normal {
        command.arg("--icc_profile:all");
    }
    command
        .arg("-o")
        .arg(output)
        .arg(input);
    command
}

fn list_command(input: &Path) -> Command {
    let mut command = Command::new(EXIFTOOL);
    command.args(["-s", "-G", "-m"]).arg(input);
    command
}

/// Parses `[Group] Tag : value` lines, keeping what counts as metadata.
fn parse_listing(listing: &str) -> Metadata {
    let mut meta = Metadata::new();
    for line in listing.lines() {
        let Some(rest) = line.strip_prefix('[') else {
            continue;
        };
        let Some((group, rest)) = rest.split_once(']') else {
            continue;
        };
        let Some((tag, value)) = rest.split_once(':') else {
            continue;
        };
        let (group, tag) = (group.trim(), tag.trim());
        if IGNORED_GROUPS.contains(&group) || STRUCTURAL_TAGS.contains(&tag) {
            continue;
        }
        meta.insert(format!("{group}:{tag}"), value.trim().into());
    }
    meta
}

impl Strip for ExiftoolStripper {
    fn is_clean(&self) -> Result<bool> {
        Ok(self.get_meta()?.is_empty())
    }

    fn get_meta(&self) -> Result<Metadata> {
        let output = self.run(&mut list_command(self.target.path()))?;
        Ok(parse_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    fn remove_all(&self) -> Result<()> {
        self.clean(StripMethod::Normal).map(drop)
    }

    fn remove_all_ugly(&self) -> Result<()> {
        self.clean(StripMethod::Ugly).map(drop)
    }
}
