//! Flow archive identity rewrite
//!
//! A flow archive names its flow in two members: the bundle manifest
//! (`SymbolicName` header) and the Eclipse project descriptor (`<name>`
//! element). Giving the flow a new id on the destination tenant means
//! extracting the archive, rewriting both members and zipping it up again.
//!
//! The text rewrites are pure functions over member bytes so that the
//! manifest line-folding rule can be exercised without touching the disk.

use crate::error::{CigError, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Bundle manifest member
pub const MANIFEST_MEMBER: &str = "META-INF/MANIFEST.MF";

/// Project descriptor member
pub const PROJECT_MEMBER: &str = ".project";

const SYMBOLIC_NAME: &str = "SymbolicName: ";

/// Bytes of a `SymbolicName` value that fit before the first line fold
pub const MANIFEST_FIRST_LINE_VALUE_BYTES: usize = 49;

/// Value bytes carried by each continuation line (72 minus the leading space)
const MANIFEST_CONTINUATION_BYTES: usize = 71;

// =============================================================================
// Member rewrites
// =============================================================================

/// Fold a manifest header value the way manifests are written: a hard line
/// break followed by one space after the first 49 value bytes, then every
/// 71 bytes. Folds never split a UTF-8 sequence.
pub fn fold_manifest_value(value: &str, eol: &str) -> String {
    let mut folded = String::with_capacity(value.len() + 8);
    let (first, mut rest) = split_at_boundary(value, MANIFEST_FIRST_LINE_VALUE_BYTES);
    folded.push_str(first);

    while !rest.is_empty() {
        let (chunk, tail) = split_at_boundary(rest, MANIFEST_CONTINUATION_BYTES);
        folded.push_str(eol);
        folded.push(' ');
        folded.push_str(chunk);
        rest = tail;
    }

    folded
}

fn split_at_boundary(s: &str, max: usize) -> (&str, &str) {
    let mut idx = max.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    s.split_at(idx)
}

/// Rewrite the manifest's `SymbolicName` from `old_id` to `new_id`.
///
/// Headers are compared unfolded, so an id stored across continuation lines
/// still matches. A rewritten header is folded again as a whole, attributes
/// such as `; singleton:=true` included, and stays within 72 bytes per line.
/// Other headers are copied byte for byte.
pub fn rewrite_manifest(content: &[u8], old_id: &str, new_id: &str) -> Result<Vec<u8>> {
    let text = as_text(content)?;
    let eol = if text.contains("\r\n") { "\r\n" } else { "\n" };

    let mut out = String::with_capacity(text.len() + new_id.len() + 8);
    let mut replaced = 0;

    for header in header_lines(text) {
        match rename_symbolic_name(&header.unfolded, old_id, new_id, eol) {
            Some(line) => {
                out.push_str(&line);
                out.push_str(header.eol);
                replaced += 1;
            }
            None => out.push_str(header.raw),
        }
    }

    if replaced == 0 {
        return Err(CigError::IdentityNotFound {
            member: MANIFEST_MEMBER,
            id: old_id.to_string(),
        });
    }
    Ok(out.into_bytes())
}

/// One logical manifest header: a line plus its continuation lines
struct HeaderLine<'a> {
    /// Source text including continuation lines and the final line break
    raw: &'a str,
    /// Header with continuation lines joined and no line break
    unfolded: String,
    eol: &'a str,
}

fn header_lines(text: &str) -> Vec<HeaderLine<'_>> {
    let mut headers: Vec<HeaderLine<'_>> = Vec::new();
    let mut start = 0;
    // Start offset of the header being collected
    let mut header_start = 0;

    for physical in text.split_inclusive('\n') {
        let end = start + physical.len();
        let body = match physical.strip_suffix('\n') {
            Some(line) => line.strip_suffix('\r').unwrap_or(line),
            None => physical,
        };
        let eol = &physical[body.len()..];

        let open = headers.last_mut().filter(|last| !last.unfolded.is_empty());
        match (body.strip_prefix(' '), open) {
            (Some(continuation), Some(last)) => {
                last.unfolded.push_str(continuation);
                last.raw = &text[header_start..end];
                last.eol = eol;
            }
            _ => {
                header_start = start;
                headers.push(HeaderLine {
                    raw: physical,
                    unfolded: body.to_string(),
                    eol,
                });
            }
        }
        start = end;
    }

    headers
}

/// The header folded with `new_id` in place of `old_id`, or `None` when the
/// header does not carry `old_id` as its symbolic name
fn rename_symbolic_name(header: &str, old_id: &str, new_id: &str, eol: &str) -> Option<String> {
    let at = header.find(SYMBOLIC_NAME)? + SYMBOLIC_NAME.len();
    let rest = header[at..].strip_prefix(old_id)?;
    if !matches!(rest.bytes().next(), None | Some(b';' | b',' | b' ')) {
        return None;
    }

    let value = format!("{}{}", new_id, rest);
    Some(format!("{}{}", &header[..at], fold_manifest_value(&value, eol)))
}

/// Rewrite `<name>old_id</name>` in the project descriptor
pub fn rewrite_project(content: &[u8], old_id: &str, new_id: &str) -> Result<Vec<u8>> {
    let text = as_text(content)?;
    let old = format!("<name>{}</name>", old_id);
    if !text.contains(&old) {
        return Err(CigError::IdentityNotFound {
            member: PROJECT_MEMBER,
            id: old_id.to_string(),
        });
    }

    Ok(text.replace(&old, &format!("<name>{}</name>", new_id)).into_bytes())
}

fn as_text(content: &[u8]) -> Result<&str> {
    std::str::from_utf8(content).map_err(|e| CigError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

// =============================================================================
// Archive transform
// =============================================================================

/// Produce a copy of `archive` whose identity members name `new_id`, with
/// temporary files in the system temp directory.
pub fn adjust_identity(archive: &Path, old_id: &str, new_id: &str) -> Result<NamedTempFile> {
    adjust_identity_in(&std::env::temp_dir(), archive, old_id, new_id)
}

/// Produce a copy of `archive` whose identity members name `new_id`.
///
/// The extraction directory and the result are created below `root`. The
/// result is a scoped temporary file removed when dropped; the extraction
/// directory is removed before returning, on success and on failure. The
/// input archive is left to the caller.
pub fn adjust_identity_in(root: &Path, archive: &Path, old_id: &str, new_id: &str) -> Result<NamedTempFile> {
    let workdir: TempDir = tempfile::Builder::new()
        .prefix("flow")
        .tempdir_in(root)
        .map_err(|e| CigError::Io(e).in_step("creating work directory"))?;

    extract(archive, workdir.path()).map_err(|e| e.in_step("during unzipping file"))?;
    debug!(archive = %archive.display(), dir = %workdir.path().display(), "archive extracted");

    rewrite_member(workdir.path(), MANIFEST_MEMBER, |c| rewrite_manifest(c, old_id, new_id))
        .map_err(|e| e.in_step("updating META-INF/MANIFEST.MF file"))?;
    rewrite_member(workdir.path(), PROJECT_MEMBER, |c| rewrite_project(c, old_id, new_id))
        .map_err(|e| e.in_step("updating .project file"))?;

    let mut target = tempfile::Builder::new()
        .prefix("flow")
        .suffix(".zip")
        .tempfile_in(root)
        .map_err(|e| CigError::Io(e).in_step("creating new zip file"))?;
    repackage(workdir.path(), target.as_file_mut()).map_err(|e| e.in_step("creating new zip file"))?;

    info!(from = old_id, to = new_id, path = %target.path().display(), "flow archive rewritten");
    Ok(target)
}

fn rewrite_member(root: &Path, member: &str, rewrite: impl Fn(&[u8]) -> Result<Vec<u8>>) -> Result<()> {
    let path = root.join(member);
    let content = fs::read(&path)?;
    fs::write(&path, rewrite(&content)?)?;
    debug!(member, "archive member updated");
    Ok(())
}

/// Extract every entry below `dir`, skipping names that could escape it
pub fn extract(archive: &Path, dir: &Path) -> Result<()> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let name = entry.name().to_string();

        let relative = match entry.enclosed_name() {
            Some(path) if !name.contains("..") => path,
            _ => {
                debug!(entry = %name, "skipping archive entry outside the extraction root");
                continue;
            }
        };
        let target = dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))?;
        }
    }

    Ok(())
}

/// Zip `dir` into `target` with DEFLATE, entry names relative to `dir`.
///
/// Entries are written in sorted order with a fixed timestamp so the same
/// tree always yields the same bytes.
pub fn repackage(dir: &Path, target: &mut File) -> Result<()> {
    let mut writer = ZipWriter::new(target);
    let base = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let options = with_mode(base, &entry)?;

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{}/", name), options)?;
        } else {
            writer.start_file(name, options)?;
            io::copy(&mut File::open(entry.path())?, &mut writer)?;
        }
    }

    writer.finish()?;
    Ok(())
}

#[cfg(unix)]
fn with_mode(options: SimpleFileOptions, entry: &walkdir::DirEntry) -> Result<SimpleFileOptions> {
    use std::os::unix::fs::PermissionsExt;
    let mode = entry.metadata().map_err(io::Error::from)?.permissions().mode();
    Ok(options.unix_permissions(mode & 0o7777))
}

#[cfg(not(unix))]
fn with_mode(options: SimpleFileOptions, _entry: &walkdir::DirEntry) -> Result<SimpleFileOptions> {
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    const LONG_ID: &str = "Replicate_Purchase_Orders_From_S4HANA_To_Ariba_Net"; // 50 bytes

    fn manifest(id_line: &str) -> String {
        format!(
            "Manifest-Version: 1.0\r\nBundle-ManifestVersion: 2\r\nBundle-Name: Flow\r\nBundle-{}\r\nBundle-Version: 1.0.0\r\n\r\n",
            id_line
        )
    }

    fn project(id: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<projectDescription>\n\t<name>{}</name>\n\t<comment></comment>\n</projectDescription>\n",
            id
        )
    }

    fn flow_zip(path: &Path, id: &str, manifest_line: &str) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let opts = SimpleFileOptions::default();
        writer.add_directory("META-INF/", opts).unwrap();
        writer.start_file(MANIFEST_MEMBER, opts).unwrap();
        writer.write_all(manifest(manifest_line).as_bytes()).unwrap();
        writer.start_file(PROJECT_MEMBER, opts).unwrap();
        writer.write_all(project(id).as_bytes()).unwrap();
        writer.start_file("src/main/resources/scenarioflows/integrationflow/flow.iflw", opts).unwrap();
        writer.write_all(b"<bpmn2:definitions/>").unwrap();
        writer.start_file("../escape.txt", opts).unwrap();
        writer.write_all(b"outside").unwrap();
        writer.finish().unwrap();
    }

    fn read_member(path: &Path, member: &str) -> String {
        let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut content = String::new();
        zip.by_name(member).unwrap().read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_fold_short_value_unchanged() {
        assert_eq!(fold_manifest_value("PurchaseOrder", "\r\n"), "PurchaseOrder");
        let exactly = "a".repeat(MANIFEST_FIRST_LINE_VALUE_BYTES);
        assert_eq!(fold_manifest_value(&exactly, "\r\n"), exactly);
    }

    #[test]
    fn test_fold_after_49_bytes() {
        let value = "a".repeat(50);
        let folded = fold_manifest_value(&value, "\r\n");
        assert_eq!(folded, format!("{}\r\n a", "a".repeat(49)));
    }

    #[test]
    fn test_fold_long_value_uses_continuation_lines() {
        let value = "b".repeat(49 + 71 + 5);
        let folded = fold_manifest_value(&value, "\n");
        let lines: Vec<&str> = folded.split('\n').collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 49);
        assert_eq!(lines[1].len(), 72);
        assert_eq!(lines[2], " bbbbb");
    }

    #[test]
    fn test_fold_respects_char_boundaries() {
        let value = format!("{}é", "a".repeat(48)); // 'é' spans bytes 48..50
        let folded = fold_manifest_value(&value, "\n");
        assert_eq!(folded, format!("{}\n é", "a".repeat(48)));
    }

    #[test]
    fn test_rewrite_manifest_short_id() {
        let content = manifest("SymbolicName: PurchaseOrder; singleton:=true");
        let out = rewrite_manifest(content.as_bytes(), "PurchaseOrder", "PurchaseOrderCopy1").unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("Bundle-SymbolicName: PurchaseOrderCopy1; singleton:=true\r\n"));
        assert!(!out.contains("SymbolicName: PurchaseOrder;"));
    }

    #[test]
    fn test_rewrite_manifest_does_not_touch_longer_names() {
        let content = manifest("SymbolicName: PurchaseOrderV2");
        let err = rewrite_manifest(content.as_bytes(), "PurchaseOrder", "X").unwrap_err();
        assert!(matches!(err, CigError::IdentityNotFound { member: MANIFEST_MEMBER, .. }));
    }

    #[test]
    fn test_rewrite_manifest_folded_id() {
        assert!(LONG_ID.len() > MANIFEST_FIRST_LINE_VALUE_BYTES);
        let folded_line = format!("SymbolicName: {}\r\n {}", &LONG_ID[..49], &LONG_ID[49..]);
        let content = manifest(&folded_line);

        // The unfolded form does not occur in the file
        assert!(!content.contains(&format!("SymbolicName: {}", LONG_ID)));

        let out = rewrite_manifest(content.as_bytes(), LONG_ID, "ShortId").unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Bundle-SymbolicName: ShortId\r\nBundle-Version"));
    }

    #[test]
    fn test_rewrite_manifest_folds_long_new_id() {
        let content = manifest("SymbolicName: Short; singleton:=true");
        let out = rewrite_manifest(content.as_bytes(), "Short", LONG_ID).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(
            out.contains(&format!(
                "SymbolicName: {}\r\n {}; singleton:=true\r\nBundle-Version",
                &LONG_ID[..49],
                &LONG_ID[49..]
            )),
            "{out}"
        );
        assert!(out.split("\r\n").all(|line| line.len() <= 72), "{out}");
    }

    #[test]
    fn test_rewrite_manifest_keeps_line_limit_with_attributes() {
        let content = manifest("SymbolicName: Short; singleton:=true");

        for len in [40, 49, 110] {
            let new_id = "n".repeat(len);
            let out = rewrite_manifest(content.as_bytes(), "Short", &new_id).unwrap();
            let out = String::from_utf8(out).unwrap();

            assert!(out.split("\r\n").all(|line| line.len() <= 72), "{len}: {out}");
            let unfolded = out.replace("\r\n ", "");
            assert!(unfolded.contains(&format!("Bundle-SymbolicName: {}; singleton:=true\r\n", new_id)));
        }
    }

    #[test]
    fn test_rewrite_manifest_refolds_shorter_header() {
        let value = format!("{}; singleton:=true", LONG_ID);
        let content = manifest(&format!("SymbolicName: {}", fold_manifest_value(&value, "\r\n")));

        let out = rewrite_manifest(content.as_bytes(), LONG_ID, "Short").unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            manifest("SymbolicName: Short; singleton:=true")
        );
    }

    #[test]
    fn test_rewrite_manifest_lf_line_endings() {
        let content = format!("Bundle-SymbolicName: {}\n {}\n", &LONG_ID[..49], &LONG_ID[49..]);
        let out = rewrite_manifest(content.as_bytes(), LONG_ID, "Flow").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Bundle-SymbolicName: Flow\n");
    }

    #[test]
    fn test_rewrite_project() {
        let out = rewrite_project(project("PurchaseOrder").as_bytes(), "PurchaseOrder", "Copy").unwrap();
        assert!(String::from_utf8(out).unwrap().contains("<name>Copy</name>"));

        let err = rewrite_project(project("Other").as_bytes(), "PurchaseOrder", "Copy").unwrap_err();
        assert!(matches!(err, CigError::IdentityNotFound { member: PROJECT_MEMBER, .. }));
    }

    #[test]
    fn test_adjust_identity_rewrites_members() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("flow.zip");
        flow_zip(&source, "PurchaseOrder", "SymbolicName: PurchaseOrder; singleton:=true");

        let adjusted = adjust_identity(&source, "PurchaseOrder", "PurchaseOrderCopy1").unwrap();

        assert!(read_member(adjusted.path(), MANIFEST_MEMBER).contains("SymbolicName: PurchaseOrderCopy1"));
        assert!(read_member(adjusted.path(), PROJECT_MEMBER).contains("<name>PurchaseOrderCopy1</name>"));
        assert_eq!(
            read_member(adjusted.path(), "src/main/resources/scenarioflows/integrationflow/flow.iflw"),
            "<bpmn2:definitions/>"
        );

        let zip = ZipArchive::new(File::open(adjusted.path()).unwrap()).unwrap();
        let names: Vec<&str> = zip.file_names().collect();
        assert!(names.iter().all(|n| !n.contains("..")), "{names:?}");
        assert!(names.contains(&"META-INF/"));
        assert!(names.contains(&"src/main/resources/"));
    }

    #[test]
    fn test_adjust_identity_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("flow.zip");
        flow_zip(&source, LONG_ID, &format!("SymbolicName: {}\r\n {}", &LONG_ID[..49], &LONG_ID[49..]));

        let renamed = adjust_identity(&source, LONG_ID, "Y").unwrap();
        let restored = adjust_identity(renamed.path(), "Y", LONG_ID).unwrap();

        assert_eq!(read_member(restored.path(), MANIFEST_MEMBER), read_member(&source, MANIFEST_MEMBER));
        assert_eq!(read_member(restored.path(), PROJECT_MEMBER), read_member(&source, PROJECT_MEMBER));
    }

    #[test]
    fn test_repackage_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("flow.zip");
        flow_zip(&source, "A", "SymbolicName: A");

        let first = adjust_identity(&source, "A", "B").unwrap();
        let second = adjust_identity(&source, "A", "B").unwrap();

        assert_eq!(fs::read(first.path()).unwrap(), fs::read(second.path()).unwrap());
    }

    #[test]
    fn test_adjust_identity_missing_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("flow.zip");
        let mut writer = ZipWriter::new(File::create(&source).unwrap());
        writer.start_file(PROJECT_MEMBER, SimpleFileOptions::default()).unwrap();
        writer.write_all(project("A").as_bytes()).unwrap();
        writer.finish().unwrap();

        let work = tempfile::tempdir().unwrap();
        let err = adjust_identity_in(work.path(), &source, "A", "B").unwrap_err();
        assert!(err.to_string().starts_with("error updating META-INF/MANIFEST.MF file"), "{err}");
        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_adjust_identity_leaves_only_result() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("flow.zip");
        flow_zip(&source, "A", "SymbolicName: A");

        let work = tempfile::tempdir().unwrap();
        let adjusted = adjust_identity_in(work.path(), &source, "A", "B").unwrap();
        let left: Vec<_> = fs::read_dir(work.path()).unwrap().map(|e| e.unwrap().path()).collect();
        assert_eq!(left, vec![adjusted.path().to_path_buf()]);

        drop(adjusted);
        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_adjust_identity_rejects_non_zip() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not a zip").unwrap();

        let err = adjust_identity(file.path(), "A", "B").unwrap_err();
        assert!(matches!(err, CigError::Transform { step: "during unzipping file", .. }));
    }
}
