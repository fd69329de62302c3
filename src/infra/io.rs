//! Filesystem primitives shared by backup and folder migration.
//!
//! Copies go through [`copy_tree_with`], which walks in name order and
//! hands each regular file to a caller-supplied copier. Directory permission
//! bits are applied after a directory is populated so read-only sources can
//! still be mirrored.

use anyhow::{Context, Result, bail};
use bstr::ByteSlice;
use std::borrow::Cow;
use std::fs::{self, DirEntry};
use std::io::Write;
use std::path::Path;

/// Directory entries sorted by file name for deterministic traversal.
pub fn sorted_entries(dir: &Path) -> Result<Vec<DirEntry>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("read dir: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("read dir entry: {}", dir.display()))?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

/// `true` when `path` exists; I/O errors other than not-found propagate.
pub fn exists(path: &Path) -> Result<bool> {
    path.try_exists()
        .with_context(|| format!("stat: {}", path.display()))
}

/// Whether `dir` holds an entry spelled exactly `name`. Unlike a stat, this
/// does not fold case on case-insensitive filesystems.
pub fn has_entry_named(dir: &Path, name: &str) -> Result<bool> {
    Ok(sorted_entries(dir)?.iter().any(|e| e.file_name() == name))
}

/// Recursively mirror `src` into `dst` with `fs::copy` (permissions kept).
pub fn copy_tree(src: &Path, dst: &Path) -> Result<u64> {
    copy_tree_with(src, dst, &mut |from, to| {
        fs::copy(from, to)
            .map(|_| ())
            .with_context(|| format!("copy {} → {}", from.display(), to.display()))
    })
}

/// Recursively mirror `src` into `dst`, delegating each regular file to
/// `copy_file(source, destination)`. Returns the number of files copied.
///
/// Symlinks to files are followed for content; symlinked directories and
/// broken links are rejected.
pub fn copy_tree_with<F>(src: &Path, dst: &Path, copy_file: &mut F) -> Result<u64>
where
    F: FnMut(&Path, &Path) -> Result<()>,
{
    let src_meta =
        fs::metadata(src).with_context(|| format!("stat source dir: {}", src.display()))?;
    if !src_meta.is_dir() {
        bail!("not a directory: {}", src.display());
    }

    fs::create_dir_all(dst).with_context(|| format!("create dir: {}", dst.display()))?;

    let mut copied = 0u64;
    for entry in sorted_entries(src)? {
        let from = entry.path();
        let to = dst.join(entry.file_name());
        copied += copy_entry(&from, &to, copy_file)?;
    }

    fs::set_permissions(dst, src_meta.permissions())
        .with_context(|| format!("set permissions: {}", dst.display()))?;

    Ok(copied)
}

/// Copy one directory entry (file or subtree) from `from` to `to`.
pub fn copy_entry<F>(from: &Path, to: &Path, copy_file: &mut F) -> Result<u64>
where
    F: FnMut(&Path, &Path) -> Result<()>,
{
    let link_meta =
        fs::symlink_metadata(from).with_context(|| format!("stat: {}", from.display()))?;

    if link_meta.file_type().is_symlink() {
        let target = fs::metadata(from).with_context(|| {
            format!("resolve symlink target (broken?): {}", from.display())
        })?;
        if target.is_dir() {
            bail!("symlinked directories are not supported: {}", from.display());
        }
    }

    if from.is_dir() {
        copy_tree_with(from, to, copy_file)
    } else if from.is_file() {
        copy_file(from, to)?;
        Ok(1)
    } else {
        bail!("unsupported file type: {}", from.display());
    }
}

/// Replace every occurrence of `needle` with `replacement`; borrowed when absent.
pub fn replace_literal<'a>(data: &'a [u8], needle: &[u8], replacement: &[u8]) -> Cow<'a, [u8]> {
    if needle.is_empty() || data.find(needle).is_none() {
        return Cow::Borrowed(data);
    }
    Cow::Owned(data.replace(needle, replacement))
}

/// Copy one file, substituting `needle` with `replacement` in its bytes.
/// Permission bits of the source are carried over. Returns whether the
/// content changed.
pub fn copy_file_rewriting(
    from: &Path,
    to: &Path,
    needle: &[u8],
    replacement: &[u8],
) -> Result<bool> {
    let data = fs::read(from).with_context(|| format!("read: {}", from.display()))?;
    let rewritten = replace_literal(&data, needle, replacement);
    let changed = matches!(rewritten, Cow::Owned(_));

    fs::write(to, &rewritten).with_context(|| format!("write: {}", to.display()))?;

    let perms = fs::metadata(from)
        .with_context(|| format!("stat: {}", from.display()))?
        .permissions();
    fs::set_permissions(to, perms).with_context(|| format!("set permissions: {}", to.display()))?;

    Ok(changed)
}

/// Write `bytes` to `path` via a sibling temp file and rename; the target is
/// either untouched or fully replaced.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("no parent directory: {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create dir: {}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("write temp for {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync temp for {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .with_context(|| format!("set permissions for {}", path.display()))?;
    }

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("persist {}", path.display()))?;
    Ok(())
}

/// Remove a directory tree; missing paths are fine.
pub fn remove_tree(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow::Error::new(e).context(format!("remove {}", path.display()))),
    }
}
