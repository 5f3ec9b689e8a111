//! Workspace Store (spec §4.C).
//!
//! All on-disk state lives under `storage_path`: one directory per golden
//! image (`golden_images/<gid>/`), one per vm_type template
//! (`golden_images/<vm_type>_template/`), and one per instance
//! (`instances/<iid>/`). A `<container_id>.mac` sidecar file records the
//! container's guest MAC so the MAC Registry (`infra/mac_registry.rs`) can
//! resolve webhook callbacks without querying the container engine.

use anyhow::{Context, Result};
use filetime::FileTime;
use std::path::{Path, PathBuf};

pub const MAC_EXT: &str = "mac";

pub fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))
}

pub fn destroy_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).with_context(|| format!("removing {}", dir.display()))?;
    }
    Ok(())
}

/// Recursively copy `src` into `dst`, mirroring relative paths and
/// preserving each file's mtime (spec §4.C). Used for template promotion:
/// the golden image's working directory is deep-copied into
/// `<vm_type>_template/` before the source is deleted, so a crash
/// mid-promotion never leaves the template half-written.
pub fn deep_copy(src: &Path, dst: &Path) -> Result<()> {
    create_dir(dst)?;
    for entry in std::fs::read_dir(src).with_context(|| format!("reading {}", src.display()))? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            deep_copy(&entry.path(), &dst_path)?;
        } else {
            let src_path = entry.path();
            std::fs::copy(&src_path, &dst_path)
                .with_context(|| format!("copying {}", src_path.display()))?;
            let metadata = entry
                .metadata()
                .with_context(|| format!("reading metadata for {}", src_path.display()))?;
            let mtime = FileTime::from_last_modification_time(&metadata);
            filetime::set_file_mtime(&dst_path, mtime)
                .with_context(|| format!("preserving mtime on {}", dst_path.display()))?;
        }
    }
    Ok(())
}

/// Replace `template_dir` with a fresh copy of `golden_dir`'s contents.
/// Copy-then-remove-old-then-remove-source, per spec §9's resolved open
/// question: an installer disk must be fully captured before anything is
/// torn down, so the old template is only removed once the new copy has
/// landed and the source is left alone until promotion succeeds.
pub fn promote_to_template(golden_dir: &Path, template_dir: &Path) -> Result<()> {
    let staging = template_dir.with_extension("promoting");
    destroy_dir(&staging)?;
    deep_copy(golden_dir, &staging)?;
    destroy_dir(template_dir)?;
    std::fs::rename(&staging, template_dir)
        .with_context(|| format!("promoting {} to {}", staging.display(), template_dir.display()))?;
    Ok(())
}

pub fn write_mac(dir: &Path, container_id: &str, mac: &str) -> Result<()> {
    let path = dir.join(format!("{container_id}.{MAC_EXT}"));
    std::fs::write(&path, normalize_mac(mac))
        .with_context(|| format!("writing mac sidecar {}", path.display()))
}

/// Read every `*.mac` sidecar in `dir`, normalised. A workspace directory
/// holds at most one in steady state, but scanning all of them keeps this
/// tolerant of a container restart that left a stale sidecar behind.
pub fn read_macs(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|e| e.path().extension().and_then(|e| e.to_str()) == Some(MAC_EXT))
        .filter_map(|e| std::fs::read_to_string(e.path()).ok())
        .map(|s| s.trim().to_string())
        .collect()
}

/// Remove every `*.mac` sidecar in `dir` (template finalisation, spec
/// invariant: no template contains a MAC sidecar).
pub fn strip_macs(dir: &Path) -> Result<()> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Ok(());
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(MAC_EXT) {
            std::fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
        }
    }
    Ok(())
}

/// Canonicalize a MAC address to uppercase, colon-separated hex, accepting
/// hyphen-separated input too (spec §4.E / testable property P8).
pub fn normalize_mac(mac: &str) -> String {
    mac.trim().replace('-', ":").to_uppercase()
}

pub fn golden_dir(base: &Path, golden_id: &str) -> PathBuf {
    base.join(golden_id)
}

pub fn instance_dir(base: &Path, instance_id: &str) -> PathBuf {
    base.join(instance_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn normalize_mac_upcases_and_translates_hyphens() {
        assert_eq!(normalize_mac("aa-bb-cc-dd-ee-ff"), "AA:BB:CC:DD:EE:FF");
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee:ff"), "AA:BB:CC:DD:EE:FF");
        assert_eq!(normalize_mac("  AA:BB:CC:DD:EE:FF  "), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn write_and_read_mac_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        write_mac(tmp.path(), "deadbeef01", "aa-bb-cc-dd-ee-ff").unwrap();
        assert_eq!(read_macs(tmp.path()), vec!["AA:BB:CC:DD:EE:FF".to_string()]);
    }

    #[test]
    fn strip_macs_removes_all_sidecars_idempotently() {
        let tmp = tempfile::tempdir().unwrap();
        write_mac(tmp.path(), "c1", "AA:BB:CC:DD:EE:FF").unwrap();
        write_mac(tmp.path(), "c2", "11:22:33:44:55:66").unwrap();
        fs::write(tmp.path().join("disk.img"), b"keep-me").unwrap();

        strip_macs(tmp.path()).unwrap();
        assert!(read_macs(tmp.path()).is_empty());
        assert!(tmp.path().join("disk.img").exists());

        // calling again on an already-clean dir must not error
        strip_macs(tmp.path()).unwrap();
    }

    #[test]
    fn deep_copy_preserves_file_contents() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("disk.img"), b"fake-disk-bytes").unwrap();
        fs::create_dir(src.path().join("nested")).unwrap();
        fs::write(src.path().join("nested").join("note.txt"), b"hi").unwrap();

        let dst = tempfile::tempdir().unwrap();
        let dst_dir = dst.path().join("copied");
        deep_copy(src.path(), &dst_dir).unwrap();

        assert_eq!(
            fs::read(dst_dir.join("disk.img")).unwrap(),
            b"fake-disk-bytes"
        );
        assert_eq!(
            fs::read(dst_dir.join("nested").join("note.txt")).unwrap(),
            b"hi"
        );

        let src_mtime = FileTime::from_last_modification_time(
            &fs::metadata(src.path().join("disk.img")).unwrap(),
        );
        let dst_mtime = FileTime::from_last_modification_time(
            &fs::metadata(dst_dir.join("disk.img")).unwrap(),
        );
        assert_eq!(src_mtime, dst_mtime);
    }

    #[test]
    fn promote_to_template_leaves_only_the_new_copy() {
        let base = tempfile::tempdir().unwrap();
        let golden = base.path().join("golden-1");
        fs::create_dir(&golden).unwrap();
        fs::write(golden.join("disk.img"), b"data").unwrap();

        let template = base.path().join("11_template");
        fs::create_dir(&template).unwrap();
        fs::write(template.join("stale.img"), b"old").unwrap();

        promote_to_template(&golden, &template).unwrap();

        assert_eq!(fs::read(template.join("disk.img")).unwrap(), b"data");
        assert!(!template.join("stale.img").exists());
    }
}
