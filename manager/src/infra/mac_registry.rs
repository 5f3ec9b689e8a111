//! MAC Registry (spec §4.E).
//!
//! The webhook handler only knows a calling container's MAC address. This
//! scans the workspace tree's `*.mac` sidecars to resolve it back to a
//! golden image or instance id, the way the original `webhook.py`'s
//! `find_container_by_mac` walked the on-disk layout rather than keeping a
//! separate index.

use super::workspace;
use std::path::Path;
use vapiorc_types::EntityKind;

/// Resolve `mac` against everything under `golden_images/` (skipping
/// `*_template` directories, which are never live targets for a webhook
/// call) and then `instances/`. Golden images are checked first per spec
/// §4.E's scan order.
pub fn resolve(
    golden_images_dir: &Path,
    instances_dir: &Path,
    mac: &str,
) -> Option<(EntityKind, String)> {
    let needle = workspace::normalize_mac(mac);

    if let Some(id) = scan(golden_images_dir, &needle, true) {
        return Some((EntityKind::GoldenImage, id));
    }
    if let Some(id) = scan(instances_dir, &needle, false) {
        return Some((EntityKind::VmInstance, id));
    }
    None
}

fn scan(root: &Path, needle: &str, skip_templates: bool) -> Option<String> {
    let entries = std::fs::read_dir(root).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if skip_templates && name.ends_with("_template") {
            continue;
        }
        if workspace::read_macs(&path).iter().any(|m| m == needle) {
            return Some(name);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs(base: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let golden = base.join("golden_images");
        let instances = base.join("instances");
        std::fs::create_dir_all(&golden).unwrap();
        std::fs::create_dir_all(&instances).unwrap();
        (golden, instances)
    }

    #[test]
    fn resolves_golden_image_by_mac() {
        let base = tempfile::tempdir().unwrap();
        let (golden, instances) = dirs(base.path());

        let gid_dir = golden.join("gid-1");
        std::fs::create_dir(&gid_dir).unwrap();
        workspace::write_mac(&gid_dir, "container-1", "AA:BB:CC:DD:EE:FF").unwrap();

        let found = resolve(&golden, &instances, "aa-bb-cc-dd-ee-ff");
        assert_eq!(found, Some((EntityKind::GoldenImage, "gid-1".to_string())));
    }

    #[test]
    fn template_directories_are_never_matched() {
        let base = tempfile::tempdir().unwrap();
        let (golden, instances) = dirs(base.path());

        let template_dir = golden.join("11_template");
        std::fs::create_dir(&template_dir).unwrap();
        workspace::write_mac(&template_dir, "container-1", "AA:BB:CC:DD:EE:FF").unwrap();

        assert_eq!(resolve(&golden, &instances, "AA:BB:CC:DD:EE:FF"), None);
    }

    #[test]
    fn falls_through_to_instances_when_no_golden_image_matches() {
        let base = tempfile::tempdir().unwrap();
        let (golden, instances) = dirs(base.path());

        let iid_dir = instances.join("iid-9");
        std::fs::create_dir(&iid_dir).unwrap();
        workspace::write_mac(&iid_dir, "container-9", "11:22:33:44:55:66").unwrap();

        let found = resolve(&golden, &instances, "11:22:33:44:55:66");
        assert_eq!(found, Some((EntityKind::VmInstance, "iid-9".to_string())));
    }

    #[test]
    fn unknown_mac_resolves_to_none() {
        let base = tempfile::tempdir().unwrap();
        let (golden, instances) = dirs(base.path());

        assert_eq!(resolve(&golden, &instances, "00:00:00:00:00:00"), None);
    }
}
