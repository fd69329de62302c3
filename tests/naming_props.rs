//! Property tests for slug generation.

use std::fs;

use doplan_migrate::core::layout::{slugify, strip_numeric_prefix};
use doplan_migrate::core::{FolderKind, FolderMigrator, LegacyFolder};
use proptest::prelude::*;

proptest! {
    #[test]
    fn slug_charset_and_shape(text in "\\PC{0,40}")
    {
        let slug = slugify(&text);
        prop_assert!(slug.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-'));
        prop_assert!(!slug.starts_with('-'));
        prop_assert!(!slug.ends_with('-'));
        prop_assert!(!slug.contains("--"));
    }

    #[test]
    fn slug_is_idempotent(text in "\\PC{0,40}")
    {
        let once = slugify(&text);
        prop_assert_eq!(slugify(&once), once);
    }

    #[test]
    fn numeric_prefix_only_strips_digits(n in 0u32..1000, rest in "[A-Za-z][A-Za-z-]{0,10}")
    {
        let name = format!("{n:02}-{rest}");
        prop_assert_eq!(strip_numeric_prefix(&name), rest.as_str());
        prop_assert_eq!(strip_numeric_prefix(&rest), rest.as_str());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn feature_name_is_deterministic(title in "[A-Za-z][A-Za-z0-9 _!?.-]{0,30}")
    {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("01-phase/07-Feature");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("plan.md"), format!("# {title}\n\nbody\n")).unwrap();

        let folder = LegacyFolder {
            kind: FolderKind::Feature,
            old_path: dir,
            old_name: "07-Feature".to_string(),
            phase_number: "01".to_string(),
            feature_number: Some("07".to_string()),
        };
        let m = FolderMigrator::new().unwrap();

        let first = m.generate_slug_name(&folder).unwrap();
        prop_assert_eq!(&first, &m.generate_slug_name(&folder).unwrap());
        prop_assert_eq!(first, format!("07-{}", slugify(&title)));
    }
}
