//! Consistency checks across the builds of a multitargeted extension.

use inedoxpack_assembly::{PlatformSet, PluginMetadata};

use crate::error::{PackError, PackResult};

/// Check that `records` describe one extension and return their platforms.
///
/// The first record is the baseline. Every other record must target a new
/// platform and agree with the baseline on name, title, description, SDK
/// version, products, icon and (unless `version_overridden`) version.
pub fn reconcile(records: &[PluginMetadata], version_overridden: bool) -> PackResult<PlatformSet> {
    let Some((first, rest)) = records.split_first() else {
        return Err(PackError::Reconciliation(
            "No extension builds to package.".to_string(),
        ));
    };

    let mut platforms = PlatformSet::empty();
    platforms.insert(first.target_platform);

    for record in rest {
        if !platforms.insert(record.target_platform) {
            return Err(PackError::Reconciliation(format!(
                "Found multiple extensions targeting {}.",
                record.target_platform
            )));
        }

        assert_same(&first.name, &record.name, "assembly name")?;
        assert_same(&first.title, &record.title, "AssemblyTitleAttribute")?;
        assert_same(
            &first.description,
            &record.description,
            "AssemblyDescriptionAttribute",
        )?;
        assert_same(
            &first.sdk_version,
            &record.sdk_version,
            "referenced Inedo SDK version",
        )?;
        assert_same(&first.products, &record.products, "AppliesToAttribute")?;
        assert_same(&first.icon_url, &record.icon_url, "ExtensionIconAttribute")?;
        if !version_overridden {
            assert_same(&first.version, &record.version, "assembly version")?;
        }
    }

    Ok(platforms)
}

fn assert_same<T: PartialEq>(expected: &T, actual: &T, property: &str) -> PackResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(PackError::Reconciliation(format!(
            "Inconsistent {property} in multitargeted extension."
        )))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use inedoxpack_assembly::{AssemblyVersion, HostProducts, TargetPlatform};
    use proptest::prelude::*;
    use proptest::sample::Index;
    use std::path::PathBuf;
    use test_case::test_case;

    fn record(platform: TargetPlatform) -> PluginMetadata {
        PluginMetadata {
            containing_path: PathBuf::from(format!("bin/{platform}")),
            name: "InedoCore".to_string(),
            version: AssemblyVersion::new(3, 1, 0, 0),
            sdk_version: AssemblyVersion::new(2, 4, 1, 0),
            target_platform: platform,
            products: HostProducts::from_bits(0x7),
            title: Some("Inedo Core".to_string()),
            description: None,
            icon_url: Some("https://example.com/icon.png".to_string()),
        }
    }

    fn message(result: PackResult<PlatformSet>) -> String {
        match result {
            Err(PackError::Reconciliation(message)) => message,
            other => panic!("expected a reconciliation error, got {other:?}"),
        }
    }

    #[test]
    fn reconcile___single_record___returns_its_platform() {
        let platforms = reconcile(&[record(TargetPlatform::Net80)], false).unwrap();

        assert_eq!(platforms.names(), vec!["net8.0"]);
    }

    #[test]
    fn reconcile___consistent_records___unions_platforms() {
        let records = [
            record(TargetPlatform::Net80),
            record(TargetPlatform::Net452),
            record(TargetPlatform::Net60),
        ];

        let platforms = reconcile(&records, false).unwrap();

        assert_eq!(platforms.names(), vec!["net452", "net6.0", "net8.0"]);
    }

    #[test]
    fn reconcile___empty___is_rejected() {
        assert!(matches!(
            reconcile(&[], false),
            Err(PackError::Reconciliation(_))
        ));
    }

    #[test]
    fn reconcile___duplicate_platform___is_rejected() {
        let records = [record(TargetPlatform::Net80), record(TargetPlatform::Net80)];

        assert_eq!(
            message(reconcile(&records, false)),
            "Found multiple extensions targeting net8.0."
        );
    }

    proptest! {
        #[test]
        fn reconcile___any_repeated_platform___is_rejected(
            platforms in Just(TargetPlatform::all().collect::<Vec<_>>()).prop_shuffle(),
            count in 2usize..=4,
            original in any::<Index>(),
            repeat in any::<Index>(),
        ) {
            let mut records: Vec<_> = platforms[..count].iter().copied().map(record).collect();
            let original = original.index(count);
            let mut repeat = repeat.index(count - 1);
            if repeat >= original {
                repeat += 1;
            }
            let duplicated = records[original].target_platform;
            records[repeat].target_platform = duplicated;

            let result = reconcile(&records, false);

            prop_assert!(
                matches!(
                    &result,
                    Err(PackError::Reconciliation(m))
                        if *m == format!("Found multiple extensions targeting {duplicated}.")
                ),
                "{result:?}"
            );
        }
    }

    #[test_case(|r| r.name = "Other".into(), "assembly name" ; "name")]
    #[test_case(|r| r.title = None, "AssemblyTitleAttribute" ; "title")]
    #[test_case(|r| r.description = Some("x".into()), "AssemblyDescriptionAttribute" ; "description")]
    #[test_case(|r| r.sdk_version = AssemblyVersion::new(2, 5, 0, 0), "referenced Inedo SDK version" ; "sdk version")]
    #[test_case(|r| r.products = HostProducts::from_bits(0x7 | 0x100), "AppliesToAttribute" ; "products")]
    #[test_case(|r| r.icon_url = None, "ExtensionIconAttribute" ; "icon")]
    #[test_case(|r| r.version = AssemblyVersion::new(3, 2, 0, 0), "assembly version" ; "version")]
    fn reconcile___field_mismatch___names_the_field(change: fn(&mut PluginMetadata), field: &str) {
        let mut second = record(TargetPlatform::Net452);
        change(&mut second);

        let message = message(reconcile(&[record(TargetPlatform::Net80), second], false));

        assert_eq!(
            message,
            format!("Inconsistent {field} in multitargeted extension.")
        );
    }

    #[test]
    fn reconcile___version_mismatch_with_override___is_tolerated() {
        let mut second = record(TargetPlatform::Net452);
        second.version = AssemblyVersion::new(3, 2, 0, 0);

        let platforms = reconcile(&[record(TargetPlatform::Net80), second], true).unwrap();

        assert_eq!(platforms.len(), 2);
    }

    #[test]
    fn reconcile___override___still_checks_other_fields() {
        let mut second = record(TargetPlatform::Net452);
        second.version = AssemblyVersion::new(3, 2, 0, 0);
        second.name = "Other".to_string();

        let result = reconcile(&[record(TargetPlatform::Net80), second], true);

        assert!(matches!(result, Err(PackError::Reconciliation(_))));
    }

    #[test]
    fn reconcile___containing_path___may_differ() {
        let mut second = record(TargetPlatform::Net452);
        second.containing_path = PathBuf::from("elsewhere");

        assert!(reconcile(&[record(TargetPlatform::Net80), second], false).is_ok());
    }
}
