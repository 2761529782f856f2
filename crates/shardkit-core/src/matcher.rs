use shardkit_model::{ApkTargeting, DensityBucket, DeviceSpec};

/// Decides whether a split's targeting serves a concrete device.
pub trait DeviceMatcher: Send + Sync {
    fn matches(&self, targeting: &ApkTargeting, device: &DeviceSpec) -> bool;
}

/// Matches each targeted dimension against the device independently.
///
/// A dimension matches when the device would pick the targeted value out of
/// the dimension's universe. Dimensions without targeting always match.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetingMatcher;

impl DeviceMatcher for TargetingMatcher {
    fn matches(&self, targeting: &ApkTargeting, device: &DeviceSpec) -> bool {
        matches_abi(targeting, device)
            && matches_density(targeting, device)
            && matches_language(targeting, device)
            && matches_multi_abi(targeting, device)
    }
}

fn matches_abi(targeting: &ApkTargeting, device: &DeviceSpec) -> bool {
    if !targeting.has_abi_targeting() {
        return true;
    }
    let universe = targeting.abi_universe();
    device
        .supported_abis
        .iter()
        .find(|abi| universe.contains(*abi))
        .is_some_and(|best| targeting.abi.value.contains(best))
}

fn matches_density(targeting: &ApkTargeting, device: &DeviceSpec) -> bool {
    if !targeting.has_screen_density_targeting() {
        return true;
    }
    DensityBucket::best_match(device.screen_density, targeting.density_universe())
        .is_some_and(|best| targeting.screen_density.value.contains(&best))
}

fn matches_language(targeting: &ApkTargeting, device: &DeviceSpec) -> bool {
    if !targeting.has_language_targeting() {
        return true;
    }
    device
        .languages()
        .iter()
        .any(|lang| targeting.language.value.contains(lang))
}

fn matches_multi_abi(targeting: &ApkTargeting, device: &DeviceSpec) -> bool {
    if !targeting.has_multi_abi_targeting() {
        return true;
    }
    targeting
        .multi_abi
        .value
        .iter()
        .any(|set| set.iter().all(|abi| device.supported_abis.contains(abi)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardkit_model::{Abi, AbiSet, Language};

    fn device() -> DeviceSpec {
        DeviceSpec {
            supported_abis: vec![Abi::Arm64V8a, Abi::ArmeabiV7a],
            screen_density: 480,
            supported_locales: vec!["en-US".to_owned()],
        }
    }

    #[test]
    fn master_targeting_always_matches() {
        assert!(TargetingMatcher.matches(&ApkTargeting::default(), &device()));
    }

    #[test]
    fn abi_matches_preferred_device_abi_only() {
        let m = TargetingMatcher;
        let arm64 = ApkTargeting::for_abi(Abi::Arm64V8a, [Abi::ArmeabiV7a, Abi::X86]);
        let armv7 = ApkTargeting::for_abi(Abi::ArmeabiV7a, [Abi::Arm64V8a, Abi::X86]);
        let x86 = ApkTargeting::for_abi(Abi::X86, [Abi::Arm64V8a, Abi::ArmeabiV7a]);
        assert!(m.matches(&arm64, &device()));
        assert!(!m.matches(&armv7, &device()));
        assert!(!m.matches(&x86, &device()));

        // Without a 64-bit split the 32-bit one is the best choice.
        let armv7_only = ApkTargeting::for_abi(Abi::ArmeabiV7a, [Abi::X86]);
        assert!(m.matches(&armv7_only, &device()));
    }

    #[test]
    fn density_matches_single_best_bucket() {
        let m = TargetingMatcher;
        let matching: Vec<DensityBucket> = DensityBucket::ALL
            .into_iter()
            .filter(|b| {
                let alternatives = DensityBucket::ALL.into_iter().filter(|o| o != b);
                m.matches(&ApkTargeting::for_density(*b, alternatives), &device())
            })
            .collect();
        assert_eq!(matching, vec![DensityBucket::Xxhdpi]);
    }

    #[test]
    fn language_matches_device_locales() {
        let m = TargetingMatcher;
        let en = ApkTargeting::for_language(Language::new("en").unwrap());
        let fr = ApkTargeting::for_language(Language::new("fr").unwrap());
        assert!(m.matches(&en, &device()));
        assert!(!m.matches(&fr, &device()));
    }

    #[test]
    fn multi_abi_requires_all_abis_supported() {
        let m = TargetingMatcher;
        let arm = ApkTargeting::for_multi_abi(AbiSet::from([Abi::Arm64V8a, Abi::ArmeabiV7a]), []);
        let mixed = ApkTargeting::for_multi_abi(AbiSet::from([Abi::Arm64V8a, Abi::X86]), []);
        assert!(m.matches(&arm, &device()));
        assert!(!m.matches(&mixed, &device()));
    }
}
