use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{DeviceId, SoftwareId};

static NO_SOFTWARE: BTreeSet<SoftwareId> = BTreeSet::new();
static NO_DEVICES: BTreeSet<DeviceId> = BTreeSet::new();

/// Bidirectional incidence between devices and the software they require.
///
/// Identifiers are assigned in lexicographic order of the external names, so
/// comparing ids compares names. The index is immutable once built; device
/// `d` requires software `s` exactly when `s`'s dependents contain `d`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoverageIndex {
    device_names: Vec<String>,
    software_names: Vec<String>,
    requirements: Vec<BTreeSet<SoftwareId>>,
    dependents: Vec<BTreeSet<DeviceId>>,
}

impl CoverageIndex {
    /// Builds the index from each device's required software names.
    ///
    /// Duplicate names collapse and devices without any requirement are
    /// dropped.
    #[must_use]
    pub fn from_requirements<I, D, J, S>(requirements: I) -> Self
    where
        I: IntoIterator<Item = (D, J)>,
        D: Into<String>,
        J: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut by_device: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (device, software) in requirements {
            by_device
                .entry(device.into())
                .or_default()
                .extend(software.into_iter().map(Into::into));
        }
        Self::from_name_map(by_device)
    }

    /// Builds the index from flat `(device, software)` pairs.
    #[must_use]
    pub fn from_pairs<I, D, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (D, S)>,
        D: Into<String>,
        S: Into<String>,
    {
        Self::from_requirements(
            pairs
                .into_iter()
                .map(|(device, software)| (device, std::iter::once(software))),
        )
    }

    fn from_name_map(mut by_device: BTreeMap<String, BTreeSet<String>>) -> Self {
        by_device.retain(|_, software| !software.is_empty());

        let software_names: Vec<String> = by_device
            .values()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut dependents = vec![BTreeSet::new(); software_names.len()];
        let mut device_names = Vec::with_capacity(by_device.len());
        let mut requirements = Vec::with_capacity(by_device.len());

        for (position, (device, software)) in by_device.into_iter().enumerate() {
            let device_id = DeviceId::new(position as u32);
            let mut required = BTreeSet::new();
            for name in &software {
                let Ok(slot) = software_names.binary_search(name) else {
                    continue;
                };
                let _ = required.insert(SoftwareId::new(slot as u32));
                let _ = dependents[slot].insert(device_id);
            }
            device_names.push(device);
            requirements.push(required);
        }

        Self {
            device_names,
            software_names,
            requirements,
            dependents,
        }
    }

    /// Number of devices in the index.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.device_names.len()
    }

    /// Number of distinct software items in the index.
    #[must_use]
    pub fn software_count(&self) -> usize {
        self.software_names.len()
    }

    /// Iterates every device in ascending id order.
    pub fn devices(&self) -> impl Iterator<Item = DeviceId> + '_ {
        (0..self.device_names.len()).map(|slot| DeviceId::new(slot as u32))
    }

    /// Iterates every software item in ascending id order.
    pub fn software(&self) -> impl Iterator<Item = SoftwareId> + '_ {
        (0..self.software_names.len()).map(|slot| SoftwareId::new(slot as u32))
    }

    /// Software not contained in `tested`.
    #[must_use]
    pub fn available_software(&self, tested: &BTreeSet<SoftwareId>) -> BTreeSet<SoftwareId> {
        self.software()
            .filter(|software| !tested.contains(software))
            .collect()
    }

    /// Software required by `device`.
    #[must_use]
    pub fn required(&self, device: DeviceId) -> &BTreeSet<SoftwareId> {
        self.requirements
            .get(device.get() as usize)
            .unwrap_or(&NO_SOFTWARE)
    }

    /// Devices that require `software`.
    #[must_use]
    pub fn requiring(&self, software: SoftwareId) -> &BTreeSet<DeviceId> {
        self.dependents
            .get(software.get() as usize)
            .unwrap_or(&NO_DEVICES)
    }

    /// Software `device` still needs once `tested` is accounted for.
    #[must_use]
    pub fn residual(&self, device: DeviceId, tested: &BTreeSet<SoftwareId>) -> BTreeSet<SoftwareId> {
        self.required(device).difference(tested).copied().collect()
    }

    /// Number of items in [`CoverageIndex::residual`] without allocating it.
    #[must_use]
    pub fn residual_count(&self, device: DeviceId, tested: &BTreeSet<SoftwareId>) -> usize {
        self.required(device)
            .iter()
            .filter(|software| !tested.contains(*software))
            .count()
    }

    /// Reports whether every software `device` requires is in `tested`.
    #[must_use]
    pub fn is_covered(&self, device: DeviceId, tested: &BTreeSet<SoftwareId>) -> bool {
        self.required(device).is_subset(tested)
    }

    /// All devices whose full requirement is contained in `tested`.
    #[must_use]
    pub fn covered_devices(&self, tested: &BTreeSet<SoftwareId>) -> BTreeSet<DeviceId> {
        self.devices()
            .filter(|device| self.is_covered(*device, tested))
            .collect()
    }

    /// External name of `device`.
    #[must_use]
    pub fn device_name(&self, device: DeviceId) -> Option<&str> {
        self.device_names
            .get(device.get() as usize)
            .map(String::as_str)
    }

    /// External name of `software`.
    #[must_use]
    pub fn software_name(&self, software: SoftwareId) -> Option<&str> {
        self.software_names
            .get(software.get() as usize)
            .map(String::as_str)
    }

    /// Resolves a device name to its identifier.
    #[must_use]
    pub fn device_id(&self, name: &str) -> Option<DeviceId> {
        self.device_names
            .binary_search_by(|candidate| candidate.as_str().cmp(name))
            .ok()
            .map(|slot| DeviceId::new(slot as u32))
    }

    /// Resolves a software name to its identifier.
    #[must_use]
    pub fn software_id(&self, name: &str) -> Option<SoftwareId> {
        self.software_names
            .binary_search_by(|candidate| candidate.as_str().cmp(name))
            .ok()
            .map(|slot| SoftwareId::new(slot as u32))
    }

    /// Number of devices requiring each software item, in id order.
    #[must_use]
    pub fn software_popularity(&self) -> Vec<(SoftwareId, usize)> {
        self.software()
            .map(|software| (software, self.requiring(software).len()))
            .collect()
    }

    /// Number of software items each device requires, in id order.
    #[must_use]
    pub fn requirement_counts(&self) -> Vec<(DeviceId, usize)> {
        self.devices()
            .map(|device| (device, self.required(device).len()))
            .collect()
    }

    /// Groups devices that require exactly the same software.
    ///
    /// Profiles are ordered by their software set.
    #[must_use]
    pub fn requirement_profiles(&self) -> Vec<RequirementProfile> {
        let mut grouped: BTreeMap<&BTreeSet<SoftwareId>, BTreeSet<DeviceId>> = BTreeMap::new();
        for device in self.devices() {
            let _ = grouped
                .entry(self.required(device))
                .or_default()
                .insert(device);
        }
        grouped
            .into_iter()
            .map(|(software, devices)| RequirementProfile {
                software: software.clone(),
                devices,
            })
            .collect()
    }

    /// Devices whose requirement equals `software` exactly.
    #[must_use]
    pub fn devices_with_profile(&self, software: &BTreeSet<SoftwareId>) -> BTreeSet<DeviceId> {
        self.devices()
            .filter(|device| self.required(*device) == software)
            .collect()
    }

    /// Summarises the sizes of the unique requirement profiles.
    #[must_use]
    pub fn profile_statistics(&self) -> ProfileStatistics {
        let profiles = self.requirement_profiles();
        if profiles.is_empty() {
            return ProfileStatistics::default();
        }

        let sizes = profiles.iter().map(|profile| profile.software.len());
        let populations = profiles.iter().map(|profile| profile.devices.len());
        let total_size: usize = sizes.clone().sum();

        ProfileStatistics {
            unique_profiles: profiles.len(),
            min_profile_size: sizes.clone().min().unwrap_or(0),
            max_profile_size: sizes.max().unwrap_or(0),
            mean_profile_size: total_size as f64 / profiles.len() as f64,
            min_devices_per_profile: populations.clone().min().unwrap_or(0),
            max_devices_per_profile: populations.max().unwrap_or(0),
        }
    }
}

/// Devices sharing one exact software requirement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequirementProfile {
    /// Software every device of the profile requires.
    pub software: BTreeSet<SoftwareId>,
    /// Devices with this exact requirement.
    pub devices: BTreeSet<DeviceId>,
}

/// Size statistics over the unique requirement profiles of an index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ProfileStatistics {
    /// Number of distinct requirement sets.
    pub unique_profiles: usize,
    /// Smallest requirement set size.
    pub min_profile_size: usize,
    /// Largest requirement set size.
    pub max_profile_size: usize,
    /// Mean requirement set size across profiles.
    pub mean_profile_size: f64,
    /// Fewest devices sharing one profile.
    pub min_devices_per_profile: usize,
    /// Most devices sharing one profile.
    pub max_devices_per_profile: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CoverageIndex {
        CoverageIndex::from_requirements([
            ("pc-2", vec!["office", "vpn"]),
            ("pc-1", vec!["vpn", "office", "vpn"]),
            ("pc-3", vec!["browser"]),
            ("pc-4", vec![]),
        ])
    }

    #[test]
    fn assigns_ids_in_name_order() {
        let index = sample();
        assert_eq!(index.device_count(), 3, "empty device must be dropped");
        assert_eq!(index.software_count(), 3);
        assert_eq!(index.device_id("pc-1"), Some(DeviceId::new(0)));
        assert_eq!(index.software_id("browser"), Some(SoftwareId::new(0)));
        assert_eq!(index.software_id("vpn"), Some(SoftwareId::new(2)));
        assert_eq!(index.device_id("pc-4"), None);
        assert_eq!(index.software_name(SoftwareId::new(1)), Some("office"));
    }

    #[test]
    fn both_directions_agree() {
        let index = sample();
        for device in index.devices() {
            for software in index.required(device) {
                assert!(index.requiring(*software).contains(&device));
            }
        }
        for software in index.software() {
            for device in index.requiring(software) {
                assert!(index.required(*device).contains(&software));
            }
        }
    }

    #[test]
    fn pairs_and_requirements_build_the_same_index() {
        let from_pairs = CoverageIndex::from_pairs([
            ("pc-1", "office"),
            ("pc-1", "vpn"),
            ("pc-2", "vpn"),
            ("pc-2", "office"),
            ("pc-3", "browser"),
            ("pc-3", "browser"),
        ]);
        assert_eq!(from_pairs, sample());
    }

    #[test]
    fn coverage_requires_every_item() {
        let index = sample();
        let office = index.software_id("office").expect("office");
        let vpn = index.software_id("vpn").expect("vpn");
        let tested: BTreeSet<_> = [office].into_iter().collect();
        assert!(index.covered_devices(&tested).is_empty());

        let tested: BTreeSet<_> = [office, vpn].into_iter().collect();
        let covered = index.covered_devices(&tested);
        assert_eq!(covered.len(), 2);
        assert_eq!(index.residual_count(DeviceId::new(2), &tested), 1);
    }

    #[test]
    fn profiles_group_identical_requirements() {
        let index = sample();
        let profiles = index.requirement_profiles();
        assert_eq!(profiles.len(), 2);

        let stats = index.profile_statistics();
        assert_eq!(stats.unique_profiles, 2);
        assert_eq!(stats.min_profile_size, 1);
        assert_eq!(stats.max_profile_size, 2);
        assert_eq!(stats.max_devices_per_profile, 2);
        assert_eq!(stats.min_devices_per_profile, 1);

        let shared = index.required(DeviceId::new(0)).clone();
        assert_eq!(index.devices_with_profile(&shared).len(), 2);
    }

    #[test]
    fn counts_follow_the_incidence() {
        let index = sample();
        assert_eq!(
            index.software_popularity(),
            vec![
                (SoftwareId::new(0), 1),
                (SoftwareId::new(1), 2),
                (SoftwareId::new(2), 2),
            ]
        );
        // Duplicate requirements of pc-1 count once.
        assert_eq!(
            index.requirement_counts(),
            vec![
                (DeviceId::new(0), 2),
                (DeviceId::new(1), 2),
                (DeviceId::new(2), 1),
            ]
        );
    }

    #[test]
    fn unknown_ids_read_as_empty() {
        let index = sample();
        assert!(index.required(DeviceId::new(99)).is_empty());
        assert!(index.requiring(SoftwareId::new(99)).is_empty());
        assert_eq!(index.device_name(DeviceId::new(99)), None);
    }
}
