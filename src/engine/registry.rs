//! 场所 → 扩展有序列表。
//!
//! 扩展记录存放在 arena 中，槽位编号在记录存活期间保持稳定；
//! 每个场所只保存槽位编号的有序列表（插入顺序即执行顺序）以及
//! 地址 → 槽位的索引，用于 O(1) 的成员判断。被移除的槽位进入空闲表复用。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use smallvec::SmallVec;

use super::error::{OrchestratorError, OrchestratorResult};
use super::extension::Extension;
use super::types::{Address, VenueId};

pub const DEFAULT_WEIGHT: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SlotId(usize);

struct ExtensionRecord {
    address: Address,
    extension: Arc<dyn Extension>,
    weight: u64,
}

#[derive(Default)]
struct VenueEntry {
    order: Vec<SlotId>,
    index: HashMap<Address, SlotId>,
}

/// 分发时使用的注册表快照条目。
#[derive(Clone)]
pub struct DispatchEntry {
    pub address: Address,
    pub extension: Arc<dyn Extension>,
    pub weight: u64,
}

pub type DispatchList = SmallVec<[DispatchEntry; 4]>;

/// 候选扩展校验所需的外部约束。
pub struct AdmissionRules<'a> {
    pub self_address: Address,
    /// `None` 表示不要求审批（不可变模式）。
    pub approved: Option<&'a dyn Fn(&Address) -> bool>,
}

#[derive(Default)]
pub struct RegistryStore {
    arena: Vec<Option<ExtensionRecord>>,
    free: Vec<SlotId>,
    venues: HashMap<VenueId, VenueEntry>,
}

impl RegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 场所是否已有非空注册表。
    pub fn is_registered(&self, venue: &VenueId) -> bool {
        self.len(venue) > 0
    }

    pub fn len(&self, venue: &VenueId) -> usize {
        self.venues.get(venue).map_or(0, |entry| entry.order.len())
    }

    pub fn contains(&self, venue: &VenueId, address: &Address) -> bool {
        self.venues
            .get(venue)
            .is_some_and(|entry| entry.index.contains_key(address))
    }

    pub fn venues(&self) -> Vec<VenueId> {
        let mut venues: Vec<VenueId> = self
            .venues
            .iter()
            .filter(|(_, entry)| !entry.order.is_empty())
            .map(|(venue, _)| *venue)
            .collect();
        venues.sort();
        venues
    }

    /// 按执行顺序返回地址列表。
    pub fn extensions(&self, venue: &VenueId) -> Vec<Address> {
        self.venues
            .get(venue)
            .map(|entry| {
                entry
                    .order
                    .iter()
                    .filter_map(|slot| self.record(*slot))
                    .map(|record| record.address)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn weight(&self, venue: &VenueId, address: &Address) -> Option<u64> {
        let slot = self.venues.get(venue)?.index.get(address)?;
        self.record(*slot).map(|record| record.weight)
    }

    pub fn snapshot(&self, venue: &VenueId) -> DispatchList {
        let Some(entry) = self.venues.get(venue) else {
            return DispatchList::new();
        };
        entry
            .order
            .iter()
            .filter_map(|slot| self.record(*slot))
            .map(|record| DispatchEntry {
                address: record.address,
                extension: Arc::clone(&record.extension),
                weight: record.weight,
            })
            .collect()
    }

    /// 在任何写入之前完整校验一批候选扩展。
    pub fn check_admission(
        &self,
        venue: &VenueId,
        candidates: &[Arc<dyn Extension>],
        rules: &AdmissionRules<'_>,
    ) -> OrchestratorResult<()> {
        let mut seen = HashSet::with_capacity(candidates.len());
        for candidate in candidates {
            let address = candidate.address();
            check_address(address, rules.self_address)?;
            if let Some(approved) = rules.approved {
                if !approved(&address) {
                    return Err(OrchestratorError::InvalidExtension {
                        address,
                        reason: "not approved",
                    });
                }
            }
            if !seen.insert(address) || self.contains(venue, &address) {
                return Err(OrchestratorError::DuplicateExtension(address));
            }
        }
        Ok(())
    }

    /// 追加到场所末尾；调用方须先通过 [`Self::check_admission`]。
    pub fn insert_all(&mut self, venue: VenueId, extensions: Vec<Arc<dyn Extension>>) {
        for extension in extensions {
            let address = extension.address();
            let slot = self.allocate(ExtensionRecord {
                address,
                extension,
                weight: DEFAULT_WEIGHT,
            });
            let entry = self.venues.entry(venue).or_default();
            entry.order.push(slot);
            entry.index.insert(address, slot);
        }
    }

    /// 移除给定地址，不在注册表中的地址直接忽略。返回实际移除的地址。
    pub fn remove_all(&mut self, venue: &VenueId, addresses: &[Address]) -> Vec<Address> {
        let Some(entry) = self.venues.get_mut(venue) else {
            return Vec::new();
        };
        let mut removed = Vec::new();
        let mut released = Vec::new();
        for address in addresses {
            if let Some(slot) = entry.index.remove(address) {
                released.push(slot);
                removed.push(*address);
            }
        }
        if released.is_empty() {
            return removed;
        }
        entry.order.retain(|slot| !released.contains(slot));
        for slot in released {
            self.arena[slot.0] = None;
            self.free.push(slot);
        }
        removed
    }

    pub fn set_weight(
        &mut self,
        venue: &VenueId,
        address: &Address,
        weight: u64,
    ) -> OrchestratorResult<u64> {
        let slot = self
            .venues
            .get(venue)
            .and_then(|entry| entry.index.get(address))
            .copied()
            .ok_or(OrchestratorError::InvalidExtension {
                address: *address,
                reason: "not registered for venue",
            })?;
        let record = self
            .arena
            .get_mut(slot.0)
            .and_then(Option::as_mut)
            .ok_or(OrchestratorError::InvalidExtension {
                address: *address,
                reason: "not registered for venue",
            })?;
        let previous = record.weight;
        record.weight = weight;
        Ok(previous)
    }

    fn allocate(&mut self, record: ExtensionRecord) -> SlotId {
        match self.free.pop() {
            Some(slot) => {
                self.arena[slot.0] = Some(record);
                slot
            }
            None => {
                self.arena.push(Some(record));
                SlotId(self.arena.len() - 1)
            }
        }
    }

    fn record(&self, slot: SlotId) -> Option<&ExtensionRecord> {
        self.arena.get(slot.0).and_then(Option::as_ref)
    }
}

/// 非零、且不能指向编排器自身。
pub fn check_address(address: Address, self_address: Address) -> OrchestratorResult<()> {
    if address.is_zero() {
        return Err(OrchestratorError::InvalidExtension {
            address,
            reason: "zero address",
        });
    }
    if address == self_address {
        return Err(OrchestratorError::InvalidExtension {
            address,
            reason: "orchestrator itself",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub(Address);

    impl Extension for Stub {
        fn address(&self) -> Address {
            self.0
        }
    }

    fn stub(address: Address) -> Arc<dyn Extension> {
        Arc::new(Stub(address))
    }

    fn open_rules(self_address: Address) -> AdmissionRules<'static> {
        AdmissionRules {
            self_address,
            approved: None,
        }
    }

    #[test]
    fn insertion_order_is_execution_order() {
        let mut store = RegistryStore::new();
        let venue = VenueId::new_unique();
        let (a, b, c) = (Address::new_unique(), Address::new_unique(), Address::new_unique());
        store.insert_all(venue, vec![stub(b), stub(a)]);
        store.insert_all(venue, vec![stub(c)]);
        assert_eq!(store.extensions(&venue), vec![b, a, c]);
        let snapshot: Vec<_> = store.snapshot(&venue).iter().map(|e| e.address).collect();
        assert_eq!(snapshot, vec![b, a, c]);
        assert!(store.is_registered(&venue));
    }

    #[test]
    fn duplicates_are_rejected_within_batch_and_against_existing() {
        let mut store = RegistryStore::new();
        let venue = VenueId::new_unique();
        let rules = open_rules(Address::new_unique());
        let a = Address::new_unique();

        let err = store
            .check_admission(&venue, &[stub(a), stub(a)], &rules)
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::DuplicateExtension(addr) if addr == a));

        store.insert_all(venue, vec![stub(a)]);
        let err = store.check_admission(&venue, &[stub(a)], &rules).unwrap_err();
        assert!(matches!(err, OrchestratorError::DuplicateExtension(_)));
    }

    #[test]
    fn zero_self_and_unapproved_addresses_are_invalid() {
        let store = RegistryStore::new();
        let venue = VenueId::new_unique();
        let me = Address::new_unique();
        let rules = open_rules(me);

        for bad in [Address::ZERO, me] {
            let err = store.check_admission(&venue, &[stub(bad)], &rules).unwrap_err();
            assert!(matches!(err, OrchestratorError::InvalidExtension { .. }));
        }

        let approved_one = Address::new_unique();
        let approve = move |address: &Address| *address == approved_one;
        let strict = AdmissionRules {
            self_address: me,
            approved: Some(&approve as &dyn Fn(&Address) -> bool),
        };
        assert!(store.check_admission(&venue, &[stub(approved_one)], &strict).is_ok());
        let err = store
            .check_admission(&venue, &[stub(approved_one), stub(Address::new_unique())], &strict)
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::InvalidExtension {
                reason: "not approved",
                ..
            }
        ));
    }

    #[test]
    fn removing_non_member_is_noop() {
        let mut store = RegistryStore::new();
        let venue = VenueId::new_unique();
        let a = Address::new_unique();
        store.insert_all(venue, vec![stub(a)]);

        let removed = store.remove_all(&venue, &[Address::new_unique()]);
        assert!(removed.is_empty());
        assert_eq!(store.len(&venue), 1);

        let removed = store.remove_all(&VenueId::new_unique(), &[a]);
        assert!(removed.is_empty());
        assert_eq!(store.len(&venue), 1);
    }

    #[test]
    fn removal_preserves_order_and_reuses_slots() {
        let mut store = RegistryStore::new();
        let venue = VenueId::new_unique();
        let other = VenueId::new_unique();
        let ids: Vec<Address> = (0..4).map(|_| Address::new_unique()).collect();
        store.insert_all(venue, ids.iter().map(|a| stub(*a)).collect());
        let shared = Address::new_unique();
        store.insert_all(other, vec![stub(shared)]);

        let removed = store.remove_all(&venue, &[ids[1], ids[3]]);
        assert_eq!(removed, vec![ids[1], ids[3]]);
        assert_eq!(store.extensions(&venue), vec![ids[0], ids[2]]);

        let arena_len = store.arena.len();
        let fresh = Address::new_unique();
        store.insert_all(venue, vec![stub(fresh)]);
        assert_eq!(store.arena.len(), arena_len);
        assert_eq!(store.extensions(&venue), vec![ids[0], ids[2], fresh]);
        assert_eq!(store.extensions(&other), vec![shared]);
    }

    #[test]
    fn weights_default_to_one_and_are_per_venue() {
        let mut store = RegistryStore::new();
        let (v1, v2) = (VenueId::new_unique(), VenueId::new_unique());
        let a = Address::new_unique();
        store.insert_all(v1, vec![stub(a)]);
        store.insert_all(v2, vec![stub(a)]);

        assert_eq!(store.weight(&v1, &a), Some(DEFAULT_WEIGHT));
        assert_eq!(store.set_weight(&v1, &a, 5).unwrap(), DEFAULT_WEIGHT);
        assert_eq!(store.weight(&v1, &a), Some(5));
        assert_eq!(store.weight(&v2, &a), Some(DEFAULT_WEIGHT));

        let err = store
            .set_weight(&v1, &Address::new_unique(), 2)
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidExtension { .. }));
    }

    #[test]
    fn emptied_venue_is_no_longer_registered() {
        let mut store = RegistryStore::new();
        let venue = VenueId::new_unique();
        let a = Address::new_unique();
        store.insert_all(venue, vec![stub(a)]);
        store.remove_all(&venue, &[a]);
        assert!(!store.is_registered(&venue));
        assert!(store.venues().is_empty());
        assert!(store.snapshot(&venue).is_empty());
    }
}
