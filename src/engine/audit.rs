use std::collections::VecDeque;

use serde::Serialize;

use super::fee::{FeeCalculationMethod, FeeSource};
use super::types::{Address, LifecycleEvent, VenueId};

/// 变更记录：每次注册表、审批、费率或角色变更都会产生一条。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ChangeRecord {
    VenueRegistered {
        venue: VenueId,
        extensions: Vec<Address>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        weights: Vec<(Address, u64)>,
        method: FeeCalculationMethod,
    },
    ExtensionsAdded {
        venue: VenueId,
        extensions: Vec<Address>,
    },
    ExtensionsRemoved {
        venue: VenueId,
        extensions: Vec<Address>,
    },
    ExtensionWeightUpdated {
        venue: VenueId,
        extension: Address,
        weight: u64,
    },
    ExtensionApproved {
        extension: Address,
    },
    ExtensionRevoked {
        extension: Address,
    },
    FeeMethodUpdated {
        venue: VenueId,
        method: FeeCalculationMethod,
    },
    DefaultFeeUpdated {
        venue: VenueId,
        fee: u32,
    },
    GovernanceFeeUpdated {
        venue: VenueId,
        fee: Option<u32>,
    },
    VenueSpecificFeeUpdated {
        venue: VenueId,
        fee: Option<u32>,
    },
    RegistryManagerUpdated {
        previous: Address,
        next: Address,
    },
    GovernanceTransferred {
        previous: Address,
        next: Address,
    },
    OwnershipTransferred {
        previous: Address,
        next: Address,
    },
}

impl ChangeRecord {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeRecord::VenueRegistered { .. } => "venue_registered",
            ChangeRecord::ExtensionsAdded { .. } => "extensions_added",
            ChangeRecord::ExtensionsRemoved { .. } => "extensions_removed",
            ChangeRecord::ExtensionWeightUpdated { .. } => "extension_weight_updated",
            ChangeRecord::ExtensionApproved { .. } => "extension_approved",
            ChangeRecord::ExtensionRevoked { .. } => "extension_revoked",
            ChangeRecord::FeeMethodUpdated { .. } => "fee_method_updated",
            ChangeRecord::DefaultFeeUpdated { .. } => "default_fee_updated",
            ChangeRecord::GovernanceFeeUpdated { .. } => "governance_fee_updated",
            ChangeRecord::VenueSpecificFeeUpdated { .. } => "venue_specific_fee_updated",
            ChangeRecord::RegistryManagerUpdated { .. } => "registry_manager_updated",
            ChangeRecord::GovernanceTransferred { .. } => "governance_transferred",
            ChangeRecord::OwnershipTransferred { .. } => "ownership_transferred",
        }
    }

    pub fn venue(&self) -> Option<VenueId> {
        match self {
            ChangeRecord::VenueRegistered { venue, .. }
            | ChangeRecord::ExtensionsAdded { venue, .. }
            | ChangeRecord::ExtensionsRemoved { venue, .. }
            | ChangeRecord::ExtensionWeightUpdated { venue, .. }
            | ChangeRecord::FeeMethodUpdated { venue, .. }
            | ChangeRecord::DefaultFeeUpdated { venue, .. }
            | ChangeRecord::GovernanceFeeUpdated { venue, .. }
            | ChangeRecord::VenueSpecificFeeUpdated { venue, .. } => Some(*venue),
            _ => None,
        }
    }
}

/// 成功分发的审计记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchRecord {
    pub venue: VenueId,
    pub event: LifecycleEvent,
    pub extensions: Vec<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<(u32, FeeSource)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalEntry {
    Dispatch(DispatchRecord),
    Change(ChangeRecord),
}

/// 定长审计日志，超出容量时丢弃最旧的记录。
#[derive(Debug)]
pub struct Journal {
    entries: VecDeque<JournalEntry>,
    capacity: usize,
    sequence: u64,
}

impl Journal {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            sequence: 0,
        }
    }

    pub fn push(&mut self, entry: JournalEntry) {
        if self.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.sequence += 1;
    }

    /// 历史上写入过的记录总数（含已被淘汰的）。
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_evicts_oldest_when_full() {
        let mut journal = Journal::with_capacity(2);
        for _ in 0..3 {
            journal.push(JournalEntry::Change(ChangeRecord::ExtensionApproved {
                extension: Address::new_unique(),
            }));
        }
        assert_eq!(journal.len(), 2);
        assert_eq!(journal.sequence(), 3);
    }

    #[test]
    fn change_records_expose_venue_when_scoped() {
        let venue = VenueId::new_unique();
        let scoped = ChangeRecord::DefaultFeeUpdated { venue, fee: 10 };
        assert_eq!(scoped.venue(), Some(venue));
        assert_eq!(scoped.label(), "default_fee_updated");

        let global = ChangeRecord::ExtensionRevoked {
            extension: Address::new_unique(),
        };
        assert_eq!(global.venue(), None);
    }

    #[test]
    fn journal_entries_serialize_with_tags() {
        let entry = JournalEntry::Change(ChangeRecord::GovernanceFeeUpdated {
            venue: VenueId::new_from_array([1u8; 32]),
            fee: Some(500),
        });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "change");
        assert_eq!(json["change"], "governance_fee_updated");
        assert_eq!(json["fee"], 500);
    }
}
