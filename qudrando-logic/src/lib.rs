use qudrando_game::{AccessRule, Catalog, ItemId, Level, RegionId};
use serde::{Deserialize, Serialize};

/// Snapshot of collected items and currently-reachable regions, owned by the
/// reachability/fill engine. Access rules query it; nothing in the graph
/// builder mutates it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionState {
    pub items: Vec<i32>,               // counts, by ItemId
    pub reachable_regions: Vec<bool>,  // by RegionId
    pub level: Level,                  // attainable character level
}

impl CollectionState {
    pub fn new(catalog: &Catalog, num_regions: usize) -> Self {
        CollectionState {
            items: vec![0; catalog.item_isv.keys.len()],
            reachable_regions: vec![false; num_regions],
            level: 1,
        }
    }

    pub fn has(&self, item: ItemId) -> bool {
        self.items[item] > 0
    }

    pub fn can_reach_region(&self, region: RegionId) -> bool {
        self.reachable_regions[region]
    }

    pub fn meets_stat_requirement(&self, level: Level) -> bool {
        self.level >= level
    }

    pub fn collect(&mut self, item: ItemId, catalog: &Catalog) {
        self.items[item] += 1;
        self.level += catalog.item_level_bonus[item];
    }

    pub fn mark_region_reachable(&mut self, region: RegionId) {
        self.reachable_regions[region] = true;
    }
}

/// Pure and idempotent: the search engine evaluates rules an unbounded number
/// of times, in any order, against many state snapshots.
pub fn rule_satisfied(rule: &AccessRule, state: &CollectionState) -> bool {
    match rule {
        AccessRule::Free => true,
        &AccessRule::Item(item) => state.has(item),
        &AccessRule::StatLevel(level) => state.meets_stat_requirement(level),
        &AccessRule::CanReachRegion(region) => state.can_reach_region(region),
        AccessRule::And(rules) => rules.iter().all(|r| rule_satisfied(r, state)),
    }
}
