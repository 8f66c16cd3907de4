use crate::settings::{Goal, WorldSettings};
use anyhow::{Context, Result, bail, ensure};
use hashbrown::HashMap;
use log::info;
use qudrando_game::{
    AccessRule, Catalog, EntranceId, Item, ItemClassification, Level, LocationKind, ProgressType,
    RegionId, WorldGraph, level_entrance_name, level_region_name, xp_location_name,
    MAX_LOCATIONS_PER_LEVEL, VICTORY_ITEM_NAME,
};
use serde_derive::Serialize;

pub const ROOT_REGION_NAME: &str = "Menu";

pub fn goal_quest_key(goal: Goal) -> &'static str {
    match goal {
        Goal::QuestWeirdwireConduit => "Weirdwire Conduit... Eureka!~Return to Argyve",
        Goal::QuestMoreThanAWillingSpirit => "More Than a Willing Spirit~Return to Grit Gate",
        Goal::QuestDecodingTheSignal => "Decoding the Signal~Return to Grit Gate",
        Goal::QuestTheEarlOfOmonporch => "The Earl of Omonporch~Return to Grit Gate",
        Goal::QuestACallToArms => "A Call to Arms~Defend Grit Gate",
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct GoalInfo {
    pub quest_key: &'static str,
    pub required_level: Level,
}

pub fn resolve_goal(catalog: &Catalog, goal: Goal) -> Result<GoalInfo> {
    let quest_key = goal_quest_key(goal);
    let Some(quest) = catalog.quest(quest_key) else {
        bail!("Goal {goal:?} maps to quest \"{quest_key}\", which is not in the quest table");
    };
    Ok(GoalInfo {
        quest_key,
        required_level: quest.level,
    })
}

/// Highest level for which experience locations are generated.
pub fn max_level(catalog: &Catalog, settings: &WorldSettings) -> Result<Level> {
    let goal = resolve_goal(catalog, settings.goal)?;
    Ok(goal.required_level + settings.extra_location_levels)
}

/// Builds one world's dependency graph from the catalog and settings. Owns the
/// graph for the duration of the build; `build` hands it off by value.
pub struct WorldBuilder<'a> {
    catalog: &'a Catalog,
    settings: &'a WorldSettings,
    goal: GoalInfo,
    max_level: Level,
    graph: WorldGraph,
    entrance_into: HashMap<RegionId, EntranceId>,
}

impl<'a> WorldBuilder<'a> {
    pub fn new(catalog: &'a Catalog, settings: &'a WorldSettings) -> Result<Self> {
        ensure!(
            settings.locations_per_level <= MAX_LOCATIONS_PER_LEVEL,
            "locations_per_level {} exceeds the maximum of {}",
            settings.locations_per_level,
            MAX_LOCATIONS_PER_LEVEL
        );
        ensure!(
            settings.extra_location_levels >= 0,
            "extra_location_levels must not be negative"
        );
        let goal = resolve_goal(catalog, settings.goal)?;
        let max_level = goal.required_level + settings.extra_location_levels;
        Ok(WorldBuilder {
            catalog,
            settings,
            goal,
            max_level,
            graph: WorldGraph::new(),
            entrance_into: HashMap::new(),
        })
    }

    pub fn build(mut self) -> Result<WorldGraph> {
        self.create_regions()?;
        self.attach_reach_conditions()?;
        self.add_quests()?;
        self.add_static_locations()?;
        info!(
            "Built world graph for {}: {} regions, {} entrances, {} locations",
            self.goal.quest_key,
            self.graph.regions.len(),
            self.graph.entrances.len(),
            self.graph.locations.len()
        );
        Ok(self.graph)
    }

    // The region table is not required to list parents before children, so
    // unresolved records are retried until a pass makes no progress.
    fn create_regions(&mut self) -> Result<()> {
        self.graph.create_region(ROOT_REGION_NAME)?;
        let mut pending: Vec<usize> = (0..self.catalog.regions.len()).collect();
        while !pending.is_empty() {
            let mut deferred: Vec<usize> = vec![];
            for &idx in &pending {
                let parent = &self.catalog.regions[idx].parent;
                if self.graph.region_id_by_name.contains_key(parent) {
                    self.materialize_region(idx)?;
                } else {
                    deferred.push(idx);
                }
            }
            if deferred.len() == pending.len() {
                let names: Vec<&str> = deferred
                    .iter()
                    .map(|&idx| self.catalog.regions[idx].name.as_str())
                    .collect();
                bail!(
                    "Could not resolve parent regions for: {}",
                    names.join(", ")
                );
            }
            pending = deferred;
        }
        Ok(())
    }

    fn materialize_region(&mut self, idx: usize) -> Result<()> {
        let record = &self.catalog.regions[idx];
        let mut rule = match &record.unlock {
            Some(item_name) => AccessRule::Item(
                self.catalog
                    .item_id(item_name)
                    .with_context(|| format!("Unlock item declared by region \"{}\"", record.name))?,
            ),
            None => AccessRule::Free,
        };
        let entrance_name = match record.level_band {
            Some((start, _)) => {
                // Level-track regions are only reachable with the stats for
                // their level; reach-level conditions on other entrances
                // depend on this.
                rule = AccessRule::make_and(vec![rule, AccessRule::StatLevel(start)]);
                level_entrance_name(start)
            }
            None => format!("{} to {}", record.parent, record.name),
        };
        let parent_id = self.graph.get_region(&record.parent)?;
        let region_id = self.graph.create_region(&record.name)?;
        let entrance = self.graph.connect(parent_id, region_id, &entrance_name, rule);
        self.entrance_into.insert(region_id, entrance);
        if let Some((start, end)) = record.level_band {
            self.add_xp_locations(region_id, start, end)?;
        }
        Ok(())
    }

    fn add_xp_locations(&mut self, region: RegionId, start: Level, end: Level) -> Result<()> {
        for level in start..end {
            if level > self.max_level {
                continue;
            }
            for i in 0..self.settings.locations_per_level {
                let name = xp_location_name(level, i);
                let code = self.catalog.location_code(&name)?;
                self.graph.register_location(
                    region,
                    &name,
                    Some(code),
                    AccessRule::StatLevel(level),
                    ProgressType::Default,
                )?;
            }
        }
        Ok(())
    }

    // A reach-level constraint narrows the region's inbound entrance with a
    // condition on another region's reachability, which the search engine's
    // backward-reachability cache must be told about explicitly.
    fn attach_reach_conditions(&mut self) -> Result<()> {
        for record in &self.catalog.regions {
            let Some(reach_level) = record.reach_level else {
                continue;
            };
            let region = self.graph.get_region(&record.name)?;
            let level_region = self
                .graph
                .get_region(&level_region_name(reach_level))
                .with_context(|| {
                    format!(
                        "Reach level {} declared by region \"{}\"",
                        reach_level, record.name
                    )
                })?;
            let entrance = self.entrance_into[&region];
            self.graph
                .add_access_rule(entrance, AccessRule::CanReachRegion(level_region));
            self.graph.register_indirect_condition(level_region, entrance);
        }
        Ok(())
    }

    fn add_quests(&mut self) -> Result<()> {
        for quest in &self.catalog.quests {
            let region = self
                .graph
                .get_region(&quest.region)
                .with_context(|| format!("Region declared by quest \"{}\"", quest.name))?;
            if quest.name == self.goal.quest_key {
                // Victory event instead of a normal location; quests after the
                // goal are never materialized.
                let location = self.graph.register_location(
                    region,
                    &quest.name,
                    None,
                    AccessRule::Free,
                    ProgressType::Priority,
                )?;
                self.graph.place_locked_item(
                    location,
                    Item {
                        name: VICTORY_ITEM_NAME.to_string(),
                        classification: ItemClassification::Progression,
                        code: None,
                    },
                );
                break;
            }
            let code = self.catalog.location_code(&quest.name)?;
            self.graph.register_location(
                region,
                &quest.name,
                Some(code),
                AccessRule::StatLevel(quest.level),
                ProgressType::Priority,
            )?;
        }
        Ok(())
    }

    fn add_static_locations(&mut self) -> Result<()> {
        for record in &self.catalog.static_locations {
            let kind_enabled = match record.kind {
                LocationKind::Delivery | LocationKind::Lore => true,
                LocationKind::Artifact => self.settings.lost_artifacts,
            };
            // TODO: confirm with game-design rules whether the min-level bound
            // should apply only to artifact locations.
            if !kind_enabled || record.min_level > self.max_level {
                continue;
            }
            let region = self
                .graph
                .get_region(&record.region)
                .with_context(|| format!("Region declared by static location \"{}\"", record.name))?;
            let progress_type = if record.kind == LocationKind::Delivery {
                ProgressType::Default
            } else {
                ProgressType::Priority
            };
            let code = self.catalog.location_code(&record.name)?;
            self.graph.register_location(
                region,
                &record.name,
                Some(code),
                AccessRule::StatLevel(record.min_level),
                progress_type,
            )?;
        }
        Ok(())
    }
}
