use anyhow::{Context, Result, bail, ensure};
use hashbrown::{HashMap, HashSet};
use json::JsonValue;
use log::info;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::str::FromStr;
use strum_macros::{EnumString, VariantNames};

pub type RegionId = usize; // Index into WorldGraph.regions
pub type EntranceId = usize; // Index into WorldGraph.entrances
pub type LocationId = usize; // Index into WorldGraph.locations
pub type ItemId = usize; // Index into Catalog.item_isv.keys: distinct item names
pub type Level = i32; // Character level / stat requirement
pub type LocationCode = i64; // External location id in the multiworld data package
pub type ItemCode = i64; // External item id in the multiworld data package

// Code blocks assigned to this game in the multiworld data package:
pub const BASE_LOCATION_CODE: LocationCode = 90_750_000;
pub const BASE_ITEM_CODE: ItemCode = 90_750_000;

// Upper bound on the "locations per level" option; the catalog assigns this many
// experience location codes per level slice regardless of the configured count.
pub const MAX_LOCATIONS_PER_LEVEL: usize = 5;

pub const VICTORY_ITEM_NAME: &str = "Victory";

#[derive(Default, Clone)]
pub struct IndexedVec<T: Hash + Eq> {
    pub keys: Vec<T>,
    pub index_by_key: HashMap<T, usize>,
}

impl<T: Hash + Eq> IndexedVec<T> {
    pub fn add<U: ToOwned<Owned = T> + ?Sized>(&mut self, name: &U) -> usize {
        if !self.index_by_key.contains_key(&name.to_owned()) {
            let idx = self.keys.len();
            self.index_by_key.insert(name.to_owned(), self.keys.len());
            self.keys.push(name.to_owned());
            idx
        } else {
            self.index_by_key[&name.to_owned()]
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum ItemClassification {
    Progression,
    Useful,
    Filler,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub classification: ItemClassification,
    pub code: Option<ItemCode>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum LocationKind {
    Delivery,
    Lore,
    Artifact,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressType {
    Default,
    Priority,
    Excluded,
}

/// Access rules gate entrances and locations during reachability search. Each
/// variant carries its operand by value, so a rule built inside a loop stays
/// pinned to the iteration it was built for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessRule {
    Free,
    Item(ItemId),
    StatLevel(Level),
    CanReachRegion(RegionId),
    And(Vec<AccessRule>),
}

impl AccessRule {
    pub fn make_and(rules: Vec<AccessRule>) -> AccessRule {
        let mut out_rules: Vec<AccessRule> = vec![];
        for rule in rules {
            if let AccessRule::Free = rule {
                continue;
            } else if let AccessRule::And(and_rules) = rule {
                out_rules.extend(and_rules);
            } else {
                out_rules.push(rule);
            }
        }
        if out_rules.is_empty() {
            AccessRule::Free
        } else if out_rules.len() == 1 {
            out_rules.into_iter().next().unwrap()
        } else {
            AccessRule::And(out_rules)
        }
    }

    /// The conjuncts of this rule, in attachment order.
    pub fn conjuncts(&self) -> &[AccessRule] {
        match self {
            AccessRule::And(rules) => rules,
            other => std::slice::from_ref(other),
        }
    }
}

#[derive(Debug)]
pub struct Region {
    pub name: String,
    pub entrances: Vec<EntranceId>, // outgoing
    pub locations: Vec<LocationId>,
}

#[derive(Debug)]
pub struct Entrance {
    pub name: String,
    pub from: RegionId,
    pub to: RegionId,
    pub rule: AccessRule,
}

#[derive(Debug)]
pub struct Location {
    pub name: String,
    pub code: Option<LocationCode>, // None only for synthetic event locations
    pub region: RegionId,
    pub progress_type: ProgressType,
    pub rule: AccessRule,
    pub locked_item: Option<Item>,
}

/// The per-world dependency graph. Built once by the generation-setup phase,
/// then handed off to the reachability/fill engine, which only reads it.
#[derive(Default, Debug)]
pub struct WorldGraph {
    pub regions: Vec<Region>,
    pub entrances: Vec<Entrance>,
    pub locations: Vec<Location>,
    pub region_id_by_name: HashMap<String, RegionId>,
    pub location_id_by_name: HashMap<String, LocationId>,
    used_location_codes: HashSet<LocationCode>,
    // (region, entrance) pairs: the entrance's reachability depends on the
    // region beyond what its own rule states. Append-only.
    pub indirect_conditions: Vec<(RegionId, EntranceId)>,
}

impl WorldGraph {
    pub fn new() -> Self {
        WorldGraph::default()
    }

    pub fn create_region(&mut self, name: &str) -> Result<RegionId> {
        if self.region_id_by_name.contains_key(name) {
            bail!("Region \"{name}\" created twice");
        }
        let id = self.regions.len();
        self.regions.push(Region {
            name: name.to_string(),
            entrances: vec![],
            locations: vec![],
        });
        self.region_id_by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn get_region(&self, name: &str) -> Result<RegionId> {
        match self.region_id_by_name.get(name) {
            Some(&id) => Ok(id),
            None => bail!("Region \"{name}\" does not exist"),
        }
    }

    pub fn connect(&mut self, from: RegionId, to: RegionId, name: &str, rule: AccessRule) -> EntranceId {
        let id = self.entrances.len();
        self.entrances.push(Entrance {
            name: name.to_string(),
            from,
            to,
            rule,
        });
        self.regions[from].entrances.push(id);
        id
    }

    /// Narrows the entrance's rule to the conjunction of the existing rule and
    /// `rule`. Attaching never replaces or weakens earlier constraints.
    pub fn add_access_rule(&mut self, entrance: EntranceId, rule: AccessRule) {
        let existing = std::mem::replace(&mut self.entrances[entrance].rule, AccessRule::Free);
        self.entrances[entrance].rule = AccessRule::make_and(vec![existing, rule]);
    }

    pub fn register_location(
        &mut self,
        region: RegionId,
        name: &str,
        code: Option<LocationCode>,
        rule: AccessRule,
        progress_type: ProgressType,
    ) -> Result<LocationId> {
        if self.location_id_by_name.contains_key(name) {
            bail!("Location \"{name}\" registered twice");
        }
        if let Some(code) = code {
            if !self.used_location_codes.insert(code) {
                bail!("Location code {code} (\"{name}\") registered twice");
            }
        }
        let id = self.locations.len();
        self.locations.push(Location {
            name: name.to_string(),
            code,
            region,
            progress_type,
            rule,
            locked_item: None,
        });
        self.location_id_by_name.insert(name.to_string(), id);
        self.regions[region].locations.push(id);
        Ok(id)
    }

    /// Permanently binds `item` to the location, excluding it from the shuffled pool.
    pub fn place_locked_item(&mut self, location: LocationId, item: Item) {
        self.locations[location].locked_item = Some(item);
    }

    pub fn register_indirect_condition(&mut self, region: RegionId, entrance: EntranceId) {
        self.indirect_conditions.push((region, entrance));
    }

    pub fn entrance_into(&self, region: RegionId) -> Option<EntranceId> {
        self.entrances.iter().position(|e| e.to == region)
    }
}

#[derive(Clone, Debug)]
pub struct QuestRecord {
    pub name: String,
    pub region: String,
    pub level: Level,
    pub main: bool,
}

#[derive(Clone, Debug)]
pub struct RegionRecord {
    pub name: String,
    pub parent: String,
    pub unlock: Option<String>,
    pub level_band: Option<(Level, Level)>, // [start, end)
    pub reach_level: Option<Level>,
}

#[derive(Clone, Debug)]
pub struct StaticLocationRecord {
    pub name: String,
    pub region: String,
    pub kind: LocationKind,
    pub min_level: Level,
}

/// Static catalog tables, loaded once from the bundled data files and shared
/// read-only across world builds. The order of `quests` is the canonical
/// progression sequence: quests after the goal quest are never materialized.
#[derive(Default)]
pub struct Catalog {
    pub quests: Vec<QuestRecord>,
    pub quest_index_by_name: HashMap<String, usize>,
    pub regions: Vec<RegionRecord>,
    pub static_locations: Vec<StaticLocationRecord>,
    pub item_isv: IndexedVec<String>,
    pub item_classifications: Vec<ItemClassification>, // by ItemId
    pub item_level_bonus: Vec<Level>,                  // by ItemId; levels granted on collect
    pub item_code_by_name: HashMap<String, ItemCode>,
    pub location_code_by_name: HashMap<String, LocationCode>,
}

impl Catalog {
    pub fn load() -> Result<Catalog> {
        let mut catalog = Catalog::default();
        catalog
            .load_items(&parse_json("items.json", include_str!("../data/items.json"))?)
            .context("Unable to load item table")?;
        catalog
            .load_quests(&parse_json("quests.json", include_str!("../data/quests.json"))?)
            .context("Unable to load quest table")?;
        catalog
            .load_regions(&parse_json("regions.json", include_str!("../data/regions.json"))?)
            .context("Unable to load region table")?;
        catalog
            .load_static_locations(&parse_json(
                "locations.json",
                include_str!("../data/locations.json"),
            )?)
            .context("Unable to load static location table")?;
        catalog.assign_location_codes();
        info!(
            "Loaded catalog: {} quests, {} regions, {} static locations, {} items",
            catalog.quests.len(),
            catalog.regions.len(),
            catalog.static_locations.len(),
            catalog.item_isv.keys.len()
        );
        Ok(catalog)
    }

    fn load_items(&mut self, items_json: &JsonValue) -> Result<()> {
        ensure!(items_json.is_object());
        for (name, item_json) in items_json.entries() {
            self.load_item_rec(name, item_json)?;
        }
        Ok(())
    }

    fn load_item_rec(&mut self, name: &str, item_json: &JsonValue) -> Result<()> {
        ensure!(
            !self.item_isv.index_by_key.contains_key(name),
            "Item \"{name}\" listed twice"
        );
        let classification_str = item_json["classification"]
            .as_str()
            .with_context(|| format!("Item \"{name}\" missing classification"))?;
        let classification = ItemClassification::from_str(classification_str)
            .with_context(|| format!("Item \"{name}\": bad classification \"{classification_str}\""))?;
        let level_bonus = item_json["levels"].as_i32().unwrap_or(0);
        let id = self.item_isv.add(name);
        self.item_classifications.push(classification);
        self.item_level_bonus.push(level_bonus);
        self.item_code_by_name
            .insert(name.to_string(), BASE_ITEM_CODE + id as ItemCode);
        Ok(())
    }

    fn load_quests(&mut self, quests_json: &JsonValue) -> Result<()> {
        ensure!(quests_json.is_object());
        for (name, quest_json) in quests_json.entries() {
            self.load_quest_rec(name, quest_json)?;
        }
        Ok(())
    }

    fn load_quest_rec(&mut self, name: &str, quest_json: &JsonValue) -> Result<()> {
        ensure!(
            !self.quest_index_by_name.contains_key(name),
            "Quest \"{name}\" listed twice"
        );
        let region = quest_json["region"]
            .as_str()
            .with_context(|| format!("Quest \"{name}\" missing region"))?;
        ensure!(
            quest_json["main"].is_boolean(),
            "Quest \"{name}\" missing main flag"
        );
        let record = QuestRecord {
            name: name.to_string(),
            region: region.to_string(),
            level: quest_json["level"].as_i32().unwrap_or(1),
            main: quest_json["main"].as_bool().unwrap(),
        };
        self.quest_index_by_name
            .insert(name.to_string(), self.quests.len());
        self.quests.push(record);
        Ok(())
    }

    fn load_regions(&mut self, regions_json: &JsonValue) -> Result<()> {
        ensure!(regions_json.is_object());
        for (name, region_json) in regions_json.entries() {
            self.load_region_rec(name, region_json)?;
        }
        Ok(())
    }

    fn load_region_rec(&mut self, name: &str, region_json: &JsonValue) -> Result<()> {
        let parent = region_json["parent"]
            .as_str()
            .with_context(|| format!("Region \"{name}\" missing parent"))?;
        let level_band = match (
            region_json["levelStart"].as_i32(),
            region_json["levelEnd"].as_i32(),
        ) {
            (Some(start), Some(end)) => {
                ensure!(
                    start >= 1 && end > start,
                    "Region \"{name}\": bad level band [{start}, {end})"
                );
                Some((start, end))
            }
            (None, None) => None,
            _ => bail!("Region \"{name}\": level band declares only one endpoint"),
        };
        self.regions.push(RegionRecord {
            name: name.to_string(),
            parent: parent.to_string(),
            unlock: region_json["unlock"].as_str().map(|x| x.to_string()),
            level_band,
            reach_level: region_json["reachLevel"].as_i32(),
        });
        Ok(())
    }

    fn load_static_locations(&mut self, locations_json: &JsonValue) -> Result<()> {
        ensure!(locations_json.is_object());
        for (name, location_json) in locations_json.entries() {
            self.load_static_location_rec(name, location_json)?;
        }
        Ok(())
    }

    fn load_static_location_rec(&mut self, name: &str, location_json: &JsonValue) -> Result<()> {
        let region = location_json["region"]
            .as_str()
            .with_context(|| format!("Static location \"{name}\" missing region"))?;
        let kind_str = location_json["type"]
            .as_str()
            .with_context(|| format!("Static location \"{name}\" missing type"))?;
        let kind = LocationKind::from_str(kind_str)
            .with_context(|| format!("Static location \"{name}\": bad type \"{kind_str}\""))?;
        self.static_locations.push(StaticLocationRecord {
            name: name.to_string(),
            region: region.to_string(),
            kind,
            min_level: location_json["minLevel"].as_i32().unwrap_or(1),
        });
        Ok(())
    }

    // Location codes cover the full canonical enumeration (all quests, every
    // level slice of every level band, all static locations), independent of
    // goal and options, so a name maps to the same code in every world.
    fn assign_location_codes(&mut self) {
        let mut next = BASE_LOCATION_CODE;
        let mut add = |map: &mut HashMap<String, LocationCode>, name: String| {
            map.entry(name).or_insert_with(|| {
                let code = next;
                next += 1;
                code
            });
        };
        for quest in &self.quests {
            add(&mut self.location_code_by_name, quest.name.clone());
        }
        for region in &self.regions {
            if let Some((start, end)) = region.level_band {
                for level in start..end {
                    for i in 0..MAX_LOCATIONS_PER_LEVEL {
                        add(&mut self.location_code_by_name, xp_location_name(level, i));
                    }
                }
            }
        }
        for loc in &self.static_locations {
            add(&mut self.location_code_by_name, loc.name.clone());
        }
    }

    pub fn item_id(&self, name: &str) -> Result<ItemId> {
        match self.item_isv.index_by_key.get(name) {
            Some(&id) => Ok(id),
            None => bail!("Item \"{name}\" is not in the item table"),
        }
    }

    pub fn location_code(&self, name: &str) -> Result<LocationCode> {
        match self.location_code_by_name.get(name) {
            Some(&code) => Ok(code),
            None => bail!("Location \"{name}\" has no assigned code"),
        }
    }

    pub fn quest(&self, name: &str) -> Option<&QuestRecord> {
        self.quest_index_by_name.get(name).map(|&i| &self.quests[i])
    }
}

pub fn level_region_name(level: Level) -> String {
    format!("Level {level}")
}

pub fn level_entrance_name(level: Level) -> String {
    format!("Reach Level {level}")
}

pub fn xp_location_name(level: Level, i: usize) -> String {
    format!("Level {} XP {}", level, i + 1)
}

fn parse_json(name: &str, json_str: &str) -> Result<JsonValue> {
    json::parse(json_str).with_context(|| format!("unable to parse {name}"))
}
