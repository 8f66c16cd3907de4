use qudrando_game::Level;
use serde::{Deserialize, Serialize};
use strum_macros::{EnumString, VariantNames};

/// The quest that marks victory. Quests after it in canonical order are left
/// out of the world entirely.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, VariantNames)]
pub enum Goal {
    QuestWeirdwireConduit,
    QuestMoreThanAWillingSpirit,
    QuestDecodingTheSignal,
    QuestTheEarlOfOmonporch,
    QuestACallToArms,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorldSettings {
    pub goal: Goal,
    /// Levels of experience locations to generate beyond the goal quest's
    /// required level.
    pub extra_location_levels: Level,
    pub locations_per_level: usize,
    /// Include artifact-recovery locations in the world.
    pub lost_artifacts: bool,
}
