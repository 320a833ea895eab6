//! Battle replay records decoded from `battleReplay` payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::convert;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub standard_play_time: f64,
    #[serde(deserialize_with = "convert::flag")]
    pub game_result: bool,
    #[serde(deserialize_with = "convert::timestamp")]
    pub save_time: DateTime<Utc>,
    pub remaining_cost: i64,
    pub remaining_life_point: i64,
    pub killed_enemies_cnt: i64,
    pub missed_enemies_cnt: i64,
    pub level_id: String,
    pub stage_id: String,
    #[serde(default)]
    pub valid_killed_enemies_cnt: i64,
}

/// Operator deployed in the replayed squad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub char_inst_id: i64,
    pub skin_id: String,
    /// Chosen class for Amiya.
    #[serde(default)]
    pub tmpl_id: Option<String>,
    pub skill_id: String,
    pub skill_index: i64,
    pub skill_lvl: i64,
    pub level: i64,
    pub phase: i64,
    pub potential_rank: i64,
    pub favor_battle_phase: i64,
    #[serde(deserialize_with = "convert::flag")]
    pub is_assist_char: bool,
    #[serde(default)]
    pub uniequip_id: String,
    #[serde(default)]
    pub uniequip_level: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub unique_id: i64,
    pub char_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pos {
    pub row: i64,
    pub col: i64,
}

/// A single deploy or retreat action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub timestamp: f64,
    /// Misspelled on the wire.
    pub signiture: Signature,
    pub op: i64,
    pub direction: i64,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journal {
    pub metadata: Metadata,
    pub squad: Vec<Character>,
    pub logs: Vec<Log>,
    pub random_seed: i64,
    #[serde(default)]
    pub rune_list: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleReplay {
    #[serde(deserialize_with = "convert::flag")]
    pub campaign_only_version: bool,
    #[serde(deserialize_with = "convert::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub journal: Journal,
}

impl BattleReplay {
    pub fn stage_id(&self) -> &str {
        &self.journal.metadata.stage_id
    }

    /// Deploy actions in order, skipping retreats.
    pub fn deployments(&self) -> impl Iterator<Item = &Log> {
        self.journal.logs.iter().filter(|log| log.op == 0)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_deserializes() {
        let replay: BattleReplay = serde_json::from_value(fixtures::replay_json()).unwrap();

        assert_eq!(replay.stage_id(), "main_01-07");
        assert_eq!(replay.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(replay.journal.metadata.save_time, replay.timestamp);
        assert!(replay.journal.metadata.game_result);
        assert_eq!(replay.journal.squad[0].skill_lvl, 7);
    }

    #[test]
    fn test_deployments_skip_retreats() {
        let replay: BattleReplay = serde_json::from_value(fixtures::replay_json()).unwrap();
        let deploys: Vec<_> = replay.deployments().collect();

        assert_eq!(deploys.len(), 1);
        assert_eq!(deploys[0].pos, Pos { row: 2, col: 3 });
    }
}
