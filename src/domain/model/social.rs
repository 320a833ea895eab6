//! Public player records returned by the social endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::convert;
use crate::core::assets::GameAssets;
use crate::domain::ports::Storage;
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AvatarType {
    Assistant,
    Icon,
    #[default]
    Default,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Avatar {
    #[serde(default, rename = "type")]
    pub kind: AvatarType,
    /// Avatar id, for example a skin id.
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub skill_id: String,
    #[serde(deserialize_with = "convert::flag")]
    pub unlock: bool,
    #[serde(default, deserialize_with = "convert::flag")]
    pub state: bool,
    /// Mastery level.
    pub specialize_level: i64,
    #[serde(default)]
    pub complete_upgrade_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniEquip {
    #[serde(deserialize_with = "convert::flag")]
    pub hide: bool,
    #[serde(deserialize_with = "convert::flag")]
    pub locked: bool,
    pub level: i64,
}

/// Publicly visible support operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistChar {
    pub char_id: String,
    pub skin_id: String,
    #[serde(default)]
    pub skills: Vec<Skill>,
    pub main_skill_lvl: i64,
    pub skill_index: i64,
    pub evolve_phase: i64,
    /// Raw trust points (25570 is 200% trust).
    pub favor_point: i64,
    pub potential_rank: i64,
    pub level: i64,
    #[serde(default)]
    pub crisis_record: Value,
    #[serde(default)]
    pub current_equip: Option<String>,
    #[serde(default)]
    pub equip: BTreeMap<String, UniEquip>,
}

impl AssistChar {
    pub async fn static_data<S: Storage>(&self, assets: &GameAssets<S>) -> Result<Value> {
        assets.get_operator(&self.char_id, None).await
    }

    /// Operator name, falling back to the raw id when static data lacks one.
    pub async fn display_name<S: Storage>(&self, assets: &GameAssets<S>) -> Result<String> {
        let data = self.static_data(assets).await?;
        Ok(data
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.char_id.clone()))
    }

    pub async fn trust_level<S: Storage>(&self, assets: &GameAssets<S>) -> Result<usize> {
        assets.calculate_trust_level(self.favor_point).await
    }

    /// The currently selected skill, if the index points at one.
    pub fn selected_skill(&self) -> Option<&Skill> {
        usize::try_from(self.skill_index)
            .ok()
            .and_then(|index| self.skills.get(index))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedMedal {
    pub id: String,
    pub pos: (i64, i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedalBoardCustom {
    pub layout: Vec<PlacedMedal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedalBoardTemplate {
    pub group_id: String,
    pub medal_list: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MedalBoardType {
    Custom,
    Template,
    #[default]
    Empty,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedalBoard {
    #[serde(default, rename = "type")]
    pub kind: MedalBoardType,
    #[serde(default)]
    pub custom: Option<MedalBoardCustom>,
    #[serde(default)]
    pub template: Option<MedalBoardTemplate>,
}

/// Player info as returned by `social/searchPlayer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialPlayer {
    #[serde(rename = "nickName")]
    pub nickname: String,
    /// Number shown after `#`.
    pub nick_number: String,
    pub uid: String,
    #[serde(default)]
    pub friend_num_limit: i64,
    #[serde(default)]
    pub server_name: String,
    pub level: i64,
    #[serde(default)]
    pub avatar_id: String,
    #[serde(default)]
    pub avatar: Option<Avatar>,
    #[serde(default)]
    pub assist_char_list: Vec<Option<AssistChar>>,
    #[serde(deserialize_with = "convert::timestamp")]
    pub last_online_time: DateTime<Utc>,
    #[serde(default)]
    pub medal_board: MedalBoard,
}

impl PartialPlayer {
    /// `nickname#number` as displayed in game.
    pub fn display_tag(&self) -> String {
        format!("{}#{}", self.nickname, self.nick_number)
    }

    pub fn assist_chars(&self) -> impl Iterator<Item = &AssistChar> {
        self.assist_char_list.iter().flatten()
    }
}

/// Detailed player info as returned by `social/getFriendList`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(flatten)]
    pub profile: PartialPlayer,
    #[serde(deserialize_with = "convert::timestamp")]
    pub register_ts: DateTime<Utc>,
    /// Current main story stage, `None` once completed.
    #[serde(default)]
    pub main_stage_progress: Option<String>,
    #[serde(default)]
    pub char_cnt: i64,
    #[serde(default)]
    pub furn_cnt: i64,
    #[serde(default)]
    pub secretary: String,
    #[serde(default)]
    pub secretary_skin_id: String,
    #[serde(default)]
    pub resume: String,
    /// Owned operators per faction.
    #[serde(default, rename = "teamV2")]
    pub team_v2: BTreeMap<String, i64>,
    #[serde(default)]
    pub board: Vec<String>,
    #[serde(default, deserialize_with = "convert::optional_timestamp")]
    pub info_share: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "convert::flag")]
    pub recent_visited: bool,
    #[serde(default)]
    pub info_share_visited: Option<i64>,
}

impl Player {
    pub async fn secretary_name<S: Storage>(&self, assets: &GameAssets<S>) -> Result<String> {
        let data = assets.get_operator(&self.secretary, None).await?;
        Ok(data
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.secretary.clone()))
    }
}
