//! Private account data from `account/syncData`. Not fully modeled.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::convert;
use super::social::Avatar;
use crate::core::assets::GameAssets;
use crate::domain::ports::Storage;
use crate::utils::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Status {
    #[serde(rename = "nickName")]
    pub nickname: String,
    pub nick_number: String,
    pub uid: String,
    pub level: i64,
    pub exp: i64,
    /// Credit shop credits.
    pub social_point: i64,
    pub gacha_ticket: i64,
    pub ten_gacha_ticket: i64,
    pub instant_finish_ticket: i64,
    pub hgg_shard: i64,
    pub lgg_shard: i64,
    pub recruit_license: i64,
    pub progress: i64,
    pub buy_ap_remain_times: i64,
    #[serde(deserialize_with = "convert::flag")]
    pub ap_limit_up_flag: bool,
    /// Completed stories.
    #[serde(deserialize_with = "convert::flag_map")]
    pub flags: BTreeMap<String, bool>,
    /// Current sanity.
    pub ap: i64,
    pub max_ap: i64,
    pub pay_diamond: i64,
    pub free_diamond: i64,
    /// Orundum.
    pub diamond_shard: i64,
    /// LMD.
    pub gold: i64,
    pub practice_ticket: i64,
    #[serde(deserialize_with = "convert::optional_timestamp")]
    pub last_refresh_ts: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "convert::optional_timestamp")]
    pub last_ap_add_time: Option<DateTime<Utc>>,
    pub main_stage_progress: Option<String>,
    #[serde(deserialize_with = "convert::optional_timestamp")]
    pub register_ts: Option<DateTime<Utc>>,
    pub server_name: String,
    pub avatar_id: String,
    pub resume: String,
    pub friend_num_limit: i64,
    pub secretary: String,
    pub secretary_skin_id: String,
    pub global_voice_lan: Option<String>,
    pub avatar: Avatar,
}

impl Status {
    /// Currencies kept on the status object rather than in the inventory,
    /// keyed by their item id.
    pub fn basic_item_inventory(&self) -> BTreeMap<&'static str, i64> {
        BTreeMap::from([
            ("SOCIAL_PT", self.social_point),
            ("AP_GAMEPLAY", self.ap),
            ("4001", self.gold),
            ("4002", self.pay_diamond + self.free_diamond),
            ("4003", self.diamond_shard),
            ("4004", self.hgg_shard),
            ("4005", self.lgg_shard),
            ("5001", self.exp),
            ("6001", self.practice_ticket),
            ("7001", self.recruit_license),
            ("7002", self.instant_finish_ticket),
            ("7003", self.gacha_ticket),
            ("7004", self.ten_gacha_ticket),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadSlot {
    pub char_inst_id: i64,
    pub skill_index: i64,
    #[serde(default)]
    pub current_equip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Squad {
    pub squad_id: String,
    pub name: String,
    pub slots: Vec<Option<SquadSlot>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub skill_id: String,
    #[serde(deserialize_with = "convert::flag")]
    pub unlock: bool,
    #[serde(default, deserialize_with = "convert::flag")]
    pub state: bool,
    pub specialize_level: i64,
    /// `None` when no mastery is being trained.
    #[serde(default, deserialize_with = "convert::optional_timestamp")]
    pub complete_upgrade_time: Option<DateTime<Utc>>,
}

impl Skill {
    pub async fn static_data<S: Storage>(&self, assets: &GameAssets<S>) -> Result<Value> {
        assets.get_skill(&self.skill_id, None).await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equip {
    #[serde(deserialize_with = "convert::flag")]
    pub hide: bool,
    #[serde(deserialize_with = "convert::flag")]
    pub locked: bool,
    pub level: i64,
}

/// An owned operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub inst_id: i64,
    pub char_id: String,
    pub favor_point: i64,
    pub potential_rank: i64,
    pub main_skill_lvl: i64,
    #[serde(default)]
    pub skin: String,
    pub level: i64,
    #[serde(default)]
    pub exp: i64,
    pub evolve_phase: i64,
    #[serde(default)]
    pub default_skill_index: i64,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub voice_lan: String,
    #[serde(default)]
    pub current_equip: Option<String>,
    #[serde(default)]
    pub equip: BTreeMap<String, Equip>,
    #[serde(default, deserialize_with = "convert::flag")]
    pub star_mark: bool,
}

impl Character {
    pub async fn static_data<S: Storage>(&self, assets: &GameAssets<S>) -> Result<Value> {
        assets.get_operator(&self.char_id, None).await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharGroup {
    pub favor_point: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Troops {
    #[serde(default)]
    pub cur_char_inst_id: i64,
    #[serde(default)]
    pub cur_squad_count: i64,
    #[serde(default)]
    pub squads: BTreeMap<String, Squad>,
    /// Operators keyed by instance id. Amiya's class variants are collapsed
    /// into the currently selected one.
    #[serde(default, deserialize_with = "deserialize_chars")]
    pub chars: BTreeMap<String, Character>,
    #[serde(default)]
    pub char_group: BTreeMap<String, CharGroup>,
    #[serde(default, deserialize_with = "convert::nested_flag_map")]
    pub char_mission: BTreeMap<String, BTreeMap<String, bool>>,
    #[serde(default)]
    pub addon: Value,
}

fn flatten_current_template(character: &mut Value) {
    let current = character
        .get("currentTmpl")
        .and_then(Value::as_str)
        .and_then(|tmpl| character.get("tmpl")?.get(tmpl))
        .cloned();

    if let (Some(Value::Object(current)), Some(target)) = (current, character.as_object_mut()) {
        for (key, value) in current {
            let key = if key == "skinId" { "skin".to_string() } else { key };
            target.insert(key, value);
        }
    }
}

fn deserialize_chars<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, Character>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(inst_id, mut value)| {
            flatten_current_template(&mut value);
            serde_json::from_value(value)
                .map(|character| (inst_id, character))
                .map_err(D::Error::custom)
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skins {
    #[serde(default, deserialize_with = "convert::flag_map")]
    pub character_skins: BTreeMap<String, bool>,
    /// When each skin was obtained.
    #[serde(default, deserialize_with = "convert::timestamp_map")]
    pub skin_ts: BTreeMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistSlot {
    pub char_inst_id: i64,
    pub skill_index: i64,
    #[serde(default)]
    pub current_equip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Social {
    #[serde(default)]
    pub assist_char_list: Vec<Option<AssistSlot>>,
    #[serde(default)]
    pub yesterday_reward: Value,
    #[serde(default)]
    pub y_crisis_ss: Value,
    #[serde(default)]
    pub medal_board: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumableExpire {
    #[serde(deserialize_with = "convert::optional_timestamp")]
    pub ts: Option<DateTime<Utc>>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub status: Status,
    #[serde(default)]
    pub troop: Troops,
    #[serde(default)]
    pub skin: Skins,
    #[serde(default)]
    pub social: Social,
    #[serde(default)]
    pub consumable: BTreeMap<String, BTreeMap<String, ConsumableExpire>>,
    /// Item id to amount. Basic currencies live on [`Status`].
    #[serde(default)]
    pub inventory: BTreeMap<String, i64>,
}

impl User {
    pub fn character(&self, char_id: &str) -> Option<&Character> {
        self.troop.chars.values().find(|c| c.char_id == char_id)
    }

    /// Inventory merged with the currencies stored on the status.
    pub fn full_inventory(&self) -> BTreeMap<String, i64> {
        let mut items = self.inventory.clone();
        for (item_id, count) in self.status.basic_item_inventory() {
            *items.entry(item_id.to_string()).or_insert(0) += count;
        }
        items
    }
}
