//! Server, distributor and domain slugs.
//!
//! These are not official names, only stable identifiers for the regional
//! backends and the keys of their network configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::error::ArkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArknightsServer {
    En,
    Jp,
    Kr,
    Cn,
    Bili,
    Tw,
}

impl ArknightsServer {
    pub const ALL: [ArknightsServer; 6] = [
        ArknightsServer::En,
        ArknightsServer::Jp,
        ArknightsServer::Kr,
        ArknightsServer::Cn,
        ArknightsServer::Bili,
        ArknightsServer::Tw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArknightsServer::En => "en",
            ArknightsServer::Jp => "jp",
            ArknightsServer::Kr => "kr",
            ArknightsServer::Cn => "cn",
            ArknightsServer::Bili => "bili",
            ArknightsServer::Tw => "tw",
        }
    }

    pub fn distributor(&self) -> ArknightsDistributor {
        match self {
            ArknightsServer::En | ArknightsServer::Jp | ArknightsServer::Kr => {
                ArknightsDistributor::Yostar
            }
            ArknightsServer::Cn => ArknightsDistributor::Hypergryph,
            ArknightsServer::Bili => ArknightsDistributor::Bilibili,
            ArknightsServer::Tw => ArknightsDistributor::Longcheng,
        }
    }

    /// Official network configuration endpoint.
    pub fn network_route(&self) -> &'static str {
        match self {
            ArknightsServer::En => {
                "https://ak-conf.arknights.global/config/prod/official/network_config"
            }
            ArknightsServer::Jp => "https://ak-conf.arknights.jp/config/prod/official/network_config",
            ArknightsServer::Kr => "https://ak-conf.arknights.kr/config/prod/official/network_config",
            ArknightsServer::Cn => {
                "https://ak-conf.hypergryph.com/config/prod/official/network_config"
            }
            ArknightsServer::Bili => "https://ak-conf.hypergryph.com/config/prod/b/network_config",
            ArknightsServer::Tw => "https://ak-conf.txwy.tw/config/prod/official/network_config",
        }
    }

    /// Yostar passport endpoint, only present for global servers.
    pub fn passport_route(&self) -> Option<&'static str> {
        match self {
            ArknightsServer::En => Some("https://passport.arknights.global"),
            ArknightsServer::Jp => Some("https://passport.arknights.jp"),
            ArknightsServer::Kr => Some("https://passport.arknights.kr"),
            _ => None,
        }
    }

    /// Language directory used by the community game data repositories.
    pub fn gamedata_language(&self) -> &'static str {
        match self {
            ArknightsServer::En => "en_US",
            ArknightsServer::Jp => "ja_JP",
            ArknightsServer::Kr => "ko_KR",
            ArknightsServer::Cn | ArknightsServer::Bili => "zh_CN",
            ArknightsServer::Tw => "zh_TW",
        }
    }
}

impl fmt::Display for ArknightsServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArknightsServer {
    type Err = ArkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArknightsServer::ALL
            .into_iter()
            .find(|server| server.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| ArkError::UnsupportedServer {
                server: s.to_string(),
                reason: "unknown server slug".to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArknightsDistributor {
    Yostar,
    Hypergryph,
    Bilibili,
    Longcheng,
}

impl ArknightsDistributor {
    /// u8 channel id, `None` where the login channel is not known.
    pub fn channel_id(&self) -> Option<&'static str> {
        match self {
            ArknightsDistributor::Hypergryph => Some("1"),
            ArknightsDistributor::Bilibili => Some("2"),
            ArknightsDistributor::Yostar => Some("3"),
            ArknightsDistributor::Longcheng => None,
        }
    }

    pub fn network_version(&self) -> Option<&'static str> {
        match self {
            ArknightsDistributor::Hypergryph | ArknightsDistributor::Bilibili => Some("5"),
            ArknightsDistributor::Yostar => Some("1"),
            ArknightsDistributor::Longcheng => None,
        }
    }
}

/// Keys of a server's network configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArknightsDomain {
    /// Game server
    Gs,
    /// Authentication server
    As,
    /// u8 token server
    U8,
    /// Game assets
    Hu,
    /// Asset and client versions
    Hv,
    /// Remote config
    Rc,
    /// Announcements
    An,
    /// Login page pre-announcements
    Prean,
    /// Terms of service
    Sl,
    /// Official webpage
    Of,
    PkgAd,
    PkgIos,
}

impl ArknightsDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArknightsDomain::Gs => "gs",
            ArknightsDomain::As => "as",
            ArknightsDomain::U8 => "u8",
            ArknightsDomain::Hu => "hu",
            ArknightsDomain::Hv => "hv",
            ArknightsDomain::Rc => "rc",
            ArknightsDomain::An => "an",
            ArknightsDomain::Prean => "prean",
            ArknightsDomain::Sl => "sl",
            ArknightsDomain::Of => "of",
            ArknightsDomain::PkgAd => "pkgAd",
            ArknightsDomain::PkgIos => "pkgIOS",
        }
    }
}

impl fmt::Display for ArknightsDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
