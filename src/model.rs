use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentinel id of the synthetic category holding features found outside any group.
pub const UNCATEGORIZED_ID: &str = "__uncategorized__";
pub const UNCATEGORIZED_HEADING: &str = "Features";
pub const DEFAULT_GROUP_ICON: &str = "admin-plugins";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
    ProPlus,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Pro, Tier::ProPlus];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::ProPlus => "proplus",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValue(pub String);

impl fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownValue {}

impl FromStr for Tier {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            "proplus" => Ok(Tier::ProPlus),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IconStyle {
    Chevron,
    #[default]
    PlusMinus,
}

impl FromStr for IconStyle {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chevron" => Ok(IconStyle::Chevron),
            "plus-minus" => Ok(IconStyle::PlusMinus),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingTag {
    #[default]
    H2,
    H3,
}

impl FromStr for HeadingTag {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h2" => Ok(HeadingTag::H2),
            "h3" => Ok(HeadingTag::H3),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Feature {
    pub label: String,
    pub tier: Tier,
    pub has_description: bool,
    pub description: String,
    pub show_free_badge: bool,
    pub icon_style: IconStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub heading: String,
    pub subheading: String,
    pub icon: String,
    pub icon_color: String,
    pub icon_bg_color: String,
    pub heading_tag: HeadingTag,
    pub show_feature_count: bool,
    pub feature_count: u64,
    pub features: Vec<Feature>,
}

impl Category {
    pub fn uncategorized() -> Self {
        Category {
            id: UNCATEGORIZED_ID.to_string(),
            heading: UNCATEGORIZED_HEADING.to_string(),
            subheading: String::new(),
            icon: DEFAULT_GROUP_ICON.to_string(),
            icon_color: String::new(),
            icon_bg_color: String::new(),
            heading_tag: HeadingTag::default(),
            show_feature_count: false,
            feature_count: 0,
            features: Vec::new(),
        }
    }

    pub fn is_uncategorized(&self) -> bool {
        self.id == UNCATEGORIZED_ID
    }
}

/// Per-tier feature counts. Serializes as `{"free": n, "pro": n, "proplus": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TierCounts {
    pub free: usize,
    pub pro: usize,
    pub proplus: usize,
}

impl TierCounts {
    pub fn get(&self, tier: Tier) -> usize {
        match tier {
            Tier::Free => self.free,
            Tier::Pro => self.pro,
            Tier::ProPlus => self.proplus,
        }
    }

    pub fn increment(&mut self, tier: Tier) {
        match tier {
            Tier::Free => self.free += 1,
            Tier::Pro => self.pro += 1,
            Tier::ProPlus => self.proplus += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.free + self.pro + self.proplus
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub categories: Vec<Category>,
    pub total_features: usize,
    pub features_by_tier: TierCounts,
}
