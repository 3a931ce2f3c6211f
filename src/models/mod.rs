//! Model aliases and resolution to Bedrock model ids.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::PalaverError;

/// Short model names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ModelAlias {
    #[strum(serialize = "claude3-sonnet")]
    #[serde(rename = "claude3-sonnet")]
    Claude3Sonnet,
    #[strum(serialize = "claude3-haiku")]
    #[serde(rename = "claude3-haiku")]
    Claude3Haiku,
}

impl ModelAlias {
    /// The Bedrock model id this alias stands for.
    pub fn model_id(&self) -> &'static str {
        match self {
            Self::Claude3Sonnet => "anthropic.claude-3-sonnet-20240229-v1:0",
            Self::Claude3Haiku => "anthropic.claude-3-haiku-20240307-v1:0",
        }
    }
}

impl Default for ModelAlias {
    fn default() -> Self {
        Self::Claude3Sonnet
    }
}

/// A resolved model: either a known alias or a verbatim Bedrock model id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSelection {
    Alias(ModelAlias),
    Id(String),
}

impl ModelSelection {
    pub fn model_id(&self) -> &str {
        match self {
            Self::Alias(alias) => alias.model_id(),
            Self::Id(id) => id,
        }
    }
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self::Alias(ModelAlias::default())
    }
}

impl FromStr for ModelSelection {
    type Err = PalaverError;

    /// Accepts an alias (`claude3-haiku`) or a full model id
    /// (`anthropic.claude-3-haiku-20240307-v1:0`), which always contains a `.`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(alias) = ModelAlias::from_str(s) {
            return Ok(Self::Alias(alias));
        }
        if s.contains('.') {
            return Ok(Self::Id(s.to_string()));
        }
        let known: Vec<String> = ModelAlias::iter().map(|a| a.to_string()).collect();
        Err(PalaverError::Configuration(format!(
            "Invalid model: {s} (expected one of {} or a full model id)",
            known.join(", ")
        )))
    }
}

impl std::fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alias(alias) => write!(f, "{alias}"),
            Self::Id(id) => f.write_str(id),
        }
    }
}
