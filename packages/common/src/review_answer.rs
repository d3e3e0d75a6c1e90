#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Self-assessed recall grade for a theory card review.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAnswer {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "again"))]
    Again,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "hard"))]
    Hard,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "good"))]
    Good,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "easy"))]
    Easy,
}

impl ReviewAnswer {
    /// SM-2 response quality. `Again` has none; it resets the card instead.
    pub fn quality(&self) -> Option<u8> {
        match self {
            Self::Again => None,
            Self::Hard => Some(3),
            Self::Good => Some(4),
            Self::Easy => Some(5),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Again => "again",
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Easy => "easy",
        }
    }
}

impl fmt::Display for ReviewAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
