use serde::{Deserialize, Serialize};

/// How an edited document is written back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveMode {
    /// Original bytes followed by an appended update section.
    #[default]
    Incremental,
    /// Full rewrite of every object.
    Rewrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    pub save_mode: SaveMode,
    /// Set `NeedAppearances` on the AcroForm so viewers regenerate field appearances.
    pub need_appearances: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            save_mode: SaveMode::Incremental,
            need_appearances: true,
        }
    }
}

impl EngineOptions {
    pub fn rewrite() -> Self {
        Self {
            save_mode: SaveMode::Rewrite,
            ..Self::default()
        }
    }
}
