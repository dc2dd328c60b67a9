use serde::{Deserialize, Serialize};
use anyhow::Result;
use std::path::PathBuf;

pub const VENUES_PATH: &str = "config/venues.toml";

/// 首页文本中出现 `pattern`（不区分大小写）即认定为 `name`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VenueRule {
    pub pattern: String,
    pub name: String,
}

/// 文件名包含 `contains` 时推断期刊
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilenameHint {
    pub contains: String,
    pub name: String,
}

/// 源文件名包含 `source_contains` 时附带读取的勘误PDF
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorrectionRule {
    pub source_contains: String,
    pub correction_file: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VenueConfig {
    pub venues: Vec<VenueRule>,
    pub filename_hints: Vec<FilenameHint>,
    pub corrections: Vec<CorrectionRule>,
}

impl VenueConfig {
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from(VENUES_PATH);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: VenueConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn correction_for(&self, pdf_file: &str) -> Option<&str> {
        self.corrections
            .iter()
            .filter(|rule| !rule.source_contains.is_empty())
            .find(|rule| pdf_file.contains(&rule.source_contains))
            .map(|rule| rule.correction_file.as_str())
    }
}

fn venue(pattern: &str, name: &str) -> VenueRule {
    VenueRule {
        pattern: pattern.to_string(),
        name: name.to_string(),
    }
}

fn hint(contains: &str, name: &str) -> FilenameHint {
    FilenameHint {
        contains: contains.to_string(),
        name: name.to_string(),
    }
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            venues: vec![
                venue("plos one", "PLOS ONE"),
                venue("scientific reports", "Scientific Reports"),
                venue("mathematical biosciences", "Mathematical Biosciences and Engineering"),
                venue("human vaccines", "Human Vaccines & Immunotherapeutics"),
                venue("chaos, solitons", "Chaos, Solitons & Fractals"),
                venue("mathematics and computers in simulation", "Mathematics and Computers in Simulation"),
            ],
            filename_hints: vec![
                hint("journal.pone", "PLOS ONE"),
                hint("s41598", "Scientific Reports"),
                hint("10.3934_mbe", "Mathematical Biosciences and Engineering"),
            ],
            corrections: vec![CorrectionRule {
                source_contains: "journal.pone.0249262".to_string(),
                correction_file: "journal.pone.0253685_correction.pdf".to_string(),
            }],
        }
    }
}
