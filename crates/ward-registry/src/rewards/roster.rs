//! School roster import: CSV rows in, achievement records out.
//!
//! Expected columns: `Citizen Code, School Year, School, Class, Tier,
//! Notebooks`. Tier cells accept the English tier names or the Vietnamese
//! school terms. Rows that cannot be applied are reported in the outcome,
//! never silently dropped.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::registry::repository::RegistryRepository;
use crate::store::RepositoryError;

use super::domain::{AchievementTier, NewStudentAchievement};
use super::repository::RewardRepository;

#[derive(Debug, thiserror::Error)]
pub enum RosterImportError {
    #[error("failed to read achievement roster: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid roster CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// What an import run did. `unknown_codes` and `invalid_tiers` carry the
/// offending cell values in row order.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct RosterOutcome {
    pub imported: usize,
    pub unknown_codes: Vec<String>,
    pub invalid_tiers: Vec<String>,
}

pub struct AchievementRosterImporter<R, W> {
    registry: Arc<R>,
    rewards: Arc<W>,
}

impl<R, W> AchievementRosterImporter<R, W>
where
    R: RegistryRepository,
    W: RewardRepository,
{
    pub fn new(registry: Arc<R>, rewards: Arc<W>) -> Self {
        Self { registry, rewards }
    }

    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<RosterOutcome, RosterImportError> {
        let file = std::fs::File::open(path)?;
        self.from_reader(file)
    }

    pub fn from_reader<Rd: Read>(&self, reader: Rd) -> Result<RosterOutcome, RosterImportError> {
        let mut outcome = RosterOutcome::default();
        for row in parse_rows(reader)? {
            let tier = match AchievementTier::parse(&row.tier) {
                Some(tier) => tier,
                None => {
                    outcome.invalid_tiers.push(row.tier);
                    continue;
                }
            };
            let citizen = match self.registry.citizen_by_code(row.citizen_code.trim())? {
                Some(citizen) => citizen,
                None => {
                    outcome.unknown_codes.push(row.citizen_code);
                    continue;
                }
            };
            let notebooks_rewarded = row.notebooks();
            self.rewards.insert_achievement(NewStudentAchievement {
                citizen: citizen.id,
                school_year: row.school_year,
                school: row.school,
                class_name: row.class_name,
                tier,
                notebooks_rewarded,
            })?;
            outcome.imported += 1;
        }
        Ok(outcome)
    }
}

fn parse_rows<Rd: Read>(reader: Rd) -> Result<Vec<RosterRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    for row in csv_reader.deserialize::<RosterRow>() {
        rows.push(row?);
    }
    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(rename = "Citizen Code")]
    citizen_code: String,
    #[serde(rename = "School Year")]
    school_year: String,
    #[serde(rename = "School", default)]
    school: String,
    #[serde(rename = "Class", default)]
    class_name: String,
    #[serde(rename = "Tier")]
    tier: String,
    #[serde(rename = "Notebooks", default, deserialize_with = "empty_string_as_none")]
    notebooks: Option<String>,
}

impl RosterRow {
    /// Notebook override; blank or non-numeric cells mean no override.
    fn notebooks(&self) -> u32 {
        self.notebooks
            .as_deref()
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0)
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roster_rows_parse_with_trimmed_cells() {
        let rows = parse_rows(Cursor::new(
            "Citizen Code, School Year, School, Class, Tier, Notebooks\n NK1 , 2023-2024 , Ward Primary , 5A , Gioi , 12 \n",
        ))
        .expect("parse");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].citizen_code, "NK1");
        assert_eq!(rows[0].school_year, "2023-2024");
        assert_eq!(rows[0].notebooks(), 12);
    }

    #[test]
    fn blank_or_garbled_notebook_cells_mean_no_override() {
        let rows = parse_rows(Cursor::new(
            "Citizen Code,School Year,School,Class,Tier,Notebooks\nNK1,2023-2024,Ward Primary,5A,Kha,\nNK2,2023-2024,Ward Primary,5B,Kha,a dozen\n",
        ))
        .expect("parse");
        assert_eq!(rows[0].notebooks(), 0);
        assert_eq!(rows[1].notebooks(), 0);
    }

    #[test]
    fn missing_notebook_column_is_tolerated() {
        let rows = parse_rows(Cursor::new(
            "Citizen Code,School Year,School,Class,Tier\nNK1,2023-2024,Ward Primary,5A,Xuat Sac\n",
        ))
        .expect("parse");
        assert_eq!(rows[0].notebooks(), 0);
        assert_eq!(AchievementTier::parse(&rows[0].tier), Some(AchievementTier::Outstanding));
    }
}
