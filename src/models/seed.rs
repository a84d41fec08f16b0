//! Seed data model structures (monitored competitors).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::competitor::Competitor;
use crate::error::{AppError, Result};

/// Root seed data structure listing the competitors to monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seed {
    pub competitors: Vec<Competitor>,
}

impl Seed {
    /// Load seed data from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate that seed data contains required fields.
    pub fn validate(&self) -> Result<()> {
        if self.competitors.is_empty() {
            return Err(AppError::validation("No competitors defined in seed data"));
        }
        Ok(())
    }
}

fn seeded(
    name: &str,
    website: &str,
    category: &str,
    description: &str,
    priority: u8,
    search_terms: &[&str],
) -> Competitor {
    Competitor {
        name: name.to_string(),
        website: website.to_string(),
        category: category.to_string(),
        description: description.to_string(),
        priority,
        enabled: true,
        search_terms: search_terms.iter().map(|t| t.to_string()).collect(),
        sources: Vec::new(),
    }
}

impl Default for Seed {
    fn default() -> Self {
        Self {
            competitors: vec![
                // Traditional enterprise ERP
                seeded(
                    "NetSuite",
                    "https://www.netsuite.com",
                    "traditional",
                    "Cloud ERP for finance, accounting, and operations",
                    1,
                    &[
                        "NetSuite ERP software new features accounting finance",
                        "NetSuite accounting software updates revenue recognition",
                    ],
                ),
                seeded(
                    "SAP",
                    "https://www.sap.com",
                    "traditional",
                    "Enterprise ERP with finance, supply chain, and HR",
                    1,
                    &[
                        "SAP S/4HANA ERP software finance accounting updates",
                        "SAP ERP system general ledger financial close features",
                    ],
                ),
                seeded(
                    "Workday",
                    "https://www.workday.com",
                    "traditional",
                    "Cloud ERP for finance, HR, and planning",
                    1,
                    &[
                        "Workday Financial Management ERP software accounting",
                        "Workday accounting software financial close planning",
                    ],
                ),
                seeded(
                    "Oracle",
                    "https://www.oracle.com",
                    "traditional",
                    "Cloud ERP for global multi-entity operations",
                    2,
                    &["Oracle Fusion ERP financial management features"],
                ),
                seeded(
                    "Microsoft Dynamics 365",
                    "https://dynamics.microsoft.com",
                    "traditional",
                    "Business applications for finance and operations",
                    2,
                    &["Dynamics 365 Finance ERP accounting software updates"],
                ),
                seeded(
                    "Sage Intacct",
                    "https://www.sageintacct.com",
                    "traditional",
                    "Cloud accounting for mid-market",
                    2,
                    &["Sage Intacct cloud accounting ERP software updates"],
                ),
                // AI-native
                seeded(
                    "Rillet",
                    "https://www.rillet.com",
                    "modern",
                    "AI-native ERP for complex revenue models",
                    1,
                    &["Rillet AI accounting ERP software revenue recognition"],
                ),
                seeded(
                    "DualEntry",
                    "https://www.dualentry.com",
                    "modern",
                    "AI-native ERP with ML-powered automation",
                    1,
                    &["DualEntry AI accounting software ERP automation"],
                ),
                seeded(
                    "Digits",
                    "https://digits.com",
                    "modern",
                    "AI-native accounting built for automation",
                    2,
                    &["Digits AI accounting software financial management"],
                ),
                seeded(
                    "Puzzle",
                    "https://www.puzzle.io",
                    "modern",
                    "AI-powered accounting for startups",
                    2,
                    &[],
                ),
                // Mid-market
                seeded(
                    "Acumatica",
                    "https://www.acumatica.com",
                    "mid-market",
                    "Cloud ERP for growing businesses",
                    3,
                    &[],
                ),
                seeded(
                    "Odoo",
                    "https://www.odoo.com",
                    "mid-market",
                    "Open-source business apps suite",
                    3,
                    &[],
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    #[test]
    fn test_default_seed_is_valid() {
        let seed = Seed::default();
        assert!(seed.validate().is_ok());
        assert!(seed.competitors.iter().any(|c| c.priority == 1));
    }

    #[test]
    fn test_parse_seed_toml() {
        let seed: Seed = toml::from_str(
            r#"
            [[competitors]]
            name = "Rillet"
            website = "https://www.rillet.com"
            category = "modern"
            priority = 1
            search_terms = ["Rillet ERP updates"]

            [[competitors.sources]]
            url = "https://docs.rillet.com/changelog"
            label = "Changelog"
            kind = "release_notes"
            "#,
        )
        .unwrap();

        let rillet = &seed.competitors[0];
        assert!(rillet.enabled);
        assert_eq!(rillet.sources.len(), 1);
        assert_eq!(rillet.sources[0].kind, SourceKind::ReleaseNotes);
    }

    #[test]
    fn test_empty_seed_rejected() {
        let seed = Seed {
            competitors: vec![],
        };
        assert!(seed.validate().is_err());
    }
}
