//! Seed a guild's categories from a YAML file.
//!
//! ```yaml
//! categories:
//!   - name: Roles
//!     emoji: "🎭"
//!     description: Server roles
//!     sort_order: 1
//!   - name: Perks
//! ```
//!
//! The whole file is validated before connecting to the database.
//! Categories whose name already exists in the guild are skipped, so the
//! command can be re-run safely.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use shopbot_api::db::{CategoryRepository, RepositoryError};
use shopbot_api::models::catalog::CategoryFields;
use shopbot_core::{DiscordId, ValidationErrors};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid guild id: {0}")]
    InvalidGuild(String),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Category #{index} ({name}): {errors}")]
    Invalid {
        index: usize,
        name: String,
        errors: ValidationErrors,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedFile {
    categories: Vec<SeedCategory>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedCategory {
    name: String,
    description: Option<String>,
    emoji: Option<String>,
    #[serde(default)]
    sort_order: i32,
}

/// Outcome of a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Parse and validate a seed file.
///
/// # Errors
///
/// Returns `SeedError::Yaml` for malformed YAML and `SeedError::Invalid`
/// for the first category that fails validation.
pub fn parse_categories(content: &str) -> Result<Vec<CategoryFields>, SeedError> {
    let file: SeedFile = serde_yaml::from_str(content)?;
    file.categories
        .into_iter()
        .enumerate()
        .map(|(index, c)| {
            let fields = CategoryFields {
                name: c.name.trim().to_owned(),
                description: c.description,
                emoji: c.emoji,
                sort_order: c.sort_order,
            };
            fields
                .validate()
                .map(|()| fields.clone())
                .map_err(|errors| SeedError::Invalid {
                    index: index + 1,
                    name: fields.name.clone(),
                    errors,
                })
        })
        .collect()
}

/// Insert the categories in `file_path` for `guild`.
///
/// # Errors
///
/// Returns `SeedError` if the file is unreadable or invalid, or the
/// database rejects an insert for a reason other than a duplicate name.
pub async fn categories(guild: &str, file_path: &str) -> Result<SeedReport, SeedError> {
    dotenvy::dotenv().ok();

    let guild_id = DiscordId::parse(guild).map_err(|e| SeedError::InvalidGuild(e.to_string()))?;

    let content = tokio::fs::read_to_string(Path::new(file_path))
        .await
        .map_err(|source| SeedError::Read {
            path: file_path.to_owned(),
            source,
        })?;
    let categories = parse_categories(&content)?;
    info!(count = categories.len(), path = %file_path, "Parsed seed file");

    let database_url =
        super::database_url().ok_or(SeedError::MissingEnvVar("API_DATABASE_URL"))?;
    let pool = shopbot_api::db::create_pool(&database_url).await?;
    let repo = CategoryRepository::new(&pool);

    let mut report = SeedReport::default();
    for fields in &categories {
        match repo.create(&guild_id, fields).await {
            Ok(category) => {
                info!(id = %category.id, name = %category.name, "Inserted category");
                report.inserted += 1;
            }
            Err(RepositoryError::Conflict(_)) => {
                info!(name = %fields.name, "Category exists, skipping");
                report.skipped += 1;
            }
            Err(e) => {
                error!(name = %fields.name, error = %e, "Insert failed");
                return Err(e.into());
            }
        }
    }

    info!(
        inserted = report.inserted,
        skipped = report.skipped,
        "Seeding complete!"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_categories() {
        let yaml = r#"
categories:
  - name: " Roles "
    emoji: "🎭"
    description: Server roles
    sort_order: 2
  - name: Perks
"#;
        let parsed = parse_categories(yaml).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "Roles");
        assert_eq!(parsed[0].sort_order, 2);
        assert_eq!(parsed[1].emoji, None);
        assert_eq!(parsed[1].sort_order, 0);
    }

    #[test]
    fn test_invalid_category_is_reported_by_position() {
        let yaml = "categories:\n  - name: Ok\n  - name: \"\"\n";
        match parse_categories(yaml).unwrap_err() {
            SeedError::Invalid { index, .. } => assert_eq!(index, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let yaml = "categories:\n  - name: Roles\n    colour: red\n";
        assert!(matches!(parse_categories(yaml), Err(SeedError::Yaml(_))));
    }
}
