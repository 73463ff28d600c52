//! Sheet CLI
//!
//! Inspects fillable character sheets and attaches calculation actions to
//! them, either to single files or to sheets kept in a data directory.
//! Results are printed to stdout as JSON; logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use form_actions_core::{
    attach_resolved, extract_fields, extract_fields_with_geometry, inspect, list_attached_actions,
    resolve, sample_character_sheet, ActionKind, ActionRecipe, AttachedAction, EngineOptions,
    FormField, Role, RoleMapping, ViewportRect,
};
use serde::Serialize;
use sheet_lifecycle::{SheetManager, SheetStorage, StorageConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "sheet-cli")]
#[command(version, about = "Attach calculation actions to fillable character sheets")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the form fields of a PDF
    Fields {
        pdf: PathBuf,

        /// Include page and rectangle of each field
        #[arg(long)]
        geometry: bool,

        /// Viewport scale used for the converted rectangle
        #[arg(long, default_value = "1.0")]
        scale: f64,
    },

    /// Attach a calculation recipe to a PDF
    Attach {
        pdf: PathBuf,

        #[command(flatten)]
        recipe: RecipeArgs,

        /// Output path (default: <name>.calc.pdf next to the input)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Rewrite the whole file instead of appending an incremental update
        #[arg(long)]
        rewrite: bool,
    },

    /// List the calculation actions stored in a PDF
    Actions { pdf: PathBuf },

    /// Check that a PDF can be edited
    Inspect { pdf: PathBuf },

    /// Write a blank sample character sheet
    Sample { out: PathBuf },

    /// Manage sheets kept in the data directory
    Sheets {
        /// Data directory (default: $SHEETS_DATA_DIR or <temp>/sheets)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[command(subcommand)]
        command: SheetsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SheetsCommand {
    /// Upload a PDF as a new sheet
    Import { pdf: PathBuf },
    /// List stored sheets
    List,
    /// Attach a calculation recipe to a stored sheet
    Attach {
        id: Uuid,
        #[command(flatten)]
        recipe: RecipeArgs,
    },
    /// List the actions of a stored sheet
    Actions {
        id: Uuid,
        /// Re-read calculations from the document, including unknown ones
        #[arg(long)]
        document: bool,
    },
    /// Copy a stored sheet's current bytes to a file
    Export {
        id: Uuid,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Remove a stored sheet
    Delete { id: Uuid },
}

#[derive(clap::Args, Debug)]
struct RecipeArgs {
    /// AbilityModifier, SavingThrowModifier or SkillModifier
    #[arg(short, long)]
    kind: ActionKind,

    /// Role assignment as role=field, e.g. scoreField=STR (repeatable)
    #[arg(short, long = "map", value_parser = parse_assignment)]
    mapping: Vec<(Role, String)>,
}

impl RecipeArgs {
    fn recipe(&self) -> ActionRecipe {
        let mapping: RoleMapping = self.mapping.iter().cloned().collect();
        ActionRecipe::new(self.kind, mapping)
    }
}

fn parse_assignment(s: &str) -> Result<(Role, String), String> {
    let (role, field) = s
        .split_once('=')
        .ok_or_else(|| format!("expected role=field, got {}", s))?;
    Ok((role.trim().parse()?, field.to_string()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldView {
    #[serde(flatten)]
    field: FormField,
    #[serde(skip_serializing_if = "Option::is_none")]
    viewport: Option<ViewportRect>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AttachReport {
    output: PathBuf,
    bytes: usize,
    action: AttachedAction,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn default_output(pdf: &Path) -> PathBuf {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sheet".to_string());
    pdf.with_file_name(format!("{}.calc.pdf", stem))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // stdout carries JSON; logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match args.command {
        Command::Fields { pdf, geometry, scale } => {
            let bytes = read_pdf(&pdf)?;
            let fields = if geometry {
                extract_fields_with_geometry(&bytes)?
            } else {
                extract_fields(&bytes)?
            };
            let views: Vec<FieldView> = fields
                .into_iter()
                .map(|field| FieldView {
                    viewport: field.geometry.map(|g| g.to_viewport(scale)),
                    field,
                })
                .collect();
            print_json(&views)?;
        }

        Command::Attach {
            pdf,
            recipe,
            out,
            rewrite,
        } => {
            let bytes = read_pdf(&pdf)?;
            let recipe = recipe.recipe();
            let options = if rewrite {
                EngineOptions::rewrite()
            } else {
                EngineOptions::default()
            };
            let resolved = resolve(&recipe)?;
            let updated = attach_resolved(&bytes, &resolved, &options)?;
            let output = out.unwrap_or_else(|| default_output(&pdf));
            std::fs::write(&output, &updated)
                .with_context(|| format!("writing {}", output.display()))?;
            print_json(&AttachReport {
                output,
                bytes: updated.len(),
                action: resolved.record,
            })?;
        }

        Command::Actions { pdf } => print_json(&list_attached_actions(&read_pdf(&pdf)?)?)?,

        Command::Inspect { pdf } => print_json(&inspect(&read_pdf(&pdf)?)?)?,

        Command::Sample { out } => {
            let bytes = sample_character_sheet()?;
            std::fs::write(&out, &bytes).with_context(|| format!("writing {}", out.display()))?;
            info!(path = %out.display(), "sample sheet written");
            print_json(&inspect(&bytes)?)?;
        }

        Command::Sheets { data_dir, command } => {
            let config = match data_dir {
                Some(dir) => StorageConfig::new(dir),
                None => StorageConfig::from_env(),
            };
            run_sheets(&config, command).await?;
        }
    }

    Ok(())
}

async fn run_sheets(config: &StorageConfig, command: SheetsCommand) -> Result<()> {
    let manager = SheetManager::from_config(config);
    info!(data_dir = %config.data_dir.display(), "using sheet storage");

    match command {
        SheetsCommand::Import { pdf } => {
            let name = pdf
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let summary = manager.upload(&name, read_pdf(&pdf)?).await?;
            print_json(&summary)?;
        }
        SheetsCommand::List => {
            for id in manager.storage().list().await? {
                manager
                    .restore(id)
                    .await
                    .with_context(|| format!("loading sheet {}", id))?;
            }
            print_json(&manager.list().await)?;
        }
        SheetsCommand::Attach { id, recipe } => {
            manager.restore(id).await?;
            let action = manager.attach(id, &recipe.recipe()).await?;
            print_json(&action)?;
        }
        SheetsCommand::Actions { id, document } => {
            manager.restore(id).await?;
            if document {
                print_json(&manager.document_actions(id).await?)?;
            } else {
                print_json(&manager.list_actions(id).await?)?;
            }
        }
        SheetsCommand::Export { id, out } => {
            manager.restore(id).await?;
            let bytes = manager.export(id).await?;
            std::fs::write(&out, &bytes).with_context(|| format!("writing {}", out.display()))?;
            print_json(&manager.summary(id).await?)?;
        }
        SheetsCommand::Delete { id } => {
            manager.restore(id).await?;
            manager.delete(id).await?;
            print_json(&serde_json::json!({ "deleted": id }))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("scoreField=STR").unwrap(),
            (Role::ScoreField, "STR".to_string())
        );
        assert_eq!(
            parse_assignment("proficiencyField=Check Box 26").unwrap(),
            (Role::ProficiencyField, "Check Box 26".to_string())
        );
        assert!(parse_assignment("STR").is_err());
        assert!(parse_assignment("strength=STR").is_err());
    }

    #[test]
    fn test_attach_args_build_recipe() {
        let args = Args::parse_from([
            "sheet-cli",
            "attach",
            "sheet.pdf",
            "--kind",
            "ability-modifier",
            "--map",
            "scoreField=STR",
            "--map",
            "modifierField=STRmod",
        ]);
        match args.command {
            Command::Attach { recipe, out, rewrite, .. } => {
                assert_eq!(recipe.recipe(), ActionRecipe::ability_modifier("STR", "STRmod"));
                assert_eq!(out, None);
                assert!(!rewrite);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_default_output_sits_next_to_input() {
        assert_eq!(
            default_output(Path::new("/tmp/sheets/hero.pdf")),
            PathBuf::from("/tmp/sheets/hero.calc.pdf")
        );
    }
}
