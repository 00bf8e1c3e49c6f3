use ballast_core::models::EntryPatch;
use ballast_core::{LocalStore, MassEntry, MassUnit};

use crate::cli::UnitArg;
use crate::commands::common::{normalize_entry_identifier, parse_logged_at, resolve_entry, CliContext};
use crate::error::CliError;

pub struct EditArgs {
    pub mass: Option<f64>,
    pub unit: Option<UnitArg>,
    pub note: Option<String>,
    pub clear_note: bool,
    pub tags: Vec<String>,
    pub clear_tags: bool,
    pub at: Option<String>,
}

impl EditArgs {
    pub fn into_patch(self) -> Result<EntryPatch, CliError> {
        let note = if self.clear_note {
            Some(None)
        } else {
            self.note.map(Some)
        };
        let tags = if self.clear_tags {
            Some(Vec::new())
        } else if self.tags.is_empty() {
            None
        } else {
            Some(self.tags)
        };

        let patch = EntryPatch {
            mass: self.mass,
            unit: self.unit.map(MassUnit::from),
            note,
            tags,
            logged_at: self.at.as_deref().map(parse_logged_at).transpose()?,
        };
        if patch.is_empty() {
            return Err(CliError::EmptyChange);
        }
        Ok(patch)
    }
}

pub async fn run_edit(id: &str, args: EditArgs, ctx: &CliContext) -> Result<(), CliError> {
    let store = ctx.open_store().await?;
    let updated = edit_entry(id, args, &store).await?;
    println!("{}", updated.id);
    Ok(())
}

pub async fn edit_entry<S: LocalStore>(
    id: &str,
    args: EditArgs,
    store: &S,
) -> Result<MassEntry, CliError> {
    let normalized_id = normalize_entry_identifier(id)?;
    let patch = args.into_patch()?;
    let entry = resolve_entry(&normalized_id, store).await?;
    Ok(store.update_entry(&entry.id, patch).await?)
}
