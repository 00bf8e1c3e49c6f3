use ballast_core::{LocalStore, MassEntry, MassUnit, NewMassEntry};

use crate::cli::UnitArg;
use crate::commands::common::{parse_logged_at, CliContext};
use crate::error::CliError;

pub struct AddArgs {
    pub mass: f64,
    pub unit: Option<UnitArg>,
    pub note: Option<String>,
    pub tags: Vec<String>,
    pub at: Option<String>,
}

pub async fn run_add(args: AddArgs, ctx: &CliContext) -> Result<(), CliError> {
    let store = ctx.open_store().await?;
    let entry = add_entry(args, &store).await?;
    println!("{}", entry.id);
    Ok(())
}

/// Create an entry, defaulting the unit to the profile preference.
pub async fn add_entry<S: LocalStore>(args: AddArgs, store: &S) -> Result<MassEntry, CliError> {
    let unit = match args.unit {
        Some(unit) => MassUnit::from(unit),
        None => store
            .get_profile()
            .await?
            .map(|profile| profile.unit_preference)
            .unwrap_or_default(),
    };

    let mut input = NewMassEntry::new(args.mass, unit).with_tags(args.tags);
    if let Some(note) = args.note {
        input = input.with_note(note);
    }
    if let Some(at) = args.at.as_deref() {
        input = input.logged_at(parse_logged_at(at)?);
    }

    Ok(store.create_entry(input).await?)
}
