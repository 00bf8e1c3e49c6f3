use ballast_core::models::{ProfileInput, UserProfile};
use ballast_core::LocalStore;

use crate::cli::UnitArg;
use crate::commands::common::CliContext;
use crate::error::CliError;

pub async fn run_profile_show(as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let store = ctx.open_store().await?;
    let Some(profile) = store.get_profile().await? else {
        if as_json {
            println!("null");
        } else {
            println!("No profile saved yet. Use `ballast profile set`.");
        }
        return Ok(());
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        for line in format_profile_lines(&profile) {
            println!("{line}");
        }
    }
    Ok(())
}

pub struct ProfileArgs {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub unit: Option<UnitArg>,
    pub goal: Option<f64>,
}

impl ProfileArgs {
    pub fn into_input(self) -> Result<ProfileInput, CliError> {
        let input = ProfileInput {
            full_name: self.name,
            email: self.email,
            bio: self.bio,
            unit_preference: self.unit.map(Into::into),
            goal_mass: self.goal,
        };
        if input == ProfileInput::default() {
            return Err(CliError::EmptyChange);
        }
        Ok(input)
    }
}

pub async fn run_profile_set(args: ProfileArgs, ctx: &CliContext) -> Result<(), CliError> {
    let input = args.into_input()?;
    let store = ctx.open_store().await?;
    let profile = store.save_profile(input).await?;
    for line in format_profile_lines(&profile) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_profile_lines(profile: &UserProfile) -> Vec<String> {
    let unset = || "-".to_string();
    vec![
        format!("Name:  {}", profile.full_name.clone().unwrap_or_else(unset)),
        format!("Email: {}", profile.email.clone().unwrap_or_else(unset)),
        format!("Bio:   {}", profile.bio.clone().unwrap_or_else(unset)),
        format!("Unit:  {}", profile.unit_preference),
        format!(
            "Goal:  {}",
            profile.goal_mass.map_or_else(unset, |goal| format!(
                "{goal:.1} {}",
                profile.unit_preference
            ))
        ),
    ]
}
