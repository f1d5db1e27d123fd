use std::env;

use homestead_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            api_url,
            user_id,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            api_url,
            user_id,
            no_activate,
        ),
    }
}

#[allow(clippy::needless_pass_by_value)]
pub fn run_config_init(
    profile_name: Option<&str>,
    api_url: Option<String>,
    user_id: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load()?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(
        &existing_profile,
        normalize_text_option(api_url)
            .or_else(|| normalize_text_option(env::var("HOMESTEAD_API_URL").ok())),
        normalize_text_option(user_id)
            .or_else(|| normalize_text_option(env::var("HOMESTEAD_USER_ID").ok())),
    )?;
    *config.profile_mut_or_default(&profile_name) = merged.clone();

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save()?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let mut missing_fields = Vec::new();
    if merged.api_base_url().is_none() {
        missing_fields.push("api_url");
    }
    if merged.user_id().is_none() {
        missing_fields.push("user_id");
    }
    if missing_fields.is_empty() {
        println!("Profile '{profile_name}' is ready. Set HOMESTEAD_ACCESS_TOKEN to authenticate.");
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

/// Overlay explicitly given values on an existing profile and validate it.
pub fn merge_profile(
    existing: &CliProfile,
    api_url: Option<String>,
    user_id: Option<String>,
) -> Result<CliProfile, CliError> {
    let profile = CliProfile {
        api_base_url: api_url
            .or_else(|| existing.api_base_url())
            .map(|url| url.trim_end_matches('/').to_string()),
        user_id: user_id.or_else(|| existing.user_id()),
    };

    if let Some(url) = profile.api_base_url.as_deref() {
        if !is_http_url(url) {
            return Err(CliError::Config(
                "api_url must include http:// or https://".to_string(),
            ));
        }
    }
    Ok(profile)
}
