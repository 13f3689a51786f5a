//! Profile record commands.
//!
//! # Usage
//!
//! ```bash
//! neoays-cli profile show u9
//!
//! # Write the profile for an account whose signup stopped after relinking
//! neoays-cli profile write u9 --username alice --email a@b.com --mobile 555-0100
//! ```

use neoays_core::{
    Email, IdentityId, MobileNumber, ProfileRecord, Record, Username, UsernameRecord,
};
use neoays_signup::store::WriteMode;

use super::{CommandError, Target, render};

/// Show the profile of `owner`.
///
/// # Errors
///
/// Returns `CommandError::NotFound` if the identity has no profile.
pub async fn show(target: &Target<'_>, owner: &str) -> Result<String, CommandError> {
    let owner = IdentityId::parse(owner)?;
    let path = target.paths.profile(&owner);
    let fields = target
        .store
        .read(&path)
        .await?
        .ok_or_else(|| CommandError::NotFound(path.to_string()))?;
    ProfileRecord::from_fields(fields.clone())?;
    Ok(render(&fields))
}

/// Write (replace) the profile of `owner`.
///
/// Refuses unless the username record exists and is owned by `owner`, so a
/// profile never points at someone else's name.
///
/// # Errors
///
/// Returns an error if an argument is invalid, the username is not owned by
/// `owner`, or the store call fails.
pub async fn write(
    target: &Target<'_>,
    owner: &str,
    username: &str,
    email: &str,
    mobile_number: &str,
) -> Result<String, CommandError> {
    let owner = IdentityId::parse(owner)?;
    let record = ProfileRecord {
        username: Username::parse(username)?,
        email: Email::parse(email).map_err(|e| CommandError::Field {
            field: "email",
            message: e.to_string(),
        })?,
        mobile_number: MobileNumber::parse(mobile_number).map_err(|e| CommandError::Field {
            field: "mobile",
            message: e.to_string(),
        })?,
    };

    let username_path = target.paths.username(&record.username);
    let claim = target
        .store
        .read(&username_path)
        .await?
        .ok_or_else(|| CommandError::NotFound(username_path.to_string()))?;
    let claim = UsernameRecord::from_fields(claim)?;
    if claim.owner_id != owner {
        return Err(CommandError::Field {
            field: "username",
            message: format!("{} is owned by {}", record.username, claim.owner_id),
        });
    }

    target
        .store
        .write(
            &target.paths.profile(&owner),
            record.to_fields()?,
            WriteMode::Replace,
        )
        .await?;

    tracing::info!(owner = %owner, username = %record.username, "Wrote profile");
    Ok(format!("{owner}: profile written for @{}", record.username))
}
