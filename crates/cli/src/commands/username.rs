//! Username record commands.
//!
//! # Usage
//!
//! ```bash
//! # Is the name free?
//! neoays-cli username check alice
//!
//! # Who owns it?
//! neoays-cli username show alice
//!
//! # Point it at the account that finished signup (repairs a failed relink)
//! neoays-cli username reassign alice --owner u9
//! ```

use neoays_core::{Availability, Fields, IdentityId, Record, Username, UsernameRecord};
use neoays_signup::store::WriteMode;

use super::{CommandError, Target, render};

/// Report whether `name` is available.
///
/// # Errors
///
/// Returns an error if the name is invalid or the store cannot be read.
pub async fn check(target: &Target<'_>, name: &str) -> Result<String, CommandError> {
    let username = Username::parse(name)?;
    let path = target.paths.username(&username);
    let availability = Availability::from_exists(target.store.exists(&path).await?);

    Ok(match availability {
        Availability::Taken => format!("{username}: taken"),
        _ => format!("{username}: available"),
    })
}

/// Show the username record for `name`.
///
/// # Errors
///
/// Returns `CommandError::NotFound` if the name is not reserved.
pub async fn show(target: &Target<'_>, name: &str) -> Result<String, CommandError> {
    let username = Username::parse(name)?;
    let (_, fields) = load(target, &username).await?;
    Ok(render(&fields))
}

/// Re-point the username record for `name` at `owner`.
///
/// Only the owner field is written; other fields are kept.
///
/// # Errors
///
/// Returns `CommandError::NotFound` if the name is not reserved.
pub async fn reassign(target: &Target<'_>, name: &str, owner: &str) -> Result<String, CommandError> {
    let username = Username::parse(name)?;
    let owner = IdentityId::parse(owner)?;
    let (record, _) = load(target, &username).await?;

    if record.owner_id == owner {
        return Ok(format!("{username}: already owned by {owner}"));
    }

    let fields = UsernameRecord {
        owner_id: owner.clone(),
    }
    .to_fields()?;
    target
        .store
        .write(&target.paths.username(&username), fields, WriteMode::Merge)
        .await?;

    tracing::info!(
        username = %username,
        previous_owner = %record.owner_id,
        owner = %owner,
        "Reassigned username"
    );
    Ok(format!("{username}: owner {} -> {owner}", record.owner_id))
}

async fn load(
    target: &Target<'_>,
    username: &Username,
) -> Result<(UsernameRecord, Fields), CommandError> {
    let path = target.paths.username(username);
    let fields = target
        .store
        .read(&path)
        .await?
        .ok_or_else(|| CommandError::NotFound(path.to_string()))?;
    Ok((UsernameRecord::from_fields(fields.clone())?, fields))
}
