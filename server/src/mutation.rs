use tracing::{error, info};

use crate::errors::{HandshakeError, PartialMutationError, ProviderStep};
use crate::provider::{AccessCredential, ImageSource, ProfileMutations};
use crate::puppets::PuppetAssignment;

/// What actually changed on the account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationResult {
    pub display_name: String,
    pub avatar_applied: bool,
}

/// Turn the account into its puppet: rename it, then swap the avatar
///
/// The image is fetched before anything is changed so a dead image host leaves
/// the profile untouched. Each call is tried once. If the avatar fails after the
/// rename succeeded the error says so.
#[tracing::instrument(skip_all, fields(ordinal = %assignment.ordinal))]
pub async fn apply_puppet_profile(
    mutations: &dyn ProfileMutations,
    image_source: &dyn ImageSource,
    access: &AccessCredential,
    assignment: &PuppetAssignment,
) -> Result<MutationResult, HandshakeError> {
    let display_name = assignment.display_name();

    let image = image_source
        .fetch()
        .await
        .map_err(|e| HandshakeError::provider(ProviderStep::FetchAvatarImage, e))?;

    mutations
        .set_display_name(access, &display_name)
        .await
        .map_err(|e| HandshakeError::provider(ProviderStep::SetDisplayName, e))?;
    info!(%display_name, "Display name updated");

    if let Err(source) = mutations.set_avatar(access, &image).await {
        error!(error = ?source, %display_name, "Avatar update failed after rename");
        return Err(PartialMutationError {
            display_name,
            source,
        }
        .into());
    }
    info!("Avatar updated");

    Ok(MutationResult {
        display_name,
        avatar_applied: true,
    })
}
