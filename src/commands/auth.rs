use super::AppContext;
use crate::auth::RefreshOutcome;
use crate::cli::commands::AuthCommands;
use crate::clients::DodoIsClient;
use anyhow::{Result, bail};
use log::info;

pub async fn auth_command(context: &AppContext, args: AuthCommands) -> Result<()> {
    info!("Starting auth");

    let tokens = DodoIsClient::token_manager(context.secrets.clone(), context.transport.clone())?;
    if args.check {
        println!("✓ Dodo IS credentials present in {}", context.secrets_path.display());
        return Ok(());
    }

    match tokens.refresh().await? {
        RefreshOutcome::Refreshed => {
            println!(
                "✓ Dodo IS token refreshed; rotated refresh token saved to {}",
                context.secrets_path.display()
            );
            Ok(())
        }
        RefreshOutcome::PersistFailed(message) => {
            bail!(
                "Dodo IS token refreshed but the rotated refresh token was not saved ({message}). \
                 The stored REFRESH_TOKEN is no longer valid."
            )
        }
    }
}
