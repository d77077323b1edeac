//! Account commands.

use crafted_chapter_storefront::{Access, ClientConfig};
use crafted_chapter_storefront::navigation::routes;
use secrecy::SecretString;

use super::{CliError, open};

/// Sign in and report the synced cart.
///
/// # Errors
///
/// Returns an error if sign-in fails.
pub async fn login(config: ClientConfig, email: &str, password: &SecretString) -> Result<(), CliError> {
    let (storefront, _running) = open(config, routes::LOGIN).await?;
    storefront.sign_in(email, password).await?;
    println!(
        "Signed in as {email}. Cart: {} line(s).",
        storefront.cart().count()
    );
    Ok(())
}

/// Create an account and sign in.
///
/// # Errors
///
/// Returns an error if registration fails.
pub async fn register(
    config: ClientConfig,
    name: &str,
    email: &str,
    password: &SecretString,
) -> Result<(), CliError> {
    let (storefront, _running) = open(config, routes::REGISTER).await?;
    storefront.sign_up(name, email, password).await?;
    println!("Welcome, {name}. You are signed in as {email}.");
    Ok(())
}

/// Sign out.
///
/// # Errors
///
/// Returns an error if the stored token cannot be removed.
pub async fn logout(config: ClientConfig) -> Result<(), CliError> {
    let (storefront, _running) = open(config, routes::HOME).await?;
    if !storefront.session().is_authenticated() {
        println!("Not signed in.");
        return Ok(());
    }
    storefront.sign_out().await?;
    println!("Signed out.");
    Ok(())
}

/// Print the signed-in account.
///
/// # Errors
///
/// Returns an error if there is no session or the profile cannot be loaded.
pub async fn profile(config: ClientConfig) -> Result<(), CliError> {
    let (storefront, _running) = open(config, routes::PROFILE).await?;
    if storefront.guard().navigate(routes::PROFILE) != Access::Granted {
        return Err(CliError::Usage("Please login to continue".to_string()));
    }

    let profile = storefront.profile().await?;
    println!("Name:   {}", profile.name);
    println!("Email:  {}", profile.email);
    if let Some(role) = &profile.role {
        println!("Role:   {role}");
    }
    if let Some(created_at) = profile.created_at {
        println!("Member since {}", created_at.format("%B %Y"));
    }
    Ok(())
}
