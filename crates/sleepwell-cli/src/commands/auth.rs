use clap::Subcommand;
use serde::Serialize;
use sleepwell_core::{LoginForm, SignupForm};

use super::{open_tracker, print_json, CliResult};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Sign in and reconcile windows with the mirror
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        password: String,
        /// Identity-provider user id (defaults to the username)
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long, default_value = "")]
        confirm: String,
    },
    /// Forget the signed-in user
    Logout,
    /// Show who is signed in
    Status,
}

#[derive(Serialize)]
struct Status {
    logged_in: bool,
    username: Option<String>,
    user_id: Option<String>,
    sync_state: &'static str,
}

pub async fn run(action: AuthAction) -> CliResult {
    match action {
        AuthAction::Login {
            username,
            password,
            user_id,
        } => {
            LoginForm::new(username.clone(), password).validate()?;
            let user_id = user_id.unwrap_or_else(|| username.clone());
            let tracker = open_tracker()?;
            let outcome = tracker.login(&username, &user_id).await?;
            print_json(&outcome)?;
        }
        AuthAction::Signup {
            username,
            password,
            confirm,
        } => {
            SignupForm::new(username.clone(), password, confirm).validate()?;
            let tracker = open_tracker()?;
            let outcome = tracker.login(&username, &username).await?;
            print_json(&outcome)?;
        }
        AuthAction::Logout => {
            open_tracker()?.logout()?;
            println!("logged out");
        }
        AuthAction::Status => {
            let tracker = open_tracker()?;
            let user_id = tracker.user_id()?;
            print_json(&Status {
                logged_in: user_id.is_some(),
                username: tracker.username()?,
                user_id,
                sync_state: tracker.sync_state()?.as_str(),
            })?;
        }
    }
    Ok(())
}
