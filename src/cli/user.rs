//! User command implementation

use anyhow::Result;
use clap::Subcommand;

use super::Context;

#[derive(Subcommand)]
pub enum UserAction {
    /// Create a user record (no-op if it exists)
    Add {
        user: String,
        /// Display name stored on the record
        #[arg(long)]
        name: Option<String>,
    },
}

pub fn user_command(ctx: &Context, action: UserAction) -> Result<()> {
    match action {
        UserAction::Add { user, name } => {
            let created = ctx.manager()?.ensure_user(&user, name.as_deref())?;
            let result = serde_json::json!({ "user": user, "created": created });
            ctx.emit(&result, |_| {
                if created {
                    println!("Created user {}", user);
                } else {
                    println!("User {} already exists", user);
                }
            })
        }
    }
}
