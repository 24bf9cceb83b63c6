//! services/client/src/cli/mod.rs
//!
//! The command-line surface of the client, defined with `clap` derive.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub use commands::run;

/// A command-line client for the social feed.
#[derive(Debug, Parser)]
#[command(name = "feed", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in and remember the session on this machine.
    Login {
        #[arg(long)]
        email: String,
        /// Read from standard input when omitted.
        #[arg(long, env = "FEED_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create a new account.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// Read from standard input when omitted.
        #[arg(long, env = "FEED_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session.
    Logout,
    /// Show who is logged in.
    Status,
    /// Show the home feed.
    Feed,
    /// List a user's posts by id. Defaults to your own.
    Posts {
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Show a user's public profile.
    Profile { username: String },
    /// Show your own profile.
    Me,
    /// Publish a post with an image.
    Post(PostArgs),
    /// Delete one of your posts.
    Delete {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Update your bio.
    Bio { text: String },
    /// Wipe all locally stored data.
    Reset,
}

#[derive(Debug, Args)]
pub struct PostArgs {
    #[arg(long)]
    pub content: String,
    #[arg(long)]
    pub image: PathBuf,
    /// One of Small, Medium, Large, HD.
    #[arg(long, conflicts_with_all = ["width", "height", "original"])]
    pub preset: Option<String>,
    /// Target width; the height follows the aspect ratio.
    #[arg(long, conflicts_with_all = ["height", "original"])]
    pub width: Option<String>,
    /// Target height; the width follows the aspect ratio.
    #[arg(long, conflicts_with = "original")]
    pub height: Option<String>,
    /// JPEG quality between 0.1 and 1.0.
    #[arg(long, conflicts_with = "original")]
    pub quality: Option<f32>,
    /// Upload the file as-is instead of re-encoding it.
    #[arg(long)]
    pub original: bool,
}
