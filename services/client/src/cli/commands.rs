//! services/client/src/cli/commands.rs
//!
//! Handlers for each CLI command. Output goes to the given writer. Passwords
//! are read from the terminal without echo; confirmations from standard input.

use crate::cli::{Cli, Commands, PostArgs};
use crate::error::ClientError;
use crate::state::AppState;
use chrono::Local;
use social_feed_core::domain::{ImageFile, Post, Registration, User};
use social_feed_core::feed::{format_post_date, PostDraft, PostList, ProfileView};
use social_feed_core::image::{
    format_file_size, mime_from_extension, parse_dimension, preset, ImageResizer, ResizeOutcome,
};
use social_feed_core::ports::{Failure, PortError};
use std::io::{self, BufRead, Write};
use tracing::info;

/// Executes one parsed command against the application state.
pub async fn run<W: Write + Send>(cli: Cli, state: &AppState, out: &mut W) -> Result<(), ClientError> {
    match cli.command {
        Commands::Login { email, password } => login(state, &email, password, out).await,
        Commands::Register {
            name,
            username,
            email,
            password,
        } => {
            let password = password_or_prompt(password, |prompt| rpassword::prompt_password(prompt))?;
            let registration = Registration {
                name,
                username,
                email,
                password,
            };
            register(state, &registration, out).await
        }
        Commands::Logout => {
            if !state.session.logout() {
                return Err(ClientError::Internal(format!(
                    "Could not remove the saved session from {}",
                    state.config.storage_path.display()
                )));
            }
            writeln!(out, "Logged out.")?;
            Ok(())
        }
        Commands::Status => status(state, out),
        Commands::Feed => feed(state, out).await,
        Commands::Posts { user_id } => posts(state, user_id, out).await,
        Commands::Profile { username } => profile(state, &username, out).await,
        Commands::Me => {
            let user = require_user(state)?;
            let view = state.feed.profile_by_id(&user.id).await?;
            print_profile(out, &view)
        }
        Commands::Post(args) => post(state, args, out).await,
        Commands::Delete { id, yes } => delete(state, &id, yes, out).await,
        Commands::Bio { text } => {
            require_user(state)?;
            let saved = state.feed.update_bio(&text, None).await?;
            writeln!(out, "Bio updated: {}", saved)?;
            Ok(())
        }
        Commands::Reset => reset(state, out),
    }
}

//=========================================================================================
// Session Commands
//=========================================================================================

async fn login<W: Write>(
    state: &AppState,
    email: &str,
    password: Option<String>,
    out: &mut W,
) -> Result<(), ClientError> {
    let password = password_or_prompt(password, |prompt| rpassword::prompt_password(prompt))?;
    let user = state.session.login(email, &password).await?;
    writeln!(out, "Welcome back, {} (@{})!", user.name, user.username)?;
    Ok(())
}

async fn register<W: Write>(
    state: &AppState,
    registration: &Registration,
    out: &mut W,
) -> Result<(), ClientError> {
    state.session.register(registration).await?;
    writeln!(
        out,
        "Account created. Log in with `feed login --email {}`.",
        registration.email
    )?;
    Ok(())
}

fn status<W: Write>(state: &AppState, out: &mut W) -> Result<(), ClientError> {
    match state.session.current_user() {
        Some(user) => writeln!(out, "Logged in as {} (@{})", user.name, user.username)?,
        None => writeln!(out, "Not logged in.")?,
    }
    Ok(())
}

fn reset<W: Write>(state: &AppState, out: &mut W) -> Result<(), ClientError> {
    // Whatever logout leaves behind, clear removes.
    state.session.logout();
    if !state.storage.clear() {
        return Err(ClientError::Internal(format!(
            "Could not clear local data at {}",
            state.config.storage_path.display()
        )));
    }
    info!("Local data wiped");
    writeln!(out, "Local data cleared.")?;
    Ok(())
}

//=========================================================================================
// Feed and Profile Commands
//=========================================================================================

async fn feed<W: Write>(state: &AppState, out: &mut W) -> Result<(), ClientError> {
    require_user(state)?;
    let list = state.feed.home().await?;
    print_posts(out, &list)
}

async fn posts<W: Write>(
    state: &AppState,
    user_id: Option<String>,
    out: &mut W,
) -> Result<(), ClientError> {
    let user = require_user(state)?;
    let user_id = user_id.unwrap_or(user.id);
    let view = state.feed.profile_by_id(&user_id).await?;
    print_posts(out, &view.posts)
}

async fn profile<W: Write>(state: &AppState, username: &str, out: &mut W) -> Result<(), ClientError> {
    require_user(state)?;
    let view = state.feed.profile_by_username(username).await?;
    print_profile(out, &view)
}

async fn delete<W: Write>(state: &AppState, id: &str, yes: bool, out: &mut W) -> Result<(), ClientError> {
    require_user(state)?;
    let mut list = state.feed.home().await?;
    let deleted = state
        .feed
        .delete_post(&mut list, id, |prompt| yes || confirm_on_stdin(prompt))
        .await?;
    if deleted {
        writeln!(out, "Post deleted.")?;
    } else {
        writeln!(out, "Cancelled.")?;
    }
    Ok(())
}

//=========================================================================================
// Post Creation
//=========================================================================================

async fn post<W: Write>(state: &AppState, args: PostArgs, out: &mut W) -> Result<(), ClientError> {
    require_user(state)?;

    let data = tokio::fs::read(&args.image).await?;
    let name = args
        .image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let mime = mime_from_extension(&name).unwrap_or("application/octet-stream");
    let file = ImageFile::new(name, mime, data);

    let resizer = ImageResizer::open(state.codec.clone(), file)
        .await
        .map_err(image_error)?;

    let image = if args.original {
        resizer.use_original()
    } else {
        if let Some(name) = &args.preset {
            let preset = preset(name).ok_or_else(|| {
                Failure::new(format!(
                    "Unknown preset '{}'. Choose Small, Medium, Large or HD.",
                    name
                ))
            })?;
            resizer.apply_preset(preset);
        }
        if let Some(width) = &args.width {
            resizer.set_target_width(parse_dimension(width));
        }
        if let Some(height) = &args.height {
            resizer.set_target_height(parse_dimension(height));
        }
        if let Some(quality) = args.quality {
            resizer.set_quality(quality);
        }

        match resizer.refresh().await.map_err(image_error)? {
            ResizeOutcome::Committed { .. } => {}
            ResizeOutcome::Skipped => {
                return Err(Failure::new("Width and height must be greater than zero").into())
            }
            ResizeOutcome::Superseded { ticket } => {
                return Err(ClientError::Internal(format!(
                    "Resize {} was superseded unexpectedly",
                    ticket
                )))
            }
        }

        resizer.with_job(|job| -> io::Result<()> {
            if let (Some(original), Some(resized)) = (job.original(), job.resized()) {
                writeln!(
                    out,
                    "Resized {}x{} to {}x{} at quality {:.1} ({} to {})",
                    original.width,
                    original.height,
                    resized.width,
                    resized.height,
                    resized.quality,
                    format_file_size(job.source().size()),
                    format_file_size(resized.data.len() as u64),
                )?;
            }
            Ok(())
        })?;

        resizer
            .use_resized()
            .ok_or_else(|| ClientError::Internal("Resized image is missing".to_string()))?
    };

    let mut draft = PostDraft::new(args.content);
    draft.attach_image(image);

    let mut list = PostList::new(Vec::new());
    let post = state.feed.create_post(&mut list, &draft).await?;
    writeln!(out, "Post created.")?;
    print_post(out, &post)
}

/// Image problems the user can fix are reported as plain messages.
fn image_error(e: PortError) -> ClientError {
    match e {
        PortError::Validation(reason) => Failure::new(reason).into(),
        PortError::Image(detail) => Failure::new(format!("Could not read the image: {}", detail)).into(),
        other => other.into(),
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

fn require_user(state: &AppState) -> Result<User, ClientError> {
    state
        .session
        .current_user()
        .ok_or_else(|| Failure::new("You are not logged in. Run `feed login` first.").into())
}

const PASSWORD_PROMPT: &str = "Password: ";

/// Uses the password given on the command line, otherwise asks `prompt`
/// (the no-echo terminal reader outside tests).
fn password_or_prompt<P>(password: Option<String>, prompt: P) -> Result<String, ClientError>
where
    P: FnOnce(&str) -> io::Result<String>,
{
    match password {
        Some(password) => Ok(password),
        None => Ok(prompt(PASSWORD_PROMPT)?),
    }
}

fn confirm_on_stdin(prompt: &str) -> bool {
    eprint!("{} [y/N] ", prompt);
    if io::stderr().flush().is_err() {
        return false;
    }
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn print_post<W: Write>(out: &mut W, post: &Post) -> Result<(), ClientError> {
    writeln!(
        out,
        "{} (@{}) · {}",
        post.author.name,
        post.author.username,
        format_post_date(&post.created_at.with_timezone(&Local))
    )?;
    writeln!(out, "{}", post.content)?;
    if let Some(url) = &post.image_url {
        writeln!(out, "  image: {}", url)?;
    }
    writeln!(out, "  id: {}", post.id)?;
    writeln!(out)?;
    Ok(())
}

fn print_posts<W: Write>(out: &mut W, list: &PostList) -> Result<(), ClientError> {
    if list.is_empty() {
        writeln!(out, "No posts yet.")?;
        return Ok(());
    }
    for post in list.posts() {
        print_post(out, post)?;
    }
    Ok(())
}

fn print_profile<W: Write>(out: &mut W, view: &ProfileView) -> Result<(), ClientError> {
    writeln!(out, "{} (@{})", view.user.name, view.user.username)?;
    match view.user.bio.as_deref().filter(|bio| !bio.trim().is_empty()) {
        Some(bio) => writeln!(out, "{}", bio)?,
        None if view.is_own => writeln!(out, "No bio yet. Add one with `feed bio`.")?,
        None => writeln!(out, "No bio yet.")?,
    }
    writeln!(out, "{} post(s)", view.posts.len())?;
    writeln!(out)?;
    print_posts(out, &view.posts)
}
