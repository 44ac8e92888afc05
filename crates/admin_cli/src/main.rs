use std::{error::Error, io::Write};

use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{Engine, Role};
use migration::MigratorTrait;
use sea_orm::{ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter};

#[derive(Parser, Debug)]
#[command(name = "murale_admin")]
#[command(about = "Admin utilities for murale (bootstrap users/plans/stickers)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./murale.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Plan(Plan),
    Sticker(Sticker),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Create a verified admin account (password prompted).
    CreateAdmin(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
}

#[derive(Args, Debug)]
struct Plan {
    #[command(subcommand)]
    command: PlanCommand,
}

#[derive(Subcommand, Debug)]
enum PlanCommand {
    Create(PlanCreateArgs),
    /// Replace a plan's sticker set and reconcile all subscribers.
    SetStickers(PlanSetStickersArgs),
}

#[derive(Args, Debug)]
struct PlanCreateArgs {
    /// Acting admin username.
    #[arg(long)]
    admin: String,
    #[arg(long)]
    name: String,
    #[arg(long, default_value_t = 0)]
    price_cents: i64,
    #[arg(long, default_value_t = 0)]
    display_order: i32,
}

#[derive(Args, Debug)]
struct PlanSetStickersArgs {
    /// Acting admin username.
    #[arg(long)]
    admin: String,
    /// Plan name (case-insensitive).
    #[arg(long)]
    plan: String,
    /// Comma-separated sticker ids; empty clears the set.
    #[arg(long, value_delimiter = ',')]
    stickers: Vec<String>,
}

#[derive(Args, Debug)]
struct Sticker {
    #[command(subcommand)]
    command: StickerCommand,
}

#[derive(Subcommand, Debug)]
enum StickerCommand {
    /// Grant an individual sticker to a user.
    Grant(StickerGrantArgs),
}

#[derive(Args, Debug)]
struct StickerGrantArgs {
    /// Acting admin username.
    #[arg(long)]
    admin: String,
    #[arg(long)]
    username: String,
    #[arg(long)]
    sticker: String,
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

fn prompt_password_twice() -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = std::io::stderr();
    for _ in 0..3 {
        let p1 = prompt_password("Password: ")?;
        if p1.is_empty() {
            execute!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print("Password must not be empty.\r\n")
            )?;
            continue;
        }

        let p2 = prompt_password("Confirm password: ")?;
        if p1 == p2 {
            return Ok(p1);
        }

        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print("Passwords do not match. Try again.\r\n")
        )?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn require_user_id(
    db: &DatabaseConnection,
    username: &str,
) -> Result<String, Box<dyn Error + Send + Sync>> {
    let user = engine::users::Entity::find()
        .filter(engine::users::Column::Username.eq(username.to_string()))
        .one(db)
        .await?;
    match user {
        Some(user) => Ok(user.id),
        None => Err(format!("user not found: {username}").into()),
    }
}

async fn require_plan_id(
    engine: &Engine,
    name: &str,
) -> Result<uuid::Uuid, Box<dyn Error + Send + Sync>> {
    let plans = engine.list_plans().await?;
    plans
        .into_iter()
        .find(|plan| plan.name.eq_ignore_ascii_case(name))
        .map(|plan| plan.id)
        .ok_or_else(|| format!("plan not found: {name}").into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db.clone()).build().await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::CreateAdmin(args),
        }) => {
            let password = prompt_password_twice()?;
            let user = engine
                .create_verified_user(&args.username, &args.email, &password, Role::Admin)
                .await?;
            println!("created admin user: {} ({})", user.username, user.id);
        }
        Command::Plan(Plan {
            command: PlanCommand::Create(args),
        }) => {
            let admin_id = require_user_id(&db, &args.admin).await?;
            let plan_id = engine
                .create_plan(&args.name, args.price_cents, args.display_order, &admin_id)
                .await?;
            println!("created plan: {} ({plan_id})", args.name);
        }
        Command::Plan(Plan {
            command: PlanCommand::SetStickers(args),
        }) => {
            let admin_id = require_user_id(&db, &args.admin).await?;
            let plan_id = require_plan_id(&engine, &args.plan).await?;
            let report = engine
                .redefine_plan_stickers(plan_id, &args.stickers, &admin_id)
                .await?;
            println!(
                "plan {} updated: {} subscribers reconciled, {} failed",
                args.plan, report.affected_users, report.failed_users
            );
        }
        Command::Sticker(Sticker {
            command: StickerCommand::Grant(args),
        }) => {
            let admin_id = require_user_id(&db, &args.admin).await?;
            let target_id = require_user_id(&db, &args.username).await?;
            engine
                .grant_user_sticker(&target_id, &args.sticker, &admin_id)
                .await?;
            println!("granted sticker {} to {}", args.sticker, args.username);
        }
    }

    Ok(())
}
