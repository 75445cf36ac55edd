use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kiwi_core::{Cmp, FieldKind, Row, Value, validate_identifier};
use kiwi_sqlite::{Entity, create_table_sql};
use rusqlite::Connection;
use serde_json::json;

mod logging;
mod user;

use user::{Relations, User, Users};

/// Output format for result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "kiwi")]
#[command(about = "Manage users stored in a SQLite database")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v shows every executed statement).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the users table if it does not exist.
    Init(DbArgs),
    /// Create a user.
    Add(AddArgs),
    /// List users, optionally filtered.
    List(ListArgs),
    /// Show one user with its related users.
    Show(ShowArgs),
    /// Change fields of an existing user.
    Set(SetArgs),
    /// Delete a user.
    Remove(RemoveArgs),
    /// Walk through every mapper operation against the users table.
    Demo(DemoArgs),
}

#[derive(Debug, Args)]
struct DbArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
}

#[derive(Debug, Args)]
struct AddArgs {
    #[command(flatten)]
    db: DbArgs,
    #[arg(long)]
    username: String,
    #[arg(long)]
    firstname: Option<String>,
    #[arg(long)]
    lastname: Option<String>,
    /// Key of the user's friend.
    #[arg(long)]
    friend_id: Option<i64>,
    /// Key of the acting user, recorded as creator.
    #[arg(long)]
    actor: Option<i64>,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: OutputFormat,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[command(flatten)]
    db: DbArgs,
    /// Only users whose friend has this key.
    #[arg(long)]
    friend_id: Option<i64>,
    /// Only users whose username matches this LIKE pattern.
    #[arg(long)]
    username_like: Option<String>,
    /// Column to sort by.
    #[arg(long)]
    order_by: Option<String>,
    /// Sort descending.
    #[arg(long)]
    desc: bool,
    /// Maximum number of users to return.
    #[arg(long)]
    limit: Option<u64>,
    /// Number of users to skip (requires --limit).
    #[arg(long, default_value_t = 0, requires = "limit")]
    offset: u64,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: OutputFormat,
}

#[derive(Debug, Args)]
struct ShowArgs {
    #[command(flatten)]
    db: DbArgs,
    /// Key of the user.
    id: i64,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: OutputFormat,
}

#[derive(Debug, Args)]
struct SetArgs {
    #[command(flatten)]
    db: DbArgs,
    /// Key of the user.
    id: i64,
    /// Field assignments (e.g. lastname=Kaufmann friend_id=2).
    assignments: Vec<String>,
    /// Grant or revoke admin rights.
    #[arg(long)]
    admin: Option<bool>,
    /// Key of the acting user, recorded as updater.
    #[arg(long)]
    actor: Option<i64>,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: OutputFormat,
}

#[derive(Debug, Args)]
struct RemoveArgs {
    #[command(flatten)]
    db: DbArgs,
    /// Key of the user.
    id: i64,
}

#[derive(Debug, Args)]
struct DemoArgs {
    #[command(flatten)]
    db: DbArgs,
    /// Key recorded as the acting user for audited writes.
    #[arg(long, default_value_t = 1)]
    actor: i64,
}

fn main() {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose);

    let result = match cli.command {
        Command::Init(args) => run_init(args),
        Command::Add(args) => run_add(args),
        Command::List(args) => run_list(args),
        Command::Show(args) => run_show(args),
        Command::Set(args) => run_set(args),
        Command::Remove(args) => run_remove(args),
        Command::Demo(args) => run_demo(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run_init(args: DbArgs) -> Result<(), String> {
    open_database(&args)?;
    println!("Users table ready in '{}'.", args.db.display());
    Ok(())
}

fn run_add(args: AddArgs) -> Result<(), String> {
    let conn = open_database(&args.db)?;
    let mut user = User::new(&conn).map_err(|e| e.to_string())?;
    user.fill([
        ("username", Value::from(args.username)),
        ("firstname", Value::from(args.firstname)),
        ("lastname", Value::from(args.lastname)),
        ("friend_id", Value::from(args.friend_id)),
    ])
    .map_err(|e| e.to_string())?;

    match args.actor {
        Some(actor) => user.create_as(actor),
        None => user.create(),
    }
    .map_err(|e| e.to_string())?;

    print_users(&[&user], args.format)?;
    if args.format == OutputFormat::Table {
        println!("Created {user}.");
        println!("sql: {}", user.last_query());
    }
    Ok(())
}

fn run_list(args: ListArgs) -> Result<(), String> {
    let conn = open_database(&args.db)?;
    let mut query = User::new(&conn).map_err(|e| e.to_string())?;

    if let Some(friend_id) = args.friend_id {
        query
            .filter_by("friend_id", Cmp::Eq, friend_id)
            .map_err(|e| e.to_string())?;
    }
    if let Some(pattern) = args.username_like {
        query
            .filter_by("username", Cmp::Like, pattern)
            .map_err(|e| e.to_string())?;
    }
    if let Some(limit) = args.limit {
        query.limit(limit, args.offset);
    }
    let order = match args.order_by {
        Some(column) => {
            validate_identifier(&column).map_err(|e| e.to_string())?;
            let direction = if args.desc { "DESC" } else { "ASC" };
            format!("ORDER BY {column} {direction}")
        }
        None => String::new(),
    };

    let users = query.all(Some(&order)).map_err(|e| e.to_string())?;
    print_users(&users.iter().collect::<Vec<_>>(), args.format)?;
    if args.format == OutputFormat::Table {
        println!("{} user(s)", users.len());
        println!("sql: {}", query.last_query());
    }
    Ok(())
}

fn run_show(args: ShowArgs) -> Result<(), String> {
    let conn = open_database(&args.db)?;
    let mut user = User::new(&conn).map_err(|e| e.to_string())?;
    user.find_or_fail(args.id)
        .map_err(|e| format!("user {}: {e}", args.id))?;

    let friend = match user.friend() {
        Ok(friend) => Some(friend),
        Err(err) if err.is_not_found() => None,
        Err(err) => return Err(err.to_string()),
    };
    let creator = user.creator().map_err(|e| e.to_string())?;
    let updater = user.updater().map_err(|e| e.to_string())?;
    let created = user.created_users().map_err(|e| e.to_string())?;

    match args.format {
        OutputFormat::Json => {
            let value = json!({
                "user": user.to_row(),
                "friend": friend.as_ref().map(User::to_row),
                "creator": creator.as_ref().map(User::to_row),
                "updater": updater.as_ref().map(User::to_row),
                "created_users": created.iter().map(User::to_row).collect::<Vec<_>>(),
            });
            let out = serde_json::to_string_pretty(&value)
                .map_err(|e| format!("JSON serialization failed: {e}"))?;
            println!("{out}");
        }
        OutputFormat::Table => {
            print!("{}", render_table(&[user.to_row()]));
            println!("friend: {}", describe(friend.as_ref()));
            println!("creator: {}", describe(creator.as_ref()));
            println!("updater: {}", describe(updater.as_ref()));
            if let Some(at) = user.created_at() {
                println!("created at: {}", at.to_rfc3339());
            }
            if let Some(at) = user.updated_at() {
                println!("updated at: {}", at.to_rfc3339());
            }
            println!("created users: {}", created.len());
        }
    }
    Ok(())
}

fn run_set(args: SetArgs) -> Result<(), String> {
    let assignments = args
        .assignments
        .iter()
        .map(|raw| parse_assignment(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let conn = open_database(&args.db)?;
    let mut user = User::new(&conn).map_err(|e| e.to_string())?;
    user.find_or_fail(args.id)
        .map_err(|e| format!("user {}: {e}", args.id))?;
    user.fill(assignments).map_err(|e| e.to_string())?;
    if let Some(admin) = args.admin {
        user.set("is_admin", admin).map_err(|e| e.to_string())?;
    }

    if !user.changed() {
        println!("Nothing to update for {user}.");
        return Ok(());
    }
    let changed: Vec<String> = user.diff().into_iter().map(String::from).collect();
    match args.actor {
        Some(actor) => user.update_as(actor),
        None => user.update(),
    }
    .map_err(|e| e.to_string())?;

    print_users(&[&user], args.format)?;
    if args.format == OutputFormat::Table {
        println!("Updated {user}: {}", changed.join(", "));
        println!("sql: {}", user.last_query());
    }
    Ok(())
}

fn run_remove(args: RemoveArgs) -> Result<(), String> {
    let conn = open_database(&args.db)?;
    let mut user = User::new(&conn).map_err(|e| e.to_string())?;
    user.find_or_fail(args.id)
        .map_err(|e| format!("user {}: {e}", args.id))?;
    user.delete().map_err(|e| e.to_string())?;
    println!("Deleted users({}).", args.id);
    println!("sql: {}", user.last_query());
    Ok(())
}

/// Runs every mapper operation once against the database, printing the
/// statement each one executed.
fn run_demo(args: DemoArgs) -> Result<(), String> {
    let conn = open_database(&args.db)?;
    let fail = |e: kiwi_sqlite::ModelError| e.to_string();

    println!("== create");
    let mut anna = User::new(&conn).map_err(fail)?;
    anna.fill([("username", "AS"), ("firstname", "Anna"), ("lastname", "Schmidt")])
        .map_err(fail)?
        .create_as(args.actor)
        .map_err(fail)?;
    println!("sql: {}", anna.last_query());

    let mut gustav = User::new(&conn).map_err(fail)?;
    gustav
        .fill([
            ("username", Value::from("GP")),
            ("firstname", Value::from("Gustav")),
            ("lastname", Value::from("Peters")),
            ("friend_id", anna.primary_key().clone()),
        ])
        .map_err(fail)?
        .create()
        .map_err(fail)?;
    println!("sql: {}", gustav.last_query());
    print!("{}", render_table(&[anna.to_row(), gustav.to_row()]));

    println!("== guard");
    match gustav.fill([("is_admin", true)]) {
        Ok(_) => return Err("is_admin was mass assigned".to_string()),
        Err(err) => println!("rejected: {err}"),
    }

    println!("== update");
    gustav.fill([("lastname", "Kaufmann")]).map_err(fail)?;
    println!("diff: {}", gustav.diff().join(", "));
    gustav.update_as(args.actor).map_err(fail)?;
    println!("sql: {}", gustav.last_query());

    println!("== update without changes");
    match gustav.update() {
        Ok(_) => return Err("update without changes succeeded".to_string()),
        Err(err) => println!("rejected: {err}"),
    }

    println!("== filter");
    let mut query = User::new(&conn).map_err(fail)?;
    let matches = query
        .filter("friend_id = ", anna.primary_key().clone())
        .filter("AND firstname LIKE ", "%us%")
        .all(None)
        .map_err(fail)?;
    println!("sql: {}", query.last_query());
    print!(
        "{}",
        render_table(&matches.iter().map(User::to_row).collect::<Vec<_>>())
    );

    println!("== relations");
    let friend = gustav.friend().map_err(fail)?;
    println!("friend of {gustav}: {friend}");
    println!("sql: {}", friend.last_query());

    println!("== find");
    let mut missing = User::new(&conn).map_err(fail)?;
    missing.find(999_999).map_err(fail)?;
    println!("find(999999) left {missing} untouched");
    match missing.find_or_fail(999_999) {
        Ok(_) => return Err("find_or_fail(999999) found a row".to_string()),
        Err(err) => println!("find_or_fail(999999): {err}"),
    }

    println!("== delete");
    gustav.delete().map_err(fail)?;
    println!("sql: {}", gustav.last_query());
    anna.delete().map_err(fail)?;
    println!("sql: {}", anna.last_query());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Opens the database file and makes sure the users table exists.
fn open_database(args: &DbArgs) -> Result<Connection, String> {
    let conn = Connection::open(&args.db)
        .map_err(|e| format!("Failed to open database '{}': {e}", args.db.display()))?;
    let ddl = create_table_sql(Users::descriptor()).map_err(|e| e.to_string())?;
    conn.execute_batch(&ddl)
        .map_err(|e| format!("Failed to create users table: {e}"))?;
    Ok(conn)
}

/// Parses `field=value` according to the declared kind of `field`.
///
/// Text columns take the value verbatim. Other columns accept `null`, and
/// otherwise an integer, a real or `true`/`false`/`1`/`0`. Undeclared fields
/// are kept as text; `fill` ignores them.
fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid assignment '{raw}': expected field=value"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("invalid assignment '{raw}': empty field name"));
    }

    let descriptor = Users::descriptor();
    let kind = descriptor
        .field_index(field)
        .map_or(FieldKind::Text, |i| descriptor.fields[i].kind);
    let invalid =
        |expected: &str| format!("invalid value for {field}: '{value}' is not {expected}");

    let value = match kind {
        FieldKind::Text => Value::from(value),
        _ if value.eq_ignore_ascii_case("null") => Value::Null,
        FieldKind::Integer => value
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| invalid("an integer"))?,
        FieldKind::Real => value
            .parse::<f64>()
            .ok()
            .filter(|r| r.is_finite())
            .map(Value::Real)
            .ok_or_else(|| invalid("a number"))?,
        FieldKind::Bool => match value.to_ascii_lowercase().as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => return Err(invalid("a boolean")),
        },
    };
    Ok((field.to_string(), value))
}

fn print_users(users: &[&User<'_>], format: OutputFormat) -> Result<(), String> {
    let rows: Vec<Row> = users.iter().map(|u| u.to_row()).collect();
    match format {
        OutputFormat::Json => {
            let out = serde_json::to_string_pretty(&rows)
                .map_err(|e| format!("JSON serialization failed: {e}"))?;
            println!("{out}");
        }
        OutputFormat::Table => print!("{}", render_table(&rows)),
    }
    Ok(())
}

fn describe(user: Option<&User<'_>>) -> String {
    match user {
        Some(user) => {
            let name = user.get("username").map(Value::to_string).unwrap_or_default();
            format!("{user} {name}")
        }
        None => "-".to_string(),
    }
}

/// Renders rows as a left-aligned text table with a header line.
fn render_table(rows: &[Row]) -> String {
    let headers: Vec<&str> = Users::descriptor().field_names().collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h).map(Value::to_string).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let line = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, &w)| format!("{v:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    out.push_str(&line(headers.clone()));
    out.push('\n');
    for row in &cells {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment_follows_field_kind() {
        assert_eq!(
            parse_assignment("lastname=Kaufmann").unwrap(),
            ("lastname".to_string(), Value::from("Kaufmann"))
        );
        assert_eq!(
            parse_assignment("friend_id=2").unwrap(),
            ("friend_id".to_string(), Value::Integer(2))
        );
        assert_eq!(parse_assignment("friend_id=NULL").unwrap().1, Value::Null);
        assert_eq!(parse_assignment("is_admin=true").unwrap().1, Value::Bool(true));
        assert_eq!(parse_assignment("is_admin=0").unwrap().1, Value::Bool(false));
        assert_eq!(parse_assignment("lastname=007").unwrap().1, Value::from("007"));
        assert_eq!(parse_assignment("username=true").unwrap().1, Value::from("true"));
        assert_eq!(parse_assignment("firstname=null").unwrap().1, Value::from("null"));
        assert_eq!(parse_assignment("lastname=a=b").unwrap().1, Value::from("a=b"));
        assert_eq!(parse_assignment("lastname=").unwrap().1, Value::from(""));
        assert_eq!(parse_assignment("nickname=7").unwrap().1, Value::from("7"));
    }

    #[test]
    fn test_parse_assignment_rejects_malformed() {
        assert!(parse_assignment("lastname").is_err());
        assert!(parse_assignment("=x").is_err());
        assert!(parse_assignment("friend_id=two").is_err());
        assert!(parse_assignment("is_admin=yes").is_err());
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let row: Row = [
            ("id", Value::from(1)),
            ("username", Value::from("GP")),
            ("firstname", Value::from("Gustav")),
        ]
        .into_iter()
        .collect();
        let table = render_table(&[row]);
        let mut lines = table.lines();
        assert!(lines.next().unwrap().starts_with("id  username  firstname"));
        assert!(lines.next().unwrap().starts_with("1   GP        Gustav"));
    }

    #[test]
    fn test_render_table_aligns_non_ascii_values() {
        let rows: Vec<Row> = [("Hans-Jürgen", "Kaufmann"), ("Gustav", "Peters")]
            .into_iter()
            .map(|(firstname, lastname)| {
                [
                    ("firstname", Value::from(firstname)),
                    ("lastname", Value::from(lastname)),
                ]
                .into_iter()
                .collect()
            })
            .collect();
        let table = render_table(&rows);
        let lines: Vec<&str> = table.lines().collect();
        let column = |line: &str, word: &str| line[..line.find(word).unwrap()].chars().count();

        assert!(lines[1].contains("Hans-Jürgen  Kaufmann"));
        assert_eq!(column(lines[0], "lastname"), column(lines[1], "Kaufmann"));
        assert_eq!(column(lines[0], "lastname"), column(lines[2], "Peters"));
    }
}
