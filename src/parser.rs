use crate::common::{DbError, Result};

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    ShowDatabases,
    CreateDatabase(String),
    DropDatabase(String),
    UseDatabase(String),
    ShowTables,
    CreateTable { name: String, schema: String },
    Describe(String),
    DropTable(String),
    Insert { table: String, key: i64, value: String },
    SelectAll { table: String },
    SelectById { table: String, key: i64 },
    DeleteById { table: String, key: i64 },
}

/// Parses one line of the client grammar. Keywords are case-insensitive; a
/// trailing semicolon is ignored.
pub fn parse(input: &str) -> Result<Command> {
    let sql = input.trim().trim_end_matches(';').trim();
    if sql.is_empty() {
        return Err(DbError::Parse("empty statement".to_string()));
    }

    let lower = sql.to_ascii_lowercase();
    let keywords: Vec<&str> = lower.split_whitespace().collect();
    let words: Vec<&str> = sql.split_whitespace().collect();

    match keywords.as_slice() {
        ["help"] => Ok(Command::Help),
        ["quit"] | ["exit"] => Ok(Command::Quit),
        ["show", "databases"] => Ok(Command::ShowDatabases),
        ["show", "tables"] => Ok(Command::ShowTables),
        ["create", "database", _] => Ok(Command::CreateDatabase(identifier(words[2])?)),
        ["drop", "database", _] => Ok(Command::DropDatabase(identifier(words[2])?)),
        ["use", _] => Ok(Command::UseDatabase(identifier(words[1])?)),
        ["describe", _] => Ok(Command::Describe(identifier(words[1])?)),
        ["drop", "table", _] => Ok(Command::DropTable(identifier(words[2])?)),
        ["create", "table", ..] => parse_create_table(sql),
        ["insert", "into", ..] => parse_insert(sql),
        ["select", ..] => parse_select(&keywords, &words),
        ["delete", "from", ..] => parse_delete(&keywords, &words),
        _ => Err(DbError::Parse(format!("unknown command: {sql}"))),
    }
}

/// `create table <name> (<schema>)`
fn parse_create_table(sql: &str) -> Result<Command> {
    let body = sql
        .split_whitespace()
        .skip(2)
        .collect::<Vec<_>>()
        .join(" ");
    let open = body
        .find('(')
        .ok_or_else(|| DbError::Parse("create table requires a (schema)".to_string()))?;
    if !body.ends_with(')') {
        return Err(DbError::Parse("unterminated schema definition".to_string()));
    }

    let name = identifier(body[..open].trim())?;
    let schema = body[open + 1..body.len() - 1].trim().to_string();
    if schema.is_empty() {
        return Err(DbError::Parse("schema cannot be empty".to_string()));
    }
    Ok(Command::CreateTable { name, schema })
}

/// `insert into <table> values (<key>[, <value>...])`
fn parse_insert(sql: &str) -> Result<Command> {
    let lower = sql.to_ascii_lowercase();
    let values_at = lower
        .find(" values")
        .ok_or_else(|| DbError::Parse("insert requires a values clause".to_string()))?;

    let table = identifier(sql[..values_at].split_whitespace().nth(2).ok_or_else(|| {
        DbError::Parse("insert requires a table name".to_string())
    })?)?;

    let rest = sql[values_at + " values".len()..].trim();
    let inner = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| DbError::Parse("values must be parenthesized".to_string()))?;

    let mut parts = inner.split(',');
    let key_str = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DbError::Parse("insert values cannot be empty".to_string()))?;
    let key: i64 = key_str.parse().map_err(|_| {
        DbError::Parse(format!(
            "primary key (first value) must be an integer, got '{key_str}'"
        ))
    })?;

    let value = parts
        .map(|part| part.trim().trim_matches(|c| c == '\'' || c == '"'))
        .collect::<Vec<_>>()
        .join(",");

    Ok(Command::Insert { table, key, value })
}

/// `select * from <table> [where id = <key>]`
fn parse_select(keywords: &[&str], words: &[&str]) -> Result<Command> {
    match keywords {
        ["select", "*", "from", _] => Ok(Command::SelectAll {
            table: identifier(words[3])?,
        }),
        ["select", "*", "from", _, "where", ..] => {
            let table = identifier(words[3])?;
            let key = parse_id_condition(&keywords[4..], &words[4..])?;
            Ok(Command::SelectById { table, key })
        }
        _ => Err(DbError::Parse(
            "only 'select * from <table> [where id = <int>]' is supported".to_string(),
        )),
    }
}

/// `delete from <table> where id = <key>`
fn parse_delete(keywords: &[&str], words: &[&str]) -> Result<Command> {
    match keywords {
        ["delete", "from", _, "where", ..] => {
            let table = identifier(words[2])?;
            let key = parse_id_condition(&keywords[3..], &words[3..])?;
            Ok(Command::DeleteById { table, key })
        }
        _ => Err(DbError::Parse(
            "only 'delete from <table> where id = <int>' is supported".to_string(),
        )),
    }
}

/// Parses a `where id = <int>` tail, tolerating `id=<int>` spellings.
fn parse_id_condition(keywords: &[&str], words: &[&str]) -> Result<i64> {
    debug_assert_eq!(keywords.first(), Some(&"where"));
    let condition = words[1..].join(" ");

    let (column, value) = condition
        .split_once('=')
        .map(|(c, v)| (c.trim(), v.trim()))
        .ok_or_else(|| DbError::Parse(format!("unsupported where clause: {condition}")))?;

    if !column.eq_ignore_ascii_case("id") {
        return Err(DbError::Parse(
            "currently only filtering by id is supported".to_string(),
        ));
    }

    value
        .parse()
        .map_err(|_| DbError::Parse(format!("id must be an integer, got '{value}'")))
}

fn identifier(word: &str) -> Result<String> {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(word.to_string())
    } else {
        Err(DbError::Parse(format!("invalid identifier: '{word}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_keywords() {
        assert_eq!(parse("help").unwrap(), Command::Help);
        assert_eq!(parse("QUIT").unwrap(), Command::Quit);
        assert_eq!(parse("show databases;").unwrap(), Command::ShowDatabases);
        assert_eq!(parse("Show Tables").unwrap(), Command::ShowTables);
    }

    #[test]
    fn test_database_commands() {
        assert_eq!(
            parse("create database app").unwrap(),
            Command::CreateDatabase("app".to_string())
        );
        assert_eq!(
            parse("drop database app").unwrap(),
            Command::DropDatabase("app".to_string())
        );
        assert_eq!(
            parse("use app;").unwrap(),
            Command::UseDatabase("app".to_string())
        );
    }

    #[test]
    fn test_create_table() {
        assert_eq!(
            parse("create table users (id int, name text)").unwrap(),
            Command::CreateTable {
                name: "users".to_string(),
                schema: "id int, name text".to_string(),
            }
        );
    }

    #[test]
    fn test_create_table_rejects_missing_schema() {
        assert!(parse("create table users").is_err());
        assert!(parse("create table users ()").is_err());
        assert!(parse("create table users (id int").is_err());
    }

    #[test]
    fn test_insert() {
        assert_eq!(
            parse("insert into users values (1, 'alice')").unwrap(),
            Command::Insert {
                table: "users".to_string(),
                key: 1,
                value: "alice".to_string(),
            }
        );
    }

    #[test]
    fn test_insert_multiple_values_joined() {
        assert_eq!(
            parse("insert into users values (2, \"bob\", 'admin')").unwrap(),
            Command::Insert {
                table: "users".to_string(),
                key: 2,
                value: "bob,admin".to_string(),
            }
        );
    }

    #[test]
    fn test_insert_key_only() {
        assert_eq!(
            parse("insert into t values (7)").unwrap(),
            Command::Insert {
                table: "t".to_string(),
                key: 7,
                value: String::new(),
            }
        );
    }

    #[test]
    fn test_insert_rejects_non_integer_key() {
        assert!(parse("insert into t values ('x', 'y')").is_err());
    }

    #[test]
    fn test_select() {
        assert_eq!(
            parse("select * from users").unwrap(),
            Command::SelectAll {
                table: "users".to_string()
            }
        );
        assert_eq!(
            parse("select * from users where id = 42").unwrap(),
            Command::SelectById {
                table: "users".to_string(),
                key: 42,
            }
        );
        assert_eq!(
            parse("select * from users where id=42").unwrap(),
            Command::SelectById {
                table: "users".to_string(),
                key: 42,
            }
        );
    }

    #[test]
    fn test_select_rejects_other_columns() {
        assert!(parse("select * from users where name = 'x'").is_err());
        assert!(parse("select name from users").is_err());
    }

    #[test]
    fn test_delete() {
        assert_eq!(
            parse("delete from users where id = 3").unwrap(),
            Command::DeleteById {
                table: "users".to_string(),
                key: 3,
            }
        );
        assert!(parse("delete from users").is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse("").is_err());
        assert!(parse("frobnicate the database").is_err());
        assert!(parse("drop table 'quoted'").is_err());
    }
}
