//! Scan statement parsing.
//!
//! ```text
//! scan TABLE [prefix=P] [start=S] [stop=S] [limit=N] [families=a,b]
//! ```
//!
//! Values may be quoted with `'` or `"` to include spaces. A trailing `;`
//! is ignored.
//!
//! Inline connection settings, used by `\save` and `\connect`:
//!
//! ```text
//! NAME quorum=HOST[,HOST...] [master=HOST:PORT] [port=N]
//! ```

use anyhow::{anyhow, bail, Result};

use hbrowse_client::{ConnectionSetting, Query};

/// Usage of an inline connection setting.
pub const SETTING_USAGE: &str = "NAME quorum=HOSTS [master=HOST:PORT] [port=N]";

/// Splits text into tokens on whitespace, honoring quotes.
fn tokenize(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if let Some(q) = quote {
        bail!("unterminated {q} quote");
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Returns true if a quote is left open, used to request more input.
pub fn has_open_quote(input: &str) -> bool {
    tokenize(input).is_err()
}

/// Parses a scan statement into a query.
pub fn parse_scan(input: &str, default_page_size: u64) -> Result<Query> {
    let input = input.trim().trim_end_matches(';');
    let tokens = tokenize(input)?;
    let mut tokens = tokens.into_iter();

    match tokens.next() {
        Some(keyword) if keyword.eq_ignore_ascii_case("scan") => {}
        Some(other) => bail!("unknown statement '{other}', expected 'scan'"),
        None => bail!("empty statement"),
    }
    let table = tokens
        .next()
        .ok_or_else(|| anyhow!("usage: scan TABLE [prefix=P] [start=S] [stop=S] [limit=N] [families=a,b]"))?;

    let mut query = Query::new(table).page_size(default_page_size);
    for token in tokens {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| anyhow!("expected key=value, got '{token}'"))?;
        match key.to_lowercase().as_str() {
            "prefix" => query = query.prefix(value),
            "start" => query = query.start(value),
            "stop" => query = query.stop(value),
            "limit" => {
                let limit = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("invalid limit '{value}'"))?;
                query = query.page_size(limit);
            }
            "families" => {
                query = query.families(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|f| !f.is_empty()),
                )
            }
            other => bail!("unknown option '{other}'"),
        }
    }

    query.validate()?;
    Ok(query)
}

/// Parses an inline connection setting. The client port defaults to 2181.
pub fn parse_setting(input: &str) -> Result<ConnectionSetting> {
    let mut tokens = tokenize(input.trim())?.into_iter();
    let name = tokens
        .next()
        .filter(|name| !name.contains('='))
        .ok_or_else(|| anyhow!("usage: {SETTING_USAGE}"))?;

    let mut setting = ConnectionSetting::new(name);
    for token in tokens {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| anyhow!("expected key=value, got '{token}'"))?;
        setting = match key.to_lowercase().as_str() {
            "quorum" => setting.quorum(value),
            "master" => setting.master(value),
            "port" => setting.client_port(value),
            other => bail!("unknown setting option '{other}'"),
        };
    }

    setting.validate()?;
    Ok(setting)
}

/// Returns true if `args` carries an inline setting rather than a bare name.
pub fn is_inline_setting(args: &str) -> bool {
    args.contains('=')
}

/// Splits script content into statements.
///
/// Statements end at a newline or at a `;` outside quotes. Lines starting
/// with `--` or `#` are comments.
pub fn split_statements(content: &str) -> Vec<String> {
    let mut statements = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") || trimmed.starts_with('#') {
            continue;
        }

        let mut current = String::new();
        let mut quote: Option<char> = None;
        for c in trimmed.chars() {
            match quote {
                Some(q) if c == q => {
                    quote = None;
                    current.push(c);
                }
                Some(_) => current.push(c),
                None if c == '\'' || c == '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                None if c == ';' => {
                    push_statement(&mut statements, &mut current);
                }
                None => current.push(c),
            }
        }
        push_statement(&mut statements, &mut current);
    }

    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}
