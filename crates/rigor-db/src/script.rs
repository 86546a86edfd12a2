//! Splits SQL scripts into statements and runs them one by one.

use crate::connection::Connection;
use crate::error::ScriptError;
use tracing::debug;

/// Line-oriented SQL script runner.
///
/// `--` comments run to the end of the line. `/* ... */` comments may sit
/// inside a line or span several lines, and the code around them is kept.
/// A `;` ends a statement. Text following a `;` on the same line starts the
/// next statement, and a final statement without `;` is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlScriptRunner;

impl SqlScriptRunner {
    pub fn statements(script: &str) -> Vec<String> {
        let mut statements = Vec::new();
        let mut current = Vec::new();
        let mut in_block_comment = false;

        for line in script.lines() {
            let code = strip_comments(line, &mut in_block_comment);
            let mut rest = code.as_str();
            while let Some(pos) = rest.find(';') {
                push_part(&mut current, &rest[..pos]);
                finish(&mut statements, &mut current);
                rest = &rest[pos + 1..];
            }
            push_part(&mut current, rest);
        }
        finish(&mut statements, &mut current);
        statements
    }

    /// Runs every statement of `script`, stopping at the first failure.
    pub fn execute(script: &str, conn: &dyn Connection) -> Result<usize, ScriptError> {
        let statements = Self::statements(script);
        for statement in &statements {
            debug!(statement = %statement, "Executing script statement");
            conn.execute(statement, &[]).map_err(|source| ScriptError {
                statement: statement.clone(),
                source,
            })?;
        }
        Ok(statements.len())
    }
}

/// Returns the code of `line` with comments blanked out.
///
/// `in_block_comment` carries an unclosed `/*` over to the next line.
fn strip_comments(line: &str, in_block_comment: &mut bool) -> String {
    let mut code = String::new();
    let mut rest = line;
    loop {
        if *in_block_comment {
            let Some(end) = rest.find("*/") else {
                return code;
            };
            *in_block_comment = false;
            code.push(' ');
            rest = &rest[end + 2..];
        }

        match (rest.find("/*"), rest.find("--")) {
            (Some(start), dashes) if dashes.is_none_or(|dashes| start < dashes) => {
                code.push_str(&rest[..start]);
                *in_block_comment = true;
                rest = &rest[start + 2..];
            }
            (_, Some(dashes)) => {
                code.push_str(&rest[..dashes]);
                return code;
            }
            (None, None) => {
                code.push_str(rest);
                return code;
            }
            // Covered by the first arm's guard (`is_none_or` is true for `None`).
            (Some(_), None) => unreachable!(),
        }
    }
}

fn push_part(current: &mut Vec<String>, part: &str) {
    let part = part.trim();
    if !part.is_empty() {
        current.push(part.to_string());
    }
}

fn finish(statements: &mut Vec<String>, current: &mut Vec<String>) {
    if !current.is_empty() {
        statements.push(current.join(" "));
        current.clear();
    }
}
