//! Diagnostic rendering of observed invocations.
//!
//! ```text
//! Observed scenario:
//!
//! 1. connection.prepare_statement(<value 1>) -> "stmt"  .....  at tests/loader.rs:41:9
//! 2. statement.execute_update() -> 0  .....  at src/loader.rs:212:21
//!
//! Detailed scenario:
//!
//! <value 1> "update my_schema.table_a set column_1=?, column_2=? where column_1=?"
//! ```

use crate::invocation::{ObservedInvocation, Outcome};
use serde_json::Value;

/// Values rendering longer than this are moved to the detail section.
const MAX_INLINE_VALUE_LEN: usize = 40;

/// Collects values too long to show inline.
#[derive(Default)]
struct LargeValues {
    values: Vec<String>,
}

impl LargeValues {
    fn render(&mut self, value: &Value) -> String {
        let text = value.to_string();
        if text.chars().count() > MAX_INLINE_VALUE_LEN {
            self.values.push(text);
            format!("<value {}>", self.values.len())
        } else {
            text
        }
    }

    fn render_text(&mut self, text: &str) -> String {
        if text.chars().count() > MAX_INLINE_VALUE_LEN {
            self.values.push(text.to_string());
            format!("<value {}>", self.values.len())
        } else {
            text.to_string()
        }
    }

    fn write_details(&self, out: &mut String) {
        if self.values.is_empty() {
            return;
        }
        out.push_str("\nDetailed scenario:\n\n");
        for (index, value) in self.values.iter().enumerate() {
            out.push_str(&format!("<value {}> {value}\n", index + 1));
        }
    }
}

fn render_line(
    number: usize,
    invocation: &ObservedInvocation,
    large_values: &mut LargeValues,
) -> String {
    let arguments = invocation
        .arguments()
        .iter()
        .map(|a| large_values.render(a))
        .collect::<Vec<_>>()
        .join(", ");
    let outcome = match invocation.outcome() {
        Outcome::Returned(Value::Null) => String::new(),
        Outcome::Returned(value) => format!(" -> {}", large_values.render(value)),
        Outcome::Raised(message) => format!(" raised {}", large_values.render_text(message)),
    };
    format!(
        "{number}. {}({arguments}){outcome}  .....  at {}\n",
        invocation.qualified_method(),
        invocation.invoked_at()
    )
}

/// Renders invocations one per line, numbered from 1, with a detail section
/// for long values.
pub fn invocations_view<'a>(invocations: impl IntoIterator<Item = &'a ObservedInvocation>) -> String {
    let mut large_values = LargeValues::default();
    let mut out = String::new();
    for (index, invocation) in invocations.into_iter().enumerate() {
        out.push_str(&render_line(index + 1, invocation, &mut large_values));
    }
    large_values.write_details(&mut out);
    out
}

/// Renders the full observed scenario.
pub fn create_report(invocations: &[ObservedInvocation]) -> String {
    let mut out = String::from("Observed scenario:\n\n");
    if invocations.is_empty() {
        out.push_str("(no invocations observed)\n");
        return out;
    }
    out.push_str(&invocations_view(invocations));
    out
}
