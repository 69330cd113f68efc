use serde::Serialize;

/// `git status` arguments whose output [`parse_status`] understands.
pub const STATUS_ARGS: [&str; 4] = ["status", "--porcelain", "-u", "-z"];

/// One porcelain entry. `x` is the index column, `y` the working-tree column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub x: String,
    pub y: String,
    pub to: String,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusPayload {
    pub files: Vec<StatusEntry>,
}

/// Parses NUL-separated porcelain v1 output.
///
/// Renames and copies (`R`/`C` in the index column) take the following field
/// as their source path. Fields too short to be an entry are skipped.
pub fn parse_status(output: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    let mut fields = output.split('\0').filter(|field| !field.is_empty());

    while let Some(field) = fields.next() {
        let bytes = field.as_bytes();
        if bytes.len() < 4 || !bytes[0].is_ascii() || !bytes[1].is_ascii() || bytes[2] != b' ' {
            continue;
        }

        let x = &field[0..1];
        let y = &field[1..2];
        let to = &field[3..];
        let from = if x == "R" || x == "C" {
            match fields.next() {
                Some(from) => from,
                None => continue,
            }
        } else {
            to
        };

        entries.push(StatusEntry {
            x: x.to_string(),
            y: y.to_string(),
            to: to.to_string(),
            from: from.to_string(),
        });
    }

    entries
}
