use crate::classify::{is_asset_row, is_context_row, is_spare_header, is_task_header, Classifier};

/// Which kind of row is being reassembled; decides which lines end it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Task,
    SparePart,
}

impl BlockKind {
    fn terminates(self, classifier: &Classifier, line: &str) -> bool {
        match self {
            BlockKind::Task => {
                classifier.is_metadata(line)
                    || is_task_header(line)
                    || classifier.is_task_start(line)
                    || is_context_row(line)
                    || is_asset_row(line)
            }
            BlockKind::SparePart => {
                is_spare_header(line)
                    || classifier.is_metadata(line)
                    || is_asset_row(line)
                    || classifier.is_spare_start(line)
            }
        }
    }
}

/// Join the row starting at `start` with its wrapped continuation lines.
///
/// Blank lines are skipped without ending the block. Returns the logical line
/// and the index of the first line that was not consumed.
pub fn assemble<S: AsRef<str>>(
    lines: &[S],
    start: usize,
    kind: BlockKind,
    classifier: &Classifier,
) -> (String, usize) {
    let mut buf: Vec<&str> = Vec::new();
    if let Some(first) = lines.get(start) {
        buf.push(first.as_ref().trim());
    }

    let mut i = start + 1;
    while i < lines.len() {
        let line = lines[i].as_ref();
        if line.trim().is_empty() {
            i += 1;
            continue;
        }
        if kind.terminates(classifier, line) {
            break;
        }
        buf.push(line.trim());
        i += 1;
    }

    (buf.join(" "), i)
}
