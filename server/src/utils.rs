use shared::PlayerNote;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

// One line of a merged per-card note
pub fn note_format(name: &str, note: &str) -> String {
    if note.is_empty() {
        return String::new();
    }
    format!("{}: {}\n", name, note)
}

// Merge everyone's notes into one string per deck position
pub fn merge_notes(notes: &[PlayerNote]) -> Vec<String> {
    let len = notes.iter().map(|n| n.notes.len()).max().unwrap_or(0);
    (0..len)
        .map(|order| {
            notes
                .iter()
                .filter_map(|n| n.notes.get(order).map(|note| note_format(&n.name, note)))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_format_skips_empty() {
        assert_eq!(note_format("alice", ""), "");
        assert_eq!(note_format("alice", "5 red?"), "alice: 5 red?\n");
    }

    #[test]
    fn test_merge_notes() {
        let notes = vec![
            PlayerNote {
                id: 1,
                name: "alice".to_string(),
                notes: vec!["chop".to_string(), String::new()],
            },
            PlayerNote {
                id: 2,
                name: "bob".to_string(),
                notes: vec!["finesse".to_string(), "5".to_string(), "x".to_string()],
            },
        ];
        let merged = merge_notes(&notes);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], "alice: chop\nbob: finesse\n");
        assert_eq!(merged[1], "bob: 5\n");
        assert_eq!(merged[2], "bob: x\n");
    }
}
