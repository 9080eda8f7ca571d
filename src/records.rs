use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::TriageError;
use crate::models::{Message, Ticket};

const UNKNOWN_AUTHOR: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Csv,
    Json,
}

impl RecordFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InputRow {
    #[serde(default, alias = "tweet_id")]
    id: Option<String>,
    #[serde(default, alias = "username")]
    author: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

impl InputRow {
    fn into_message(self, row: usize) -> Result<Message, TriageError> {
        let text = match self.text {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Err(TriageError::MissingInput { row }),
        };
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("tweet_{row}"));
        let author = self
            .author
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        Ok(Message {
            id,
            author,
            text,
            timestamp: self.timestamp,
        })
    }
}

/// One input row after validation; `row` is 1-based over data rows.
pub type RowResult = Result<Message, TriageError>;

/// Reads every input row. Bad rows come back as errors so the batch can go on;
/// only an unreadable file fails the call.
pub fn read_messages(path: &Path) -> anyhow::Result<Vec<RowResult>> {
    match RecordFormat::from_path(path) {
        RecordFormat::Csv => read_csv_messages(path),
        RecordFormat::Json => read_json_messages(path),
    }
}

fn read_csv_messages(path: &Path) -> anyhow::Result<Vec<RowResult>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();

    for (idx, result) in reader.deserialize::<InputRow>().enumerate() {
        let row = idx + 1;
        match result {
            Ok(input) => rows.push(input.into_message(row)),
            Err(err) if err.is_io_error() => {
                return Err(err).with_context(|| format!("failed reading {}", path.display()));
            }
            Err(err) => rows.push(Err(TriageError::MalformedRecord {
                row,
                reason: err.to_string(),
            })),
        }
    }

    Ok(rows)
}

fn read_json_messages(path: &Path) -> anyhow::Result<Vec<RowResult>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let values: Vec<serde_json::Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array", path.display()))?;

    Ok(values
        .into_iter()
        .enumerate()
        .map(|(idx, mut value)| {
            let row = idx + 1;
            stringify_numeric_ids(&mut value);
            serde_json::from_value::<InputRow>(value)
                .map_err(|err| TriageError::MalformedRecord {
                    row,
                    reason: err.to_string(),
                })
                .and_then(|input| input.into_message(row))
        })
        .collect())
}

/// Some JSON exports carry numeric ids; the CSV path always sees text.
fn stringify_numeric_ids(value: &mut serde_json::Value) {
    let Some(object) = value.as_object_mut() else {
        return;
    };
    for key in ["id", "tweet_id"] {
        if let Some(id) = object.get_mut(key) {
            if let serde_json::Value::Number(number) = id {
                *id = serde_json::Value::String(number.to_string());
            }
        }
    }
}

pub fn write_tickets(path: &Path, tickets: &[Ticket]) -> anyhow::Result<()> {
    match RecordFormat::from_path(path) {
        RecordFormat::Csv => {
            let mut writer = csv::Writer::from_path(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            for ticket in tickets {
                writer.serialize(ticket)?;
            }
            writer.flush()?;
        }
        RecordFormat::Json => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            serde_json::to_writer_pretty(std::io::BufWriter::new(file), tickets)?;
        }
    }
    Ok(())
}

pub fn read_tickets(path: &Path) -> anyhow::Result<Vec<Ticket>> {
    match RecordFormat::from_path(path) {
        RecordFormat::Csv => {
            let mut reader = csv::Reader::from_path(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let mut tickets = Vec::new();
            for result in reader.deserialize::<Ticket>() {
                tickets.push(result?);
            }
            Ok(tickets)
        }
        RecordFormat::Json => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(serde_json::from_str(&raw)?)
        }
    }
}

#[derive(Serialize)]
struct SeedRow<'a> {
    tweet_id: &'a str,
    username: &'a str,
    text: &'a str,
    timestamp: &'a str,
}

const SAMPLE_MESSAGES: &[(&str, &str, &str, &str)] = &[
    (
        "1001",
        "@john_pgh",
        "@FNBcorp My credit card was declined at the store but I know I have enough credit. This is embarrassing!",
        "2024-01-15 10:30:00",
    ),
    (
        "1002",
        "@sarah_pitt",
        "@FNBcorp Can't access my checking account through the mobile app. Getting error messages.",
        "2024-01-15 11:15:00",
    ),
    (
        "1003",
        "@mike_steel",
        "@FNBcorp I noticed a suspicious charge on my account for $500 that I didn't make. Need help immediately!",
        "2024-01-15 12:00:00",
    ),
    (
        "1004",
        "@lisa_downtown",
        "@FNBcorp What are the current mortgage rates? Looking to refinance my home in Pittsburgh.",
        "2024-01-15 13:45:00",
    ),
    (
        "1005",
        "@dave_tech",
        "@FNBcorp Your ATM at Station Square ate my card! Please help, I need it back.",
        "2024-01-15 14:20:00",
    ),
    (
        "1006",
        "@emma_family",
        "@FNBcorp Thank you for the excellent customer service today! Your team in Shadyside was amazing.",
        "2024-01-15 15:00:00",
    ),
];

/// Writes the demo input file and returns how many rows it holds.
pub fn write_sample_messages(path: &Path) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for (tweet_id, username, text, timestamp) in SAMPLE_MESSAGES {
        writer.serialize(SeedRow {
            tweet_id,
            username,
            text,
            timestamp,
        })?;
    }
    writer.flush()?;
    Ok(SAMPLE_MESSAGES.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttritionRisk, Priority, SentimentClass, TicketStatus};

    fn sample_ticket(id: &str, keywords: &[&str]) -> Ticket {
        Ticket {
            ticket_id: format!("TKT-{id}"),
            message_id: id.to_string(),
            author: "@dave_tech".to_string(),
            text: "Your ATM ate my card, \"again\",\nplease help".to_string(),
            created_timestamp: "2024-01-15 14:20:00".to_string(),
            department_or_category: "Cards".to_string(),
            sentiment_class: SentimentClass::Negative,
            sentiment_confidence: 0.997,
            attrition_risk: AttritionRisk::High,
            matched_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            priority: Priority::High,
            status: TicketStatus::Open,
        }
    }

    #[test]
    fn csv_header_follows_field_contract() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tickets.csv");
        write_tickets(&path, &[sample_ticket("1", &["cancel"])]).expect("write");

        let raw = std::fs::read_to_string(&path).expect("read back");
        let header = raw.lines().next().expect("header line");
        assert_eq!(
            header,
            "ticket_id,message_id,author,text,created_timestamp,department_or_category,\
             sentiment_class,sentiment_confidence,attrition_risk,matched_keywords,priority,status"
        );
        assert!(raw.contains(",Cards,negative,0.997,high,cancel,HIGH,Open"));
    }

    #[test]
    fn tickets_survive_csv_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tickets.csv");
        let tickets = vec![
            sample_ticket("1", &["cancel", "worst"]),
            sample_ticket("2", &[]),
            Ticket {
                status: TicketStatus::ClassificationFailed,
                sentiment_class: SentimentClass::NeutralAtrisk,
                sentiment_confidence: 0.0,
                ..sample_ticket("3", &["never again"])
            },
        ];

        write_tickets(&path, &tickets).expect("write");
        let decoded = read_tickets(&path).expect("read");
        assert_eq!(decoded, tickets);
    }

    #[test]
    fn tickets_survive_json_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tickets.json");
        let tickets = vec![sample_ticket("9", &["switching"])];

        write_tickets(&path, &tickets).expect("write");
        let raw = std::fs::read_to_string(&path).expect("read back");
        assert!(raw.contains("\"matched_keywords\": \"switching\""));
        assert_eq!(read_tickets(&path).expect("read"), tickets);
    }

    #[test]
    fn reads_seed_file_with_tweet_headers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("input_tweets.csv");
        assert_eq!(write_sample_messages(&path).expect("seed"), 6);

        let rows = read_messages(&path).expect("read");
        assert_eq!(rows.len(), 6);
        let first = rows[0].as_ref().expect("valid row");
        assert_eq!(first.id, "1001");
        assert_eq!(first.author, "@john_pgh");
        assert_eq!(first.timestamp.as_deref(), Some("2024-01-15 10:30:00"));
    }

    #[test]
    fn missing_text_and_bad_rows_are_reported_per_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("input.csv");
        std::fs::write(
            &path,
            "id,username,text,timestamp\n\
             1,@a,hello there,2024-01-01\n\
             2,@b,,2024-01-01\n\
             3,@c\n\
             ,,my savings,\n",
        )
        .expect("write input");

        let rows = read_messages(&path).expect("read");
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].as_ref().expect("row 1").text, "hello there");
        assert!(matches!(rows[1], Err(TriageError::MissingInput { row: 2 })));
        assert!(matches!(rows[2], Err(TriageError::MalformedRecord { row: 3, .. })));

        let defaulted = rows[3].as_ref().expect("row 4");
        assert_eq!(defaulted.id, "tweet_4");
        assert_eq!(defaulted.author, "unknown");
        assert_eq!(defaulted.timestamp, None);
    }

    #[test]
    fn json_input_accepts_numeric_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("input.json");
        std::fs::write(
            &path,
            r#"[
                {"id": 42, "author": "@x", "text": "app error"},
                {"id": "43", "text": "   "},
                {"id": "44", "text": 5}
            ]"#,
        )
        .expect("write input");

        let rows = read_messages(&path).expect("read");
        assert_eq!(rows[0].as_ref().expect("row 1").id, "42");
        assert!(matches!(rows[1], Err(TriageError::MissingInput { row: 2 })));
        assert!(matches!(rows[2], Err(TriageError::MalformedRecord { row: 3, .. })));
    }

    #[test]
    fn unreadable_input_fails_the_call() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(read_messages(&dir.path().join("missing.csv")).is_err());
        let json = dir.path().join("bad.json");
        std::fs::write(&json, "{\"not\": \"an array\"}").expect("write");
        assert!(read_messages(&json).is_err());
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(RecordFormat::from_path(Path::new("a.JSON")), RecordFormat::Json);
        assert_eq!(RecordFormat::from_path(Path::new("a.csv")), RecordFormat::Csv);
        assert_eq!(RecordFormat::from_path(Path::new("tickets")), RecordFormat::Csv);
    }
}
