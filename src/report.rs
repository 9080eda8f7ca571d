use std::collections::HashMap;
use std::fmt::Write;

use crate::models::{BatchSummary, BreakdownRow, Ticket, TicketStatus};

/// Counts tickets per key, largest first (ties by label for stable output).
pub fn breakdown<F>(tickets: &[Ticket], key: F) -> Vec<BreakdownRow>
where
    F: Fn(&Ticket) -> String,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for ticket in tickets {
        *counts.entry(key(ticket)).or_insert(0) += 1;
    }

    let total = tickets.len();
    let mut rows: Vec<BreakdownRow> = counts
        .into_iter()
        .map(|(label, count)| BreakdownRow {
            label,
            count,
            percent: if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            },
        })
        .collect();

    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    rows
}

fn write_section(output: &mut String, title: &str, rows: &[BreakdownRow]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {title}");
    if rows.is_empty() {
        let _ = writeln!(output, "No tickets in this batch.");
        return;
    }
    for row in rows {
        let _ = writeln!(output, "- {}: {} ({:.1}%)", row.label, row.count, row.percent);
    }
}

pub fn build_report(source: &str, tickets: &[Ticket], summary: Option<&BatchSummary>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Ticket Triage Report");
    let _ = writeln!(output, "Generated from {} ({} tickets)", source, tickets.len());

    if let Some(summary) = summary {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Batch");
        let _ = writeln!(output, "- processed: {}", summary.processed);
        let _ = writeln!(output, "- classification failed: {}", summary.classification_failed);
        let _ = writeln!(output, "- skipped (no text): {}", summary.skipped_missing_text);
        let _ = writeln!(output, "- rejected (malformed): {}", summary.rejected_malformed);
    }

    write_section(
        &mut output,
        "Departments",
        &breakdown(tickets, |t| t.department_or_category.clone()),
    );
    write_section(&mut output, "Priority", &breakdown(tickets, |t| t.priority.to_string()));
    write_section(
        &mut output,
        "Sentiment",
        &breakdown(tickets, |t| t.sentiment_class.to_string()),
    );
    write_section(
        &mut output,
        "Attrition Risk",
        &breakdown(tickets, |t| t.attrition_risk.to_string()),
    );

    let mut urgent: Vec<&Ticket> = tickets.iter().collect();
    urgent.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.attrition_risk.cmp(&a.attrition_risk))
    });
    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Urgent Tickets");

    if urgent.is_empty() {
        let _ = writeln!(output, "No tickets in this batch.");
    } else {
        for ticket in urgent.iter().take(10) {
            let keywords = if ticket.matched_keywords.is_empty() {
                String::new()
            } else {
                format!(" [{}]", ticket.matched_keywords.join(", "))
            };
            let _ = writeln!(
                output,
                "- {} {} ({}, {}, risk {}){}",
                ticket.ticket_id,
                ticket.priority,
                ticket.author,
                ticket.department_or_category,
                ticket.attrition_risk,
                keywords
            );
        }
    }

    let failed: Vec<&Ticket> = tickets
        .iter()
        .filter(|t| t.status == TicketStatus::ClassificationFailed)
        .collect();
    if !failed.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Classification Failures");
        for ticket in failed {
            let _ = writeln!(output, "- {} ({})", ticket.ticket_id, ticket.author);
        }
    }

    output
}

/// Short console summary printed after a batch.
pub fn print_summary(summary: &BatchSummary, tickets: &[Ticket]) {
    println!("Processed {} of {} rows.", summary.processed, summary.total_rows());
    if summary.classification_failed > 0 {
        println!("  classification failed: {}", summary.classification_failed);
    }
    if summary.skipped_missing_text > 0 {
        println!("  skipped (no text): {}", summary.skipped_missing_text);
    }
    if summary.rejected_malformed > 0 {
        println!("  rejected (malformed): {}", summary.rejected_malformed);
    }

    for (title, rows) in [
        ("Sentiment", breakdown(tickets, |t| t.sentiment_class.to_string())),
        ("Attrition risk", breakdown(tickets, |t| t.attrition_risk.to_string())),
        ("Priority", breakdown(tickets, |t| t.priority.to_string())),
    ] {
        println!("{title}:");
        for row in rows {
            println!("  {}: {} ({:.1}%)", row.label, row.count, row.percent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttritionRisk, Priority, SentimentClass};

    fn ticket(id: &str, department: &str, priority: Priority, risk: AttritionRisk) -> Ticket {
        Ticket {
            ticket_id: format!("TKT-{id}"),
            message_id: id.to_string(),
            author: format!("@user{id}"),
            text: "text".to_string(),
            created_timestamp: "2024-01-15 10:30:00".to_string(),
            department_or_category: department.to_string(),
            sentiment_class: SentimentClass::NeutralAtrisk,
            sentiment_confidence: 0.5,
            attrition_risk: risk,
            matched_keywords: Vec::new(),
            priority,
            status: TicketStatus::Open,
        }
    }

    #[test]
    fn breakdown_counts_and_percentages() {
        let tickets = vec![
            ticket("1", "Cards", Priority::Low, AttritionRisk::Low),
            ticket("2", "Cards", Priority::Low, AttritionRisk::Low),
            ticket("3", "Fraud", Priority::High, AttritionRisk::Low),
            ticket("4", "Accounts", Priority::Low, AttritionRisk::Low),
        ];
        let rows = breakdown(&tickets, |t| t.department_or_category.clone());
        assert_eq!(rows[0].label, "Cards");
        assert_eq!(rows[0].count, 2);
        assert!((rows[0].percent - 50.0).abs() < 0.001);
        // Ties ordered by label.
        assert_eq!(rows[1].label, "Accounts");
        assert_eq!(rows[2].label, "Fraud");
    }

    #[test]
    fn breakdown_of_nothing_is_empty() {
        assert!(breakdown(&[], |t| t.priority.to_string()).is_empty());
    }

    #[test]
    fn report_lists_urgent_tickets_first() {
        let mut churn = ticket("2", "Accounts", Priority::High, AttritionRisk::High);
        churn.matched_keywords = vec!["cancel".to_string(), "worst".to_string()];
        let tickets = vec![
            ticket("1", "General", Priority::Low, AttritionRisk::Low),
            churn,
            Ticket {
                status: TicketStatus::ClassificationFailed,
                ..ticket("3", "Digital", Priority::Medium, AttritionRisk::Medium)
            },
        ];
        let summary = BatchSummary {
            processed: 3,
            classification_failed: 1,
            skipped_missing_text: 1,
            rejected_malformed: 0,
        };

        let report = build_report("tickets.csv", &tickets, Some(&summary));
        assert!(report.starts_with("# Ticket Triage Report\nGenerated from tickets.csv (3 tickets)"));
        assert!(report.contains("- skipped (no text): 1"));
        assert!(report.contains("- HIGH: 1 (33.3%)"));

        let urgent = report
            .split("## Most Urgent Tickets\n")
            .nth(1)
            .expect("urgent section");
        assert!(urgent.starts_with("- TKT-2 HIGH (@user2, Accounts, risk high) [cancel, worst]"));
        assert!(report.contains("## Classification Failures\n- TKT-3 (@user3)"));
    }

    #[test]
    fn empty_report_says_so() {
        let report = build_report("empty.csv", &[], None);
        assert!(report.contains("## Departments\nNo tickets in this batch."));
        assert!(!report.contains("## Batch"));
        assert!(!report.contains("Classification Failures"));
    }
}
