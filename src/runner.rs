use std::path::Path;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::TriageEngine;
use crate::error::TriageError;
use crate::models::{BatchSummary, Ticket, TicketStatus};
use crate::records::{self, RowResult};

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub run_id: Uuid,
    pub tickets: Vec<Ticket>,
    pub summary: BatchSummary,
}

/// Triages every valid row, at most `max_in_flight` at a time. Tickets come
/// back in input order; bad rows are counted and logged, never fatal.
pub async fn run_batch(
    engine: &TriageEngine,
    rows: Vec<RowResult>,
    max_in_flight: usize,
) -> BatchOutcome {
    let run_id = Uuid::new_v4();
    let mut summary = BatchSummary::default();
    let mut messages = Vec::with_capacity(rows.len());

    for row in rows {
        match row {
            Ok(message) => messages.push(message),
            Err(err @ TriageError::MissingInput { .. }) => {
                warn!(%run_id, error = %err, "skipping message");
                summary.skipped_missing_text += 1;
            }
            Err(err) => {
                warn!(%run_id, error = %err, "rejecting record");
                summary.rejected_malformed += 1;
            }
        }
    }

    info!(
        %run_id,
        variant = engine.variant().label(),
        messages = messages.len(),
        "triage batch started"
    );

    let tickets: Vec<Ticket> = stream::iter(messages.iter())
        .map(|message| async move {
            debug!(
                message_id = %message.id,
                posted_at = message.timestamp.as_deref().unwrap_or("-"),
                "triaging"
            );
            engine.triage(message).await
        })
        .buffered(max_in_flight.max(1))
        .collect()
        .await;

    for ticket in &tickets {
        summary.processed += 1;
        if ticket.status == TicketStatus::ClassificationFailed {
            summary.classification_failed += 1;
        }
        debug!(
            ticket_id = %ticket.ticket_id,
            department = %ticket.department_or_category,
            priority = %ticket.priority,
            "ticket created"
        );
    }

    info!(
        %run_id,
        processed = summary.processed,
        failed = summary.classification_failed,
        skipped = summary.skipped_missing_text,
        rejected = summary.rejected_malformed,
        "triage batch finished"
    );

    BatchOutcome {
        run_id,
        tickets,
        summary,
    }
}

/// Reads `input`, triages it and writes the tickets to `output`.
pub async fn run_file(
    engine: &TriageEngine,
    input: &Path,
    output: &Path,
    max_in_flight: usize,
) -> anyhow::Result<BatchOutcome> {
    let rows = records::read_messages(input)?;
    info!(rows = rows.len(), input = %input.display(), "loaded input");
    let outcome = run_batch(engine, rows, max_in_flight).await;
    records::write_tickets(output, &outcome.tickets)?;
    Ok(outcome)
}
